use std::sync::Arc;

use once_cell::sync::Lazy;
use resvg::{
    tiny_skia::{self, IntRect, Pixmap},
    usvg::{self, fontdb},
};
use thiserror::Error;
use tracing::info;

const SANS_SERIF_CANDIDATES: &[&str] = &[
    "DejaVu Sans",
    "Liberation Sans",
    "Arial",
    "Helvetica",
    "Noto Sans",
];

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("failed to parse figure document: {0}")]
    Parse(#[from] usvg::Error),
    #[error("figure has an empty canvas ({width}x{height})")]
    EmptyCanvas { width: u32, height: u32 },
    #[error("failed to encode PNG: {0}")]
    Encode(String),
}

/// System fonts, loaded once per process and shared read-only by every render.
static FONT_DB: Lazy<Arc<fontdb::Database>> = Lazy::new(|| Arc::new(load_fonts()));

fn load_fonts() -> fontdb::Database {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();

    let family = SANS_SERIF_CANDIDATES
        .iter()
        .map(|name| name.to_string())
        .find(|name| has_family(&db, name))
        .or_else(|| {
            db.faces()
                .next()
                .and_then(|face| face.families.first().map(|(name, _)| name.clone()))
        });
    if let Some(family) = &family {
        db.set_sans_serif_family(family.clone());
    }

    info!(
        target = "application::render::script",
        faces = db.len(),
        sans_serif = family.as_deref().unwrap_or("none"),
        "Font database loaded"
    );
    db
}

fn has_family(db: &fontdb::Database, name: &str) -> bool {
    db.faces()
        .any(|face| face.families.iter().any(|(family, _)| family == name))
}

/// Load the font database now rather than on the first render.
pub fn init_fonts() {
    Lazy::force(&FONT_DB);
}

/// Rasterize `document` onto an opaque white canvas, crop it to the drawn
/// content plus `pad_px` and encode the result as PNG.
pub(super) fn rasterize(document: &str, pad_px: f64) -> Result<Vec<u8>, RasterError> {
    let mut options = usvg::Options::default();
    options.fontdb = Arc::clone(&FONT_DB);
    let tree = usvg::Tree::from_str(document, &options)?;

    let size = tree.size().to_int_size();
    let mut pixmap =
        Pixmap::new(size.width(), size.height()).ok_or(RasterError::EmptyCanvas {
            width: size.width(),
            height: size.height(),
        })?;
    pixmap.fill(tiny_skia::Color::WHITE);
    resvg::render(&tree, tiny_skia::Transform::default(), &mut pixmap.as_mut());

    let cropped = crop_to_content(&pixmap, pad_px.max(0.0).round() as u32).unwrap_or(pixmap);
    cropped
        .encode_png()
        .map_err(|err| RasterError::Encode(err.to_string()))
}

/// Tight bounding box of every non-white pixel, grown by `pad` and clamped to
/// the canvas. `None` when the canvas is blank or already tight.
fn crop_to_content(pixmap: &Pixmap, pad: u32) -> Option<Pixmap> {
    let width = pixmap.width();
    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (index, pixel) in pixmap.pixels().iter().enumerate() {
        if pixel.red() == 255 && pixel.green() == 255 && pixel.blue() == 255 {
            continue;
        }
        let x = index as u32 % width;
        let y = index as u32 / width;
        bounds = Some(match bounds {
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
            None => (x, y, x, y),
        });
    }

    let (x0, y0, x1, y1) = bounds?;
    let left = x0.saturating_sub(pad);
    let top = y0.saturating_sub(pad);
    let right = (x1 + pad).min(width - 1);
    let bottom = (y1 + pad).min(pixmap.height() - 1);
    if left == 0 && top == 0 && right == width - 1 && bottom == pixmap.height() - 1 {
        return None;
    }
    let rect = IntRect::from_xywh(
        left as i32,
        top as i32,
        right - left + 1,
        bottom - top + 1,
    )?;
    pixmap.clone_rect(rect)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

    fn png_size(png: &[u8]) -> (u32, u32) {
        let width = u32::from_be_bytes([png[16], png[17], png[18], png[19]]);
        let height = u32::from_be_bytes([png[20], png[21], png[22], png[23]]);
        (width, height)
    }

    #[test]
    fn crops_to_drawn_content_with_padding() {
        let document = "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"100\" height=\"100\" viewBox=\"0 0 100 100\">\
             <rect x=\"40\" y=\"40\" width=\"10\" height=\"10\" fill=\"#000000\"/></svg>";
        let png = rasterize(document, 5.0).expect("rasterize");
        assert!(png.starts_with(PNG_MAGIC));
        let (width, height) = png_size(&png);
        assert!((19..=22).contains(&width), "width {width}");
        assert!((19..=22).contains(&height), "height {height}");
    }

    #[test]
    fn blank_canvas_keeps_full_size() {
        let document = "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"30\" height=\"20\" viewBox=\"0 0 30 20\"></svg>";
        let png = rasterize(document, 5.0).expect("rasterize");
        assert_eq!(png_size(&png), (30, 20));
    }

    #[test]
    fn malformed_document_is_rejected() {
        assert!(matches!(
            rasterize("<svg", 0.0),
            Err(RasterError::Parse(_))
        ));
    }
}
