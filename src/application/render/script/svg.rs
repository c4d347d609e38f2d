//! Pixel-space layout of a [`Figure`] and its [`Axes`] as an SVG document.

use super::{
    color::Color,
    figure::{Artist, Axes, Figure, HAlign, Shape, Stroke},
};

const FONT_FAMILY: &str = "sans-serif";
const TICK_FONT_PT: f64 = 10.0;
const LABEL_FONT_PT: f64 = 10.0;
const TITLE_FONT_PT: f64 = 12.0;
const LEGEND_FONT_PT: f64 = 10.0;
const TICK_LENGTH_PT: f64 = 3.5;
const TICK_WIDTH_PT: f64 = 0.8;
const TICK_PAD_PT: f64 = 3.5;
const LABEL_PAD_PT: f64 = 4.0;
const TITLE_PAD_PT: f64 = 6.0;
const LAYOUT_PAD_PT: f64 = 10.8;
/// Average glyph advance as a fraction of the font size.
const CHAR_WIDTH: f64 = 0.6;
const DATA_MARGIN: f64 = 0.05;
const TARGET_TICKS: f64 = 6.0;
const MAX_TICKS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Rect {
    left: f64,
    top: f64,
    width: f64,
    height: f64,
}

impl Rect {
    fn right(&self) -> f64 {
        self.left + self.width
    }

    fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

/// Data-to-pixel mapping for the axes box.
struct Transform {
    rect: Rect,
    x: (f64, f64),
    y: (f64, f64),
}

impl Transform {
    fn x(&self, value: f64) -> f64 {
        self.rect.left + (value - self.x.0) / (self.x.1 - self.x.0) * self.rect.width
    }

    fn y(&self, value: f64) -> f64 {
        self.rect.bottom() - (value - self.y.0) / (self.y.1 - self.y.0) * self.rect.height
    }

    fn point(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let point = (self.x(x), self.y(y));
        (point.0.is_finite() && point.1.is_finite()).then_some(point)
    }

    /// Pixels per data unit along x.
    fn scale_x(&self) -> f64 {
        self.rect.width / (self.x.1 - self.x.0).abs()
    }

    fn scale_y(&self) -> f64 {
        self.rect.height / (self.y.1 - self.y.0).abs()
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Ticks {
    values: Vec<f64>,
    labels: Vec<String>,
}

impl Ticks {
    fn widest_label(&self) -> usize {
        self.labels
            .iter()
            .map(|label| label.chars().count())
            .max()
            .unwrap_or(0)
    }
}

/// Produce the complete SVG document for one figure.
pub(super) fn render_document(figure: &Figure, axes: &Axes) -> String {
    let scale = figure.points_to_px(1.0);
    let width = f64::from(figure.width_px());
    let height = f64::from(figure.height_px());

    let (xlim, ylim) = view_limits(axes);
    let xticks = ticks(xlim);
    let yticks = ticks(ylim);

    let mut rect = layout(figure, axes, &xticks, &yticks);
    if axes.aspect_equal {
        rect = equal_aspect(rect, xlim, ylim);
    }
    let transform = Transform {
        rect,
        x: xlim,
        y: ylim,
    };

    let mut svg = String::new();
    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\">"
    ));
    svg.push_str(&format!(
        "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        Color::WHITE
    ));
    svg.push_str(&format!(
        "<defs><clipPath id=\"axes-clip\"><rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\"/></clipPath></defs>",
        rect.left, rect.top, rect.width, rect.height
    ));

    if axes.axis_visible {
        svg.push_str(&format!(
            "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" fill=\"{}\"/>",
            rect.left,
            rect.top,
            rect.width,
            rect.height,
            Color::WHITE
        ));
        svg.push_str(&grid(axes, &transform, &xticks, &yticks, scale));
    }

    let mut ordered: Vec<&Artist> = axes.artists.iter().collect();
    ordered.sort_by_key(|artist| z_order(artist));

    svg.push_str("<g clip-path=\"url(#axes-clip)\">");
    for artist in ordered.iter().filter(|artist| !matches!(artist, Artist::Text { .. })) {
        svg.push_str(&artist_svg(artist, &transform, scale));
    }
    svg.push_str("</g>");
    for artist in ordered.iter().filter(|artist| matches!(artist, Artist::Text { .. })) {
        svg.push_str(&artist_svg(artist, &transform, scale));
    }

    if axes.axis_visible {
        svg.push_str(&frame(axes, &transform, &xticks, &yticks, scale));
    }
    if let Some(title) = &axes.title {
        let baseline = rect.top - TITLE_PAD_PT * scale;
        svg.push_str(&text_svg(
            rect.left + rect.width / 2.0,
            baseline,
            title,
            TITLE_FONT_PT * scale,
            Color::BLACK,
            HAlign::Center,
        ));
    }
    if let Some(suptitle) = &figure.suptitle {
        let size = TITLE_FONT_PT * scale;
        svg.push_str(&text_svg(
            width / 2.0,
            height * 0.02 + size * 0.8,
            suptitle,
            size,
            Color::BLACK,
            HAlign::Center,
        ));
    }
    if axes.legend && axes.has_legend_entries() {
        svg.push_str(&legend(axes, rect, scale));
    }
    for text in &figure.texts {
        svg.push_str(&text_svg(
            text.x * width,
            (1.0 - text.y) * height,
            &text.text,
            text.fontsize * scale,
            text.color,
            text.align,
        ));
    }

    svg.push_str("</svg>");
    svg
}

fn view_limits(axes: &Axes) -> ((f64, f64), (f64, f64)) {
    let bounds = axes.data_bounds();
    let x = axes.xlim.unwrap_or_else(|| padded(bounds.x));
    let y = axes.ylim.unwrap_or_else(|| padded(bounds.y));
    (x, y)
}

fn padded(range: Option<(f64, f64)>) -> (f64, f64) {
    match range {
        None => (0.0, 1.0),
        Some((lo, hi)) if lo == hi => (lo - 0.5, hi + 0.5),
        Some((lo, hi)) => {
            let margin = (hi - lo) * DATA_MARGIN;
            (lo - margin, hi + margin)
        }
    }
}

/// Step from the 1, 2, 2.5, 5 family closest to `span / TARGET_TICKS`.
fn nice_step(span: f64) -> f64 {
    let raw = span / TARGET_TICKS;
    let magnitude = 10f64.powf(raw.log10().floor());
    let normalized = raw / magnitude;
    let step = if normalized < 1.5 {
        1.0
    } else if normalized < 2.25 {
        2.0
    } else if normalized < 3.5 {
        2.5
    } else if normalized < 7.5 {
        5.0
    } else {
        10.0
    };
    step * magnitude
}

fn ticks(limits: (f64, f64)) -> Ticks {
    let (lo, hi) = (limits.0.min(limits.1), limits.0.max(limits.1));
    let span = hi - lo;
    if !span.is_finite() || span <= 0.0 {
        return Ticks {
            values: Vec::new(),
            labels: Vec::new(),
        };
    }

    let step = nice_step(span);
    let tolerance = step * 1e-9;
    let first = (lo / step).ceil();
    let values: Vec<f64> = (0..MAX_TICKS)
        .map(|i| (first + i as f64) * step)
        .take_while(|value| *value <= hi + tolerance)
        .map(|value| if value.abs() < tolerance { 0.0 } else { value })
        .collect();

    let decimals = decimals_for(step);
    let labels = values
        .iter()
        .map(|value| format_tick(*value, decimals))
        .collect();
    Ticks { values, labels }
}

fn decimals_for(step: f64) -> usize {
    (0..=10)
        .find(|decimals| {
            let scaled = step * 10f64.powi(*decimals as i32);
            (scaled - scaled.round()).abs() < 1e-6 * scaled.abs().max(1.0)
        })
        .unwrap_or(10)
}

fn format_tick(value: f64, decimals: usize) -> String {
    let label = format!("{value:.decimals$}");
    if label.starts_with('-') && label.trim_start_matches(['-', '0', '.']).is_empty() {
        return label.trim_start_matches('-').to_string();
    }
    label.replace('-', "\u{2212}")
}

fn estimate_width(chars: usize, font_px: f64) -> f64 {
    chars as f64 * CHAR_WIDTH * font_px
}

fn layout(figure: &Figure, axes: &Axes, xticks: &Ticks, yticks: &Ticks) -> Rect {
    let width = f64::from(figure.width_px());
    let height = f64::from(figure.height_px());
    if !figure.tight {
        return Rect {
            left: 0.125 * width,
            top: 0.12 * height,
            width: 0.775 * width,
            height: 0.77 * height,
        };
    }

    let scale = figure.points_to_px(1.0);
    let pad = LAYOUT_PAD_PT * scale;
    let (mut left, mut right, mut top, mut bottom) = (pad, pad, pad, pad);

    if axes.axis_visible {
        let tick_font = TICK_FONT_PT * scale;
        let tick_space = (TICK_LENGTH_PT + TICK_PAD_PT) * scale;
        left += tick_space + estimate_width(yticks.widest_label(), tick_font);
        bottom += tick_space + tick_font;
        let last_x = xticks.labels.last().map_or(0, |label| label.chars().count());
        right += estimate_width(last_x, tick_font) / 2.0;
        top += tick_font / 2.0;
        if axes.ylabel.is_some() {
            left += (LABEL_FONT_PT + LABEL_PAD_PT) * scale;
        }
        if axes.xlabel.is_some() {
            bottom += (LABEL_FONT_PT + LABEL_PAD_PT) * scale;
        }
    }
    if axes.title.is_some() {
        top += (TITLE_FONT_PT + TITLE_PAD_PT) * scale;
    }
    if figure.suptitle.is_some() {
        top += TITLE_FONT_PT * 1.4 * scale;
    }

    Rect {
        left,
        top,
        width: (width - left - right).max(1.0),
        height: (height - top - bottom).max(1.0),
    }
}

fn equal_aspect(rect: Rect, x: (f64, f64), y: (f64, f64)) -> Rect {
    let dx = (x.1 - x.0).abs();
    let dy = (y.1 - y.0).abs();
    let unit = (rect.width / dx).min(rect.height / dy);
    if !unit.is_finite() {
        return rect;
    }
    let width = unit * dx;
    let height = unit * dy;
    Rect {
        left: rect.left + (rect.width - width) / 2.0,
        top: rect.top + (rect.height - height) / 2.0,
        width,
        height,
    }
}

fn z_order(artist: &Artist) -> u8 {
    match artist {
        Artist::Patch { .. }
        | Artist::Bars { .. }
        | Artist::FillBetween { .. }
        | Artist::Scatter { .. }
        | Artist::Arrow { .. } => 1,
        Artist::Line { .. } | Artist::HLine { .. } | Artist::VLine { .. } => 2,
        Artist::Text { .. } => 3,
    }
}

fn stroke_attrs(stroke: &Stroke, scale: f64) -> String {
    let width = stroke.width * scale;
    let mut attrs = format!(
        "stroke=\"{}\" stroke-width=\"{width:.2}\" stroke-opacity=\"{:.3}\"",
        stroke.color, stroke.alpha
    );
    if let Some(pattern) = stroke.style.dash_pattern() {
        if width > 0.0 {
            let dashes = pattern
                .iter()
                .map(|dash| format!("{:.2}", dash * width))
                .collect::<Vec<_>>()
                .join(" ");
            attrs.push_str(&format!(" stroke-dasharray=\"{dashes}\""));
        }
    }
    attrs
}

fn points_attr(points: &[(f64, f64)]) -> String {
    points
        .iter()
        .map(|(x, y)| format!("{x:.2},{y:.2}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn anchor(align: HAlign) -> &'static str {
    match align {
        HAlign::Left => "start",
        HAlign::Center => "middle",
        HAlign::Right => "end",
    }
}

fn text_svg(x: f64, y: f64, text: &str, size: f64, color: Color, align: HAlign) -> String {
    if !x.is_finite() || !y.is_finite() {
        return String::new();
    }
    format!(
        "<text x=\"{x:.2}\" y=\"{y:.2}\" font-family=\"{FONT_FAMILY}\" font-size=\"{size:.2}\" fill=\"{color}\" text-anchor=\"{}\">{}</text>",
        anchor(align),
        escape_xml(text)
    )
}

/// Split a series into drawable runs, breaking at non-finite points.
fn runs(xs: &[f64], ys: &[f64], transform: &Transform) -> Vec<Vec<(f64, f64)>> {
    let mut runs = Vec::new();
    let mut current = Vec::new();
    for (x, y) in xs.iter().zip(ys) {
        match transform.point(*x, *y) {
            Some(point) => current.push(point),
            None if !current.is_empty() => runs.push(std::mem::take(&mut current)),
            None => {}
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}

fn artist_svg(artist: &Artist, transform: &Transform, scale: f64) -> String {
    let mut svg = String::new();
    match artist {
        Artist::Line { xs, ys, stroke, .. } => {
            let attrs = stroke_attrs(stroke, scale);
            for run in runs(xs, ys, transform).iter().filter(|run| run.len() > 1) {
                svg.push_str(&format!(
                    "<polyline points=\"{}\" fill=\"none\" stroke-linejoin=\"round\" {attrs}/>",
                    points_attr(run)
                ));
            }
        }
        Artist::Scatter {
            xs,
            ys,
            color,
            size,
            alpha,
            ..
        } => {
            let radius = size * scale;
            for (x, y) in xs.iter().zip(ys) {
                if let Some((cx, cy)) = transform.point(*x, *y) {
                    svg.push_str(&format!(
                        "<circle cx=\"{cx:.2}\" cy=\"{cy:.2}\" r=\"{radius:.2}\" fill=\"{color}\" fill-opacity=\"{alpha:.3}\"/>"
                    ));
                }
            }
        }
        Artist::Bars {
            xs,
            heights,
            width,
            color,
            alpha,
            ..
        } => {
            for (x, h) in xs.iter().zip(heights) {
                let corners = (
                    transform.point(x - width / 2.0, 0.0),
                    transform.point(x + width / 2.0, *h),
                );
                if let (Some((x0, y0)), Some((x1, y1))) = corners {
                    svg.push_str(&format!(
                        "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" fill=\"{color}\" fill-opacity=\"{alpha:.3}\"/>",
                        x0.min(x1),
                        y0.min(y1),
                        (x1 - x0).abs(),
                        (y1 - y0).abs()
                    ));
                }
            }
        }
        Artist::FillBetween {
            xs,
            lower,
            upper,
            color,
            alpha,
            ..
        } => {
            let top: Vec<_> = xs
                .iter()
                .zip(upper)
                .filter_map(|(x, y)| transform.point(*x, *y))
                .collect();
            let bottom: Vec<_> = xs
                .iter()
                .zip(lower)
                .filter_map(|(x, y)| transform.point(*x, *y))
                .collect();
            let outline: Vec<_> = top.into_iter().chain(bottom.into_iter().rev()).collect();
            if outline.len() > 2 {
                svg.push_str(&format!(
                    "<polygon points=\"{}\" fill=\"{color}\" fill-opacity=\"{alpha:.3}\" stroke=\"none\"/>",
                    points_attr(&outline)
                ));
            }
        }
        Artist::Text {
            x,
            y,
            text,
            color,
            fontsize,
            align,
        } => {
            if let Some((px, py)) = transform.point(*x, *y) {
                svg.push_str(&text_svg(px, py, text, fontsize * scale, *color, *align));
            }
        }
        Artist::Arrow {
            x,
            y,
            dx,
            dy,
            stroke,
        } => {
            if let (Some(start), Some(end)) =
                (transform.point(*x, *y), transform.point(x + dx, y + dy))
            {
                svg.push_str(&arrow_svg(start, end, stroke, scale));
            }
        }
        Artist::HLine { y, stroke } => {
            let py = transform.y(*y);
            if py.is_finite() {
                svg.push_str(&format!(
                    "<line x1=\"{:.2}\" y1=\"{py:.2}\" x2=\"{:.2}\" y2=\"{py:.2}\" {}/>",
                    transform.rect.left,
                    transform.rect.right(),
                    stroke_attrs(stroke, scale)
                ));
            }
        }
        Artist::VLine { x, stroke } => {
            let px = transform.x(*x);
            if px.is_finite() {
                svg.push_str(&format!(
                    "<line x1=\"{px:.2}\" y1=\"{:.2}\" x2=\"{px:.2}\" y2=\"{:.2}\" {}/>",
                    transform.rect.top,
                    transform.rect.bottom(),
                    stroke_attrs(stroke, scale)
                ));
            }
        }
        Artist::Patch {
            shape,
            face,
            edge,
            alpha,
            ..
        } => {
            let fill = match face {
                Some(color) => format!("fill=\"{color}\" fill-opacity=\"{alpha:.3}\""),
                None => "fill=\"none\"".to_string(),
            };
            let outline = match edge {
                Some(edge) => stroke_attrs(
                    &Stroke {
                        alpha: *alpha,
                        ..*edge
                    },
                    scale,
                ),
                None => "stroke=\"none\"".to_string(),
            };
            svg.push_str(&shape_svg(shape, transform, &fill, &outline));
        }
    }
    svg
}

fn shape_svg(shape: &Shape, transform: &Transform, fill: &str, outline: &str) -> String {
    match shape {
        Shape::Circle { cx, cy, r } => match transform.point(*cx, *cy) {
            Some((px, py)) => format!(
                "<ellipse cx=\"{px:.2}\" cy=\"{py:.2}\" rx=\"{:.2}\" ry=\"{:.2}\" {fill} {outline}/>",
                r * transform.scale_x(),
                r * transform.scale_y()
            ),
            None => String::new(),
        },
        Shape::Rect { x, y, w, h } => {
            let corners = [(*x, *y), (x + w, *y), (x + w, y + h), (*x, y + h)];
            polygon_svg(&corners, transform, fill, outline)
        }
        Shape::Polygon { points } => polygon_svg(points, transform, fill, outline),
    }
}

fn polygon_svg(points: &[(f64, f64)], transform: &Transform, fill: &str, outline: &str) -> String {
    let points: Option<Vec<_>> = points
        .iter()
        .map(|(x, y)| transform.point(*x, *y))
        .collect();
    match points {
        Some(points) => format!(
            "<polygon points=\"{}\" {fill} {outline} stroke-linejoin=\"miter\"/>",
            points_attr(&points)
        ),
        None => String::new(),
    }
}

fn arrow_svg(start: (f64, f64), end: (f64, f64), stroke: &Stroke, scale: f64) -> String {
    let (dx, dy) = (end.0 - start.0, end.1 - start.1);
    let length = dx.hypot(dy);
    if length < 1e-9 {
        return String::new();
    }
    let (ux, uy) = (dx / length, dy / length);
    let stroke_px = stroke.width * scale;
    let head_length = (3.0 * scale + 3.0 * stroke_px).min(length);
    let half_width = head_length * 0.5;
    let base = (end.0 - ux * head_length, end.1 - uy * head_length);
    let wings = [
        end,
        (base.0 - uy * half_width, base.1 + ux * half_width),
        (base.0 + uy * half_width, base.1 - ux * half_width),
    ];

    let mut svg = format!(
        "<line x1=\"{:.2}\" y1=\"{:.2}\" x2=\"{:.2}\" y2=\"{:.2}\" {}/>",
        start.0,
        start.1,
        base.0,
        base.1,
        stroke_attrs(stroke, scale)
    );
    svg.push_str(&format!(
        "<polygon points=\"{}\" fill=\"{}\" fill-opacity=\"{:.3}\"/>",
        points_attr(&wings),
        stroke.color,
        stroke.alpha
    ));
    svg
}

fn grid(axes: &Axes, transform: &Transform, xticks: &Ticks, yticks: &Ticks, scale: f64) -> String {
    let Some(style) = axes.grid else {
        return String::new();
    };
    let stroke = Stroke {
        color: Color::GRID,
        width: style.width,
        style: style.style,
        alpha: style.alpha,
    };
    let attrs = stroke_attrs(&stroke, scale);
    let rect = transform.rect;

    let mut svg = String::from("<g clip-path=\"url(#axes-clip)\">");
    for value in &xticks.values {
        let x = transform.x(*value);
        svg.push_str(&format!(
            "<line x1=\"{x:.2}\" y1=\"{:.2}\" x2=\"{x:.2}\" y2=\"{:.2}\" {attrs}/>",
            rect.top,
            rect.bottom()
        ));
    }
    for value in &yticks.values {
        let y = transform.y(*value);
        svg.push_str(&format!(
            "<line x1=\"{:.2}\" y1=\"{y:.2}\" x2=\"{:.2}\" y2=\"{y:.2}\" {attrs}/>",
            rect.left,
            rect.right()
        ));
    }
    svg.push_str("</g>");
    svg
}

/// Spines, ticks, tick labels and axis labels.
fn frame(axes: &Axes, transform: &Transform, xticks: &Ticks, yticks: &Ticks, scale: f64) -> String {
    let rect = transform.rect;
    let tick_length = TICK_LENGTH_PT * scale;
    let tick_font = TICK_FONT_PT * scale;
    let label_font = LABEL_FONT_PT * scale;
    let tick_gap = (TICK_LENGTH_PT + TICK_PAD_PT) * scale;

    let mut svg = format!(
        "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{:.2}\" height=\"{:.2}\" fill=\"none\" stroke=\"{}\" stroke-width=\"{:.2}\"/>",
        rect.left,
        rect.top,
        rect.width,
        rect.height,
        Color::BLACK,
        axes.spine_width * scale
    );

    let tick_attrs = format!(
        "stroke=\"{}\" stroke-width=\"{:.2}\"",
        Color::BLACK,
        TICK_WIDTH_PT * scale
    );
    for (value, label) in xticks.values.iter().zip(&xticks.labels) {
        let x = transform.x(*value);
        svg.push_str(&format!(
            "<line x1=\"{x:.2}\" y1=\"{:.2}\" x2=\"{x:.2}\" y2=\"{:.2}\" {tick_attrs}/>",
            rect.bottom(),
            rect.bottom() + tick_length
        ));
        svg.push_str(&text_svg(
            x,
            rect.bottom() + tick_gap + tick_font * 0.8,
            label,
            tick_font,
            Color::BLACK,
            HAlign::Center,
        ));
    }
    for (value, label) in yticks.values.iter().zip(&yticks.labels) {
        let y = transform.y(*value);
        svg.push_str(&format!(
            "<line x1=\"{:.2}\" y1=\"{y:.2}\" x2=\"{:.2}\" y2=\"{y:.2}\" {tick_attrs}/>",
            rect.left - tick_length,
            rect.left
        ));
        svg.push_str(&text_svg(
            rect.left - tick_gap,
            y + tick_font * 0.35,
            label,
            tick_font,
            Color::BLACK,
            HAlign::Right,
        ));
    }

    if let Some(xlabel) = &axes.xlabel {
        let baseline =
            rect.bottom() + tick_gap + tick_font + LABEL_PAD_PT * scale + label_font * 0.8;
        svg.push_str(&text_svg(
            rect.left + rect.width / 2.0,
            baseline,
            xlabel,
            label_font,
            Color::BLACK,
            HAlign::Center,
        ));
    }
    if let Some(ylabel) = &axes.ylabel {
        let baseline = rect.left
            - tick_gap
            - estimate_width(yticks.widest_label(), tick_font)
            - LABEL_PAD_PT * scale
            - label_font * 0.2;
        let center = rect.top + rect.height / 2.0;
        svg.push_str(&format!(
            "<text transform=\"translate({baseline:.2} {center:.2}) rotate(-90)\" font-family=\"{FONT_FAMILY}\" font-size=\"{label_font:.2}\" fill=\"{}\" text-anchor=\"middle\">{}</text>",
            Color::BLACK,
            escape_xml(ylabel)
        ));
    }
    svg
}

fn legend(axes: &Axes, rect: Rect, scale: f64) -> String {
    let entries: Vec<(&Artist, &str)> = axes
        .artists
        .iter()
        .filter_map(|artist| artist.label().map(|label| (artist, label)))
        .collect();

    let font = LEGEND_FONT_PT * scale;
    let row = font * 1.4;
    let padding = font * 0.4;
    let handle = font * 2.0;
    let gap = font * 0.8;
    let widest = entries
        .iter()
        .map(|(_, label)| label.chars().count())
        .max()
        .unwrap_or(0);
    let width = padding * 2.0 + handle + gap + estimate_width(widest, font);
    let height = padding * 2.0 + row * entries.len() as f64;
    let left = rect.right() - width - padding;
    let top = rect.top + padding;

    let mut svg = format!(
        "<rect x=\"{left:.2}\" y=\"{top:.2}\" width=\"{width:.2}\" height=\"{height:.2}\" rx=\"{:.2}\" fill=\"{}\" fill-opacity=\"0.8\" stroke=\"#cccccc\" stroke-width=\"{:.2}\"/>",
        font * 0.2,
        Color::WHITE,
        0.8 * scale
    );
    for (index, (artist, label)) in entries.iter().enumerate() {
        let center_y = top + padding + row * (index as f64 + 0.5);
        let handle_left = left + padding;
        svg.push_str(&legend_handle(artist, handle_left, center_y, handle, font, scale));
        svg.push_str(&text_svg(
            handle_left + handle + gap,
            center_y + font * 0.35,
            label,
            font,
            Color::BLACK,
            HAlign::Left,
        ));
    }
    svg
}

fn legend_handle(artist: &Artist, left: f64, center_y: f64, length: f64, font: f64, scale: f64) -> String {
    match artist {
        Artist::Line { stroke, .. } => format!(
            "<line x1=\"{left:.2}\" y1=\"{center_y:.2}\" x2=\"{:.2}\" y2=\"{center_y:.2}\" {}/>",
            left + length,
            stroke_attrs(stroke, scale)
        ),
        Artist::Scatter {
            color, size, alpha, ..
        } => format!(
            "<circle cx=\"{:.2}\" cy=\"{center_y:.2}\" r=\"{:.2}\" fill=\"{color}\" fill-opacity=\"{alpha:.3}\"/>",
            left + length / 2.0,
            (size * scale).min(font / 2.0)
        ),
        Artist::Bars { color, alpha, .. } | Artist::FillBetween { color, alpha, .. } => {
            swatch(left, center_y, length, font, *color, *alpha)
        }
        Artist::Patch {
            face, edge, alpha, ..
        } => {
            let color = face.or(edge.map(|edge| edge.color)).unwrap_or(Color::BLACK);
            swatch(left, center_y, length, font, color, *alpha)
        }
        _ => String::new(),
    }
}

fn swatch(left: f64, center_y: f64, length: f64, font: f64, color: Color, alpha: f64) -> String {
    let height = font * 0.7;
    format!(
        "<rect x=\"{left:.2}\" y=\"{:.2}\" width=\"{length:.2}\" height=\"{height:.2}\" fill=\"{color}\" fill-opacity=\"{alpha:.3}\"/>",
        center_y - height / 2.0
    )
}
