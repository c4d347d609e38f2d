//! In-memory figure model mutated by drawing scripts.
//!
//! A [`Figure`] owns exactly one [`Axes`]. Nothing here touches process-wide
//! state: every render builds its own pair and threads it explicitly through
//! script execution, post-processing and serialization.

use super::color::Color;

/// Stroke dash pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Solid,
    Dashed,
    Dotted,
    DashDot,
}

impl LineStyle {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "-" | "solid" => Some(LineStyle::Solid),
            "--" | "dashed" => Some(LineStyle::Dashed),
            ":" | "dotted" => Some(LineStyle::Dotted),
            "-." | "dashdot" => Some(LineStyle::DashDot),
            _ => None,
        }
    }

    /// Dash lengths as multiples of the stroke width.
    pub fn dash_pattern(self) -> Option<&'static [f64]> {
        match self {
            LineStyle::Solid => None,
            LineStyle::Dashed => Some(&[3.7, 1.6]),
            LineStyle::Dotted => Some(&[1.0, 1.65]),
            LineStyle::DashDot => Some(&[6.4, 1.6, 1.0, 1.6]),
        }
    }
}

/// Horizontal text anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HAlign {
    Left,
    Center,
    Right,
}

impl HAlign {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "left" => Some(HAlign::Left),
            "center" | "centre" => Some(HAlign::Center),
            "right" => Some(HAlign::Right),
            _ => None,
        }
    }
}

/// Stroke parameters; `width` is in points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub color: Color,
    pub width: f64,
    pub style: LineStyle,
    pub alpha: f64,
}

impl Stroke {
    pub fn solid(color: Color, width: f64) -> Self {
        Self {
            color,
            width,
            style: LineStyle::Solid,
            alpha: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Circle { cx: f64, cy: f64, r: f64 },
    Rect { x: f64, y: f64, w: f64, h: f64 },
    Polygon { points: Vec<(f64, f64)> },
}

/// Something drawn inside the axes, in data coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum Artist {
    Line {
        xs: Vec<f64>,
        ys: Vec<f64>,
        stroke: Stroke,
        label: Option<String>,
    },
    Scatter {
        xs: Vec<f64>,
        ys: Vec<f64>,
        color: Color,
        size: f64,
        alpha: f64,
        label: Option<String>,
    },
    Bars {
        xs: Vec<f64>,
        heights: Vec<f64>,
        width: f64,
        color: Color,
        alpha: f64,
        label: Option<String>,
    },
    FillBetween {
        xs: Vec<f64>,
        lower: Vec<f64>,
        upper: Vec<f64>,
        color: Color,
        alpha: f64,
        label: Option<String>,
    },
    Text {
        x: f64,
        y: f64,
        text: String,
        color: Color,
        fontsize: f64,
        align: HAlign,
    },
    Arrow {
        x: f64,
        y: f64,
        dx: f64,
        dy: f64,
        stroke: Stroke,
    },
    HLine {
        y: f64,
        stroke: Stroke,
    },
    VLine {
        x: f64,
        stroke: Stroke,
    },
    Patch {
        shape: Shape,
        face: Option<Color>,
        edge: Option<Stroke>,
        alpha: f64,
        label: Option<String>,
    },
}

impl Artist {
    pub fn label(&self) -> Option<&str> {
        match self {
            Artist::Line { label, .. }
            | Artist::Scatter { label, .. }
            | Artist::Bars { label, .. }
            | Artist::FillBetween { label, .. }
            | Artist::Patch { label, .. } => label.as_deref(),
            _ => None,
        }
    }
}

/// Grid appearance applied during post-processing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridStyle {
    pub style: LineStyle,
    pub width: f64,
    pub alpha: f64,
}

/// Axis-aligned data bounds accumulated over artists.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub x: Option<(f64, f64)>,
    pub y: Option<(f64, f64)>,
}

impl Bounds {
    fn empty() -> Self {
        Self { x: None, y: None }
    }

    fn include_x(&mut self, value: f64) {
        if value.is_finite() {
            self.x = Some(extend(self.x, value));
        }
    }

    fn include_y(&mut self, value: f64) {
        if value.is_finite() {
            self.y = Some(extend(self.y, value));
        }
    }

    fn include(&mut self, x: f64, y: f64) {
        self.include_x(x);
        self.include_y(y);
    }
}

fn extend(range: Option<(f64, f64)>, value: f64) -> (f64, f64) {
    match range {
        Some((lo, hi)) => (lo.min(value), hi.max(value)),
        None => (value, value),
    }
}

pub const DEFAULT_LINE_WIDTH: f64 = 1.5;
pub const DEFAULT_FONT_SIZE: f64 = 10.0;
pub const DEFAULT_SPINE_WIDTH: f64 = 0.8;

#[derive(Debug, Clone, PartialEq)]
pub struct Axes {
    pub artists: Vec<Artist>,
    pub title: Option<String>,
    pub xlabel: Option<String>,
    pub ylabel: Option<String>,
    pub xlim: Option<(f64, f64)>,
    pub ylim: Option<(f64, f64)>,
    pub aspect_equal: bool,
    pub legend: bool,
    pub axis_visible: bool,
    pub grid: Option<GridStyle>,
    pub spine_width: f64,
    cycle_index: usize,
}

impl Default for Axes {
    fn default() -> Self {
        Self {
            artists: Vec::new(),
            title: None,
            xlabel: None,
            ylabel: None,
            xlim: None,
            ylim: None,
            aspect_equal: false,
            legend: false,
            axis_visible: true,
            grid: None,
            spine_width: DEFAULT_SPINE_WIDTH,
            cycle_index: 0,
        }
    }
}

impl Axes {
    /// Next colour from the property cycle, used when a call omits `color`.
    pub fn next_color(&mut self) -> Color {
        let color = Color::cycle(self.cycle_index);
        self.cycle_index += 1;
        color
    }

    pub fn push(&mut self, artist: Artist) {
        self.artists.push(artist);
    }

    /// Release every artist. Called when the owning context is disposed.
    pub fn clear(&mut self) {
        *self = Axes::default();
    }

    pub fn data_bounds(&self) -> Bounds {
        let mut bounds = Bounds::empty();
        for artist in &self.artists {
            match artist {
                Artist::Line { xs, ys, .. } | Artist::Scatter { xs, ys, .. } => {
                    for (x, y) in xs.iter().zip(ys) {
                        bounds.include(*x, *y);
                    }
                }
                Artist::Bars {
                    xs, heights, width, ..
                } => {
                    for (x, h) in xs.iter().zip(heights) {
                        bounds.include(x - width / 2.0, 0.0);
                        bounds.include(x + width / 2.0, *h);
                    }
                }
                Artist::FillBetween {
                    xs, lower, upper, ..
                } => {
                    for ((x, lo), hi) in xs.iter().zip(lower).zip(upper) {
                        bounds.include(*x, *lo);
                        bounds.include(*x, *hi);
                    }
                }
                Artist::Text { x, y, .. } => bounds.include(*x, *y),
                Artist::Arrow { x, y, dx, dy, .. } => {
                    bounds.include(*x, *y);
                    bounds.include(x + dx, y + dy);
                }
                Artist::HLine { y, .. } => bounds.include_y(*y),
                Artist::VLine { x, .. } => bounds.include_x(*x),
                Artist::Patch { shape, .. } => match shape {
                    Shape::Circle { cx, cy, r } => {
                        bounds.include(cx - r, cy - r);
                        bounds.include(cx + r, cy + r);
                    }
                    Shape::Rect { x, y, w, h } => {
                        bounds.include(*x, *y);
                        bounds.include(x + w, y + h);
                    }
                    Shape::Polygon { points } => {
                        for (x, y) in points {
                            bounds.include(*x, *y);
                        }
                    }
                },
            }
        }
        bounds
    }

    pub fn has_legend_entries(&self) -> bool {
        self.artists.iter().any(|artist| artist.label().is_some())
    }
}

/// Text placed in figure-relative coordinates (0..1 on both axes).
#[derive(Debug, Clone, PartialEq)]
pub struct FigureText {
    pub x: f64,
    pub y: f64,
    pub text: String,
    pub color: Color,
    pub fontsize: f64,
    pub align: HAlign,
}

/// Drawing surface with a fixed pixel size.
#[derive(Debug, Clone, PartialEq)]
pub struct Figure {
    pub width_inches: f64,
    pub height_inches: f64,
    pub dpi: f64,
    pub suptitle: Option<String>,
    pub texts: Vec<FigureText>,
    pub tight: bool,
}

impl Figure {
    pub fn new(width_inches: f64, height_inches: f64, dpi: f64) -> Self {
        Self {
            width_inches,
            height_inches,
            dpi,
            suptitle: None,
            texts: Vec::new(),
            tight: false,
        }
    }

    pub fn width_px(&self) -> u32 {
        (self.width_inches * self.dpi).round().max(1.0) as u32
    }

    pub fn height_px(&self) -> u32 {
        (self.height_inches * self.dpi).round().max(1.0) as u32
    }

    /// Convert a length in points to pixels at the figure's resolution.
    pub fn points_to_px(&self, points: f64) -> f64 {
        points * self.dpi / 72.0
    }

    pub fn tight_layout(&mut self) {
        self.tight = true;
    }

    pub fn clear(&mut self) {
        self.suptitle = None;
        self.texts.clear();
        self.tight = false;
    }
}
