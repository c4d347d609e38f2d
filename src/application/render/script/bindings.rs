//! Methods exposed on the `fig` and `ax` handles.

use std::{cell::RefCell, rc::Rc};

use rhai::{Array, Dynamic, Engine, ImmutableString, Map};

use super::{
    color::Color,
    figure::{
        Artist, Axes, DEFAULT_FONT_SIZE, DEFAULT_LINE_WIDTH, Figure, FigureText, HAlign, LineStyle,
        Shape, Stroke,
    },
    numeric::{ScriptResult, as_number, as_numbers},
};

/// Script-visible handle to the figure owned by a plotting context.
#[derive(Debug, Clone)]
pub struct FigureHandle(pub(super) Rc<RefCell<Figure>>);

/// Script-visible handle to the axes owned by a plotting context.
#[derive(Debug, Clone)]
pub struct AxesHandle(pub(super) Rc<RefCell<Axes>>);

impl AxesHandle {
    fn with<R>(&self, f: impl FnOnce(&mut Axes) -> R) -> R {
        f(&mut self.0.borrow_mut())
    }
}

const LINE_OPTIONS: &[&str] = &["color", "linewidth", "linestyle", "alpha", "label"];
const SCATTER_OPTIONS: &[&str] = &["color", "size", "alpha", "label"];
const BAR_OPTIONS: &[&str] = &["color", "width", "alpha", "label"];
const FILL_OPTIONS: &[&str] = &["color", "alpha", "label"];
const TEXT_OPTIONS: &[&str] = &["color", "fontsize", "ha"];
const ARROW_OPTIONS: &[&str] = &["color", "linewidth", "alpha"];
const REFERENCE_OPTIONS: &[&str] = &["color", "linewidth", "linestyle", "alpha"];
const PATCH_OPTIONS: &[&str] = &[
    "color",
    "facecolor",
    "edgecolor",
    "fill",
    "linewidth",
    "linestyle",
    "alpha",
    "label",
];

/// Keyword-style options passed as a trailing object map.
struct Options<'a> {
    call: &'static str,
    map: Option<&'a Map>,
}

impl<'a> Options<'a> {
    fn new(call: &'static str, map: Option<&'a Map>, allowed: &[&str]) -> ScriptResult<Self> {
        if let Some(map) = map {
            if let Some(key) = map.keys().find(|key| !allowed.contains(&key.as_str())) {
                return Err(format!("{call}(): unexpected option `{key}`").into());
            }
        }
        Ok(Self { call, map })
    }

    fn get(&self, key: &str) -> Option<&'a Dynamic> {
        self.map.and_then(|map| map.get(key))
    }

    fn number(&self, key: &str) -> ScriptResult<Option<f64>> {
        match self.get(key) {
            Some(value) => {
                let number = as_number(value)
                    .map_err(|_| format!("{}(): option `{key}` must be a number", self.call))?;
                if !number.is_finite() {
                    return Err(format!("{}(): option `{key}` must be finite", self.call).into());
                }
                Ok(Some(number))
            }
            None => Ok(None),
        }
    }

    fn text(&self, key: &str) -> ScriptResult<Option<String>> {
        match self.get(key) {
            Some(value) => value
                .clone()
                .into_string()
                .map(Some)
                .map_err(|_| format!("{}(): option `{key}` must be a string", self.call).into()),
            None => Ok(None),
        }
    }

    fn flag(&self, key: &str) -> ScriptResult<Option<bool>> {
        match self.get(key) {
            Some(value) => value
                .as_bool()
                .map(Some)
                .map_err(|_| format!("{}(): option `{key}` must be a bool", self.call).into()),
            None => Ok(None),
        }
    }

    fn color(&self, key: &str) -> ScriptResult<Option<Color>> {
        match self.text(key)? {
            Some(name) => Color::parse(&name)
                .map(Some)
                .ok_or_else(|| format!("{}(): unknown colour `{name}`", self.call).into()),
            None => Ok(None),
        }
    }

    fn alpha(&self) -> ScriptResult<f64> {
        let alpha = self.number("alpha")?.unwrap_or(1.0);
        if !(0.0..=1.0).contains(&alpha) {
            return Err(format!("{}(): alpha must be within 0..1", self.call).into());
        }
        Ok(alpha)
    }

    fn line_width(&self, default: f64) -> ScriptResult<f64> {
        let width = self.number("linewidth")?.unwrap_or(default);
        if width < 0.0 {
            return Err(format!("{}(): linewidth must not be negative", self.call).into());
        }
        Ok(width)
    }

    fn line_style(&self) -> ScriptResult<LineStyle> {
        match self.text("linestyle")? {
            Some(style) => LineStyle::parse(&style)
                .ok_or_else(|| format!("{}(): unknown linestyle `{style}`", self.call).into()),
            None => Ok(LineStyle::Solid),
        }
    }

    fn align(&self) -> ScriptResult<HAlign> {
        match self.text("ha")? {
            Some(align) => HAlign::parse(&align)
                .ok_or_else(|| format!("{}(): unknown alignment `{align}`", self.call).into()),
            None => Ok(HAlign::Left),
        }
    }

    fn stroke(&self, color: Color, default_width: f64) -> ScriptResult<Stroke> {
        Ok(Stroke {
            color,
            width: self.line_width(default_width)?,
            style: self.line_style()?,
            alpha: self.alpha()?,
        })
    }
}

fn scalar(value: &Dynamic, call: &str, what: &str) -> ScriptResult<f64> {
    let number = as_number(value).map_err(|_| format!("{call}(): {what} must be a number"))?;
    if !number.is_finite() {
        return Err(format!("{call}(): {what} must be finite").into());
    }
    Ok(number)
}

fn paired(xs: &Array, ys: &Array, call: &str) -> ScriptResult<(Vec<f64>, Vec<f64>)> {
    let xs = as_numbers(xs).map_err(|err| format!("{call}(): x values: {err}"))?;
    let ys = as_numbers(ys).map_err(|err| format!("{call}(): y values: {err}"))?;
    if xs.len() != ys.len() {
        return Err(format!(
            "{call}(): x and y must have the same length ({} vs {})",
            xs.len(),
            ys.len()
        )
        .into());
    }
    Ok((xs, ys))
}

fn index_axis(len: usize) -> Array {
    (0..len).map(|i| Dynamic::from_float(i as f64)).collect()
}

fn limits(lo: &Dynamic, hi: &Dynamic, call: &str) -> ScriptResult<(f64, f64)> {
    let lo = scalar(lo, call, "lower limit")?;
    let hi = scalar(hi, call, "upper limit")?;
    if lo == hi {
        return Err(format!("{call}(): limits must differ").into());
    }
    Ok((lo, hi))
}

fn plot(ax: &AxesHandle, xs: &Array, ys: &Array, map: Option<&Map>) -> ScriptResult<()> {
    let options = Options::new("plot", map, LINE_OPTIONS)?;
    let (xs, ys) = paired(xs, ys, "plot")?;
    let color = options.color("color")?;
    let label = options.text("label")?;
    ax.with(|axes| {
        let color = color.unwrap_or_else(|| axes.next_color());
        let stroke = options.stroke(color, DEFAULT_LINE_WIDTH)?;
        axes.push(Artist::Line {
            xs,
            ys,
            stroke,
            label,
        });
        Ok(())
    })
}

fn scatter(ax: &AxesHandle, xs: &Array, ys: &Array, map: Option<&Map>) -> ScriptResult<()> {
    let options = Options::new("scatter", map, SCATTER_OPTIONS)?;
    let (xs, ys) = paired(xs, ys, "scatter")?;
    let color = options.color("color")?;
    let size = options.number("size")?.unwrap_or(3.0).max(0.0);
    let alpha = options.alpha()?;
    let label = options.text("label")?;
    ax.with(|axes| {
        let color = color.unwrap_or_else(|| axes.next_color());
        axes.push(Artist::Scatter {
            xs,
            ys,
            color,
            size,
            alpha,
            label,
        });
    });
    Ok(())
}

fn bar(ax: &AxesHandle, xs: &Array, heights: &Array, map: Option<&Map>) -> ScriptResult<()> {
    let options = Options::new("bar", map, BAR_OPTIONS)?;
    let (xs, heights) = paired(xs, heights, "bar")?;
    let color = options.color("color")?;
    let width = options.number("width")?.unwrap_or(0.8).abs();
    let alpha = options.alpha()?;
    let label = options.text("label")?;
    ax.with(|axes| {
        let color = color.unwrap_or_else(|| axes.next_color());
        axes.push(Artist::Bars {
            xs,
            heights,
            width,
            color,
            alpha,
            label,
        });
    });
    Ok(())
}

fn fill_between(
    ax: &AxesHandle,
    xs: &Array,
    lower: &Array,
    upper: &Array,
    map: Option<&Map>,
) -> ScriptResult<()> {
    let options = Options::new("fill_between", map, FILL_OPTIONS)?;
    let (xs, lower) = paired(xs, lower, "fill_between")?;
    let upper = as_numbers(upper).map_err(|err| format!("fill_between(): upper values: {err}"))?;
    if upper.len() != xs.len() {
        return Err("fill_between(): upper bound must match x length".into());
    }
    let color = options.color("color")?;
    let alpha = options.number("alpha")?.unwrap_or(0.5).clamp(0.0, 1.0);
    let label = options.text("label")?;
    ax.with(|axes| {
        let color = color.unwrap_or_else(|| axes.next_color());
        axes.push(Artist::FillBetween {
            xs,
            lower,
            upper,
            color,
            alpha,
            label,
        });
    });
    Ok(())
}

fn text(
    ax: &AxesHandle,
    x: &Dynamic,
    y: &Dynamic,
    content: &str,
    map: Option<&Map>,
) -> ScriptResult<()> {
    let options = Options::new("text", map, TEXT_OPTIONS)?;
    let artist = Artist::Text {
        x: scalar(x, "text", "x")?,
        y: scalar(y, "text", "y")?,
        text: content.to_string(),
        color: options.color("color")?.unwrap_or(Color::BLACK),
        fontsize: options.number("fontsize")?.unwrap_or(DEFAULT_FONT_SIZE).max(1.0),
        align: options.align()?,
    };
    ax.with(|axes| axes.push(artist));
    Ok(())
}

fn arrow(ax: &AxesHandle, coords: [&Dynamic; 4], map: Option<&Map>) -> ScriptResult<()> {
    let options = Options::new("arrow", map, ARROW_OPTIONS)?;
    let [x, y, dx, dy] = coords;
    let color = options.color("color")?.unwrap_or(Color::BLACK);
    let artist = Artist::Arrow {
        x: scalar(x, "arrow", "x")?,
        y: scalar(y, "arrow", "y")?,
        dx: scalar(dx, "arrow", "dx")?,
        dy: scalar(dy, "arrow", "dy")?,
        stroke: Stroke {
            color,
            width: options.line_width(1.0)?,
            style: LineStyle::Solid,
            alpha: options.alpha()?,
        },
    };
    ax.with(|axes| axes.push(artist));
    Ok(())
}

fn reference_line(
    ax: &AxesHandle,
    value: &Dynamic,
    map: Option<&Map>,
    horizontal: bool,
) -> ScriptResult<()> {
    let call = if horizontal { "axhline" } else { "axvline" };
    let options = Options::new(call, map, REFERENCE_OPTIONS)?;
    let value = scalar(value, call, "position")?;
    let color = options.color("color")?;
    ax.with(|axes| {
        let color = color.unwrap_or_else(|| axes.next_color());
        let stroke = options.stroke(color, DEFAULT_LINE_WIDTH)?;
        axes.push(if horizontal {
            Artist::HLine { y: value, stroke }
        } else {
            Artist::VLine { x: value, stroke }
        });
        Ok(())
    })
}

fn patch(ax: &AxesHandle, shape: Shape, call: &'static str, map: Option<&Map>) -> ScriptResult<()> {
    let options = Options::new(call, map, PATCH_OPTIONS)?;
    let explicit_face = match options.color("facecolor")? {
        Some(color) => Some(color),
        None => options.color("color")?,
    };
    let edge_color = options.color("edgecolor")?;
    let fill = options.flag("fill")?.unwrap_or(true);
    let alpha = options.alpha()?;
    let label = options.text("label")?;
    let width = options.line_width(1.0)?;
    let style = options.line_style()?;

    ax.with(|axes| {
        let base = match (explicit_face, edge_color) {
            (Some(color), _) => color,
            (None, Some(edge)) if !fill => edge,
            _ => axes.next_color(),
        };
        let face = fill.then_some(base);
        let edge = match edge_color {
            Some(color) => Some(color),
            None if !fill => Some(base),
            None => None,
        }
        .map(|color| Stroke {
            color,
            width,
            style,
            alpha: 1.0,
        });
        axes.push(Artist::Patch {
            shape,
            face,
            edge,
            alpha,
            label,
        });
    });
    Ok(())
}

fn polygon_points(points: &Array) -> ScriptResult<Vec<(f64, f64)>> {
    let points = points
        .iter()
        .map(|point| -> ScriptResult<(f64, f64)> {
            let pair = point
                .clone()
                .into_array()
                .map_err(|_| "add_polygon(): each point must be an [x, y] array".to_string())?;
            match pair.as_slice() {
                [x, y] => Ok((scalar(x, "add_polygon", "x")?, scalar(y, "add_polygon", "y")?)),
                _ => Err("add_polygon(): each point must have exactly two coordinates".into()),
            }
        })
        .collect::<ScriptResult<Vec<_>>>()?;
    if points.len() < 3 {
        return Err("add_polygon(): at least three points are required".into());
    }
    Ok(points)
}

fn figure_text(
    fig: &FigureHandle,
    x: &Dynamic,
    y: &Dynamic,
    content: &str,
    map: Option<&Map>,
) -> ScriptResult<()> {
    let options = Options::new("text", map, TEXT_OPTIONS)?;
    let text = FigureText {
        x: scalar(x, "text", "x")?,
        y: scalar(y, "text", "y")?,
        text: content.to_string(),
        color: options.color("color")?.unwrap_or(Color::BLACK),
        fontsize: options.number("fontsize")?.unwrap_or(DEFAULT_FONT_SIZE).max(1.0),
        align: options.align()?,
    };
    fig.0.borrow_mut().texts.push(text);
    Ok(())
}

/// Register the `Figure` and `Axes` types and their methods.
pub(super) fn register(engine: &mut Engine) {
    engine
        .register_type_with_name::<FigureHandle>("Figure")
        .register_type_with_name::<AxesHandle>("Axes");

    register_artists(engine);
    register_decorations(engine);
    register_figure(engine);
}

fn register_artists(engine: &mut Engine) {
    engine
        .register_fn("plot", |ax: &mut AxesHandle, ys: Array| {
            plot(ax, &index_axis(ys.len()), &ys, None)
        })
        .register_fn("plot", |ax: &mut AxesHandle, xs: Array, ys: Array| {
            plot(ax, &xs, &ys, None)
        })
        .register_fn(
            "plot",
            |ax: &mut AxesHandle, xs: Array, ys: Array, options: Map| {
                plot(ax, &xs, &ys, Some(&options))
            },
        )
        .register_fn("scatter", |ax: &mut AxesHandle, xs: Array, ys: Array| {
            scatter(ax, &xs, &ys, None)
        })
        .register_fn(
            "scatter",
            |ax: &mut AxesHandle, xs: Array, ys: Array, options: Map| {
                scatter(ax, &xs, &ys, Some(&options))
            },
        )
        .register_fn("bar", |ax: &mut AxesHandle, xs: Array, heights: Array| {
            bar(ax, &xs, &heights, None)
        })
        .register_fn(
            "bar",
            |ax: &mut AxesHandle, xs: Array, heights: Array, options: Map| {
                bar(ax, &xs, &heights, Some(&options))
            },
        )
        .register_fn(
            "fill_between",
            |ax: &mut AxesHandle, xs: Array, lower: Array, upper: Array| {
                fill_between(ax, &xs, &lower, &upper, None)
            },
        )
        .register_fn(
            "fill_between",
            |ax: &mut AxesHandle, xs: Array, lower: Array, upper: Array, options: Map| {
                fill_between(ax, &xs, &lower, &upper, Some(&options))
            },
        )
        .register_fn(
            "text",
            |ax: &mut AxesHandle, x: Dynamic, y: Dynamic, content: ImmutableString| {
                text(ax, &x, &y, &content, None)
            },
        )
        .register_fn(
            "text",
            |ax: &mut AxesHandle,
             x: Dynamic,
             y: Dynamic,
             content: ImmutableString,
             options: Map| { text(ax, &x, &y, &content, Some(&options)) },
        )
        .register_fn(
            "arrow",
            |ax: &mut AxesHandle, x: Dynamic, y: Dynamic, dx: Dynamic, dy: Dynamic| {
                arrow(ax, [&x, &y, &dx, &dy], None)
            },
        )
        .register_fn(
            "arrow",
            |ax: &mut AxesHandle,
             x: Dynamic,
             y: Dynamic,
             dx: Dynamic,
             dy: Dynamic,
             options: Map| { arrow(ax, [&x, &y, &dx, &dy], Some(&options)) },
        )
        .register_fn("axhline", |ax: &mut AxesHandle, y: Dynamic| {
            reference_line(ax, &y, None, true)
        })
        .register_fn(
            "axhline",
            |ax: &mut AxesHandle, y: Dynamic, options: Map| {
                reference_line(ax, &y, Some(&options), true)
            },
        )
        .register_fn("axvline", |ax: &mut AxesHandle, x: Dynamic| {
            reference_line(ax, &x, None, false)
        })
        .register_fn(
            "axvline",
            |ax: &mut AxesHandle, x: Dynamic, options: Map| {
                reference_line(ax, &x, Some(&options), false)
            },
        );

    engine
        .register_fn(
            "add_circle",
            |ax: &mut AxesHandle, cx: Dynamic, cy: Dynamic, r: Dynamic| -> ScriptResult<()> {
                let shape = circle(&cx, &cy, &r)?;
                patch(ax, shape, "add_circle", None)
            },
        )
        .register_fn(
            "add_circle",
            |ax: &mut AxesHandle,
             cx: Dynamic,
             cy: Dynamic,
             r: Dynamic,
             options: Map|
             -> ScriptResult<()> {
                let shape = circle(&cx, &cy, &r)?;
                patch(ax, shape, "add_circle", Some(&options))
            },
        )
        .register_fn(
            "add_rect",
            |ax: &mut AxesHandle,
             x: Dynamic,
             y: Dynamic,
             w: Dynamic,
             h: Dynamic|
             -> ScriptResult<()> {
                let shape = rect([&x, &y, &w, &h])?;
                patch(ax, shape, "add_rect", None)
            },
        )
        .register_fn(
            "add_rect",
            |ax: &mut AxesHandle,
             x: Dynamic,
             y: Dynamic,
             w: Dynamic,
             h: Dynamic,
             options: Map|
             -> ScriptResult<()> {
                let shape = rect([&x, &y, &w, &h])?;
                patch(ax, shape, "add_rect", Some(&options))
            },
        )
        .register_fn(
            "add_polygon",
            |ax: &mut AxesHandle, points: Array| -> ScriptResult<()> {
                let shape = Shape::Polygon {
                    points: polygon_points(&points)?,
                };
                patch(ax, shape, "add_polygon", None)
            },
        )
        .register_fn(
            "add_polygon",
            |ax: &mut AxesHandle, points: Array, options: Map| -> ScriptResult<()> {
                let shape = Shape::Polygon {
                    points: polygon_points(&points)?,
                };
                patch(ax, shape, "add_polygon", Some(&options))
            },
        );
}

fn circle(cx: &Dynamic, cy: &Dynamic, r: &Dynamic) -> ScriptResult<Shape> {
    let r = scalar(r, "add_circle", "radius")?;
    if r < 0.0 {
        return Err("add_circle(): radius must not be negative".into());
    }
    Ok(Shape::Circle {
        cx: scalar(cx, "add_circle", "cx")?,
        cy: scalar(cy, "add_circle", "cy")?,
        r,
    })
}

fn rect(values: [&Dynamic; 4]) -> ScriptResult<Shape> {
    let [x, y, w, h] = values;
    Ok(Shape::Rect {
        x: scalar(x, "add_rect", "x")?,
        y: scalar(y, "add_rect", "y")?,
        w: scalar(w, "add_rect", "width")?,
        h: scalar(h, "add_rect", "height")?,
    })
}

fn register_decorations(engine: &mut Engine) {
    engine
        .register_fn("set_title", |ax: &mut AxesHandle, title: ImmutableString| {
            ax.with(|axes| axes.title = Some(title.to_string()));
        })
        .register_fn("set_xlabel", |ax: &mut AxesHandle, label: ImmutableString| {
            ax.with(|axes| axes.xlabel = Some(label.to_string()));
        })
        .register_fn("set_ylabel", |ax: &mut AxesHandle, label: ImmutableString| {
            ax.with(|axes| axes.ylabel = Some(label.to_string()));
        })
        .register_fn(
            "set_xlim",
            |ax: &mut AxesHandle, lo: Dynamic, hi: Dynamic| -> ScriptResult<()> {
                let range = limits(&lo, &hi, "set_xlim")?;
                ax.with(|axes| axes.xlim = Some(range));
                Ok(())
            },
        )
        .register_fn(
            "set_ylim",
            |ax: &mut AxesHandle, lo: Dynamic, hi: Dynamic| -> ScriptResult<()> {
                let range = limits(&lo, &hi, "set_ylim")?;
                ax.with(|axes| axes.ylim = Some(range));
                Ok(())
            },
        )
        .register_fn(
            "set_aspect",
            |ax: &mut AxesHandle, aspect: ImmutableString| -> ScriptResult<()> {
                let equal = match aspect.as_str() {
                    "equal" => true,
                    "auto" => false,
                    other => {
                        return Err(format!(
                            "set_aspect(): expected \"equal\" or \"auto\", found `{other}`"
                        )
                        .into());
                    }
                };
                ax.with(|axes| axes.aspect_equal = equal);
                Ok(())
            },
        )
        .register_fn("legend", |ax: &mut AxesHandle| {
            ax.with(|axes| axes.legend = true);
        })
        .register_fn("axis_off", |ax: &mut AxesHandle| {
            ax.with(|axes| axes.axis_visible = false);
        });
}

fn register_figure(engine: &mut Engine) {
    engine
        .register_fn("suptitle", |fig: &mut FigureHandle, title: ImmutableString| {
            fig.0.borrow_mut().suptitle = Some(title.to_string());
        })
        // Saved images always get a white background; the colour is only validated.
        .register_fn(
            "set_facecolor",
            |_fig: &mut FigureHandle, color: ImmutableString| -> ScriptResult<()> {
                Color::parse(&color)
                    .map(drop)
                    .ok_or_else(|| format!("set_facecolor(): unknown colour `{color}`").into())
            },
        )
        .register_fn(
            "text",
            |fig: &mut FigureHandle, x: Dynamic, y: Dynamic, content: ImmutableString| {
                figure_text(fig, &x, &y, &content, None)
            },
        )
        .register_fn(
            "text",
            |fig: &mut FigureHandle,
             x: Dynamic,
             y: Dynamic,
             content: ImmutableString,
             options: Map| { figure_text(fig, &x, &y, &content, Some(&options)) },
        );
}
