//! Script execution renderer: runs a Rhai drawing script against an owned
//! figure/axes pair and serializes the result to PNG.

mod bindings;
mod color;
mod context;
mod figure;
mod numeric;
mod raster;
mod svg;
mod trace;

use std::time::Instant;

use rhai::{AST, CallFnOptions, Dynamic};
use tracing::debug;

pub use raster::{RasterError, init_fonts};

use self::context::PlottingContext;
use super::types::RenderError;

const DRAW_FN: &str = "draw";

/// Figure geometry and interpreter limits for script renders.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptOptions {
    pub dpi: f64,
    pub width_inches: f64,
    pub height_inches: f64,
    pub max_operations: u64,
}

impl Default for ScriptOptions {
    fn default() -> Self {
        Self {
            dpi: 150.0,
            width_inches: 6.0,
            height_inches: 6.0,
            max_operations: 5_000_000,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScriptRenderer {
    options: ScriptOptions,
}

impl ScriptRenderer {
    pub fn new(options: ScriptOptions) -> Self {
        Self { options }
    }

    /// Evaluate `code`, call its `draw(fig, ax)` if defined, and return PNG bytes.
    ///
    /// Blocking; callers on the async runtime should move this onto the
    /// blocking pool.
    pub fn render(&self, code: &str) -> Result<Vec<u8>, RenderError> {
        let started_at = Instant::now();
        let context = PlottingContext::acquire(&self.options);
        let result = run(&context, code);
        drop(context);

        debug!(
            target = "application::render::script",
            op = "script::render",
            result = if result.is_ok() { "ok" } else { "error" },
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "Script render finished"
        );
        result
    }
}

fn run(context: &PlottingContext, code: &str) -> Result<Vec<u8>, RenderError> {
    let engine = context.engine();
    let mut scope = context.scope();

    let ast = engine
        .compile_with_scope(&scope, code)
        .map_err(|err| trace::parse_error(&err))?;
    engine
        .run_ast_with_scope(&mut scope, &ast)
        .map_err(|err| trace::eval_error(&err))?;

    if let Some(arity) = draw_arity(&ast) {
        if arity != 2 {
            return Err(RenderError::code_execution(
                format!("`{DRAW_FN}` must take exactly two parameters (fig, ax), found {arity}"),
                format!("{DRAW_FN} defined with {arity} parameter(s)"),
            ));
        }
        let options = CallFnOptions::new().eval_ast(false).rewind_scope(true);
        engine
            .call_fn_with_options::<Dynamic>(
                options,
                &mut scope,
                &ast,
                DRAW_FN,
                (context.figure_handle(), context.axes_handle()),
            )
            .map(drop)
            .map_err(|err| trace::eval_error_in(DRAW_FN, &err))?;
    }

    context.post_process();
    context
        .serialize()
        .map_err(|err| RenderError::internal(format!("failed to serialize figure: {err}")))
}

fn draw_arity(ast: &AST) -> Option<usize> {
    ast.iter_functions()
        .find(|function| function.name == DRAW_FN)
        .map(|function| function.params.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

    fn renderer() -> ScriptRenderer {
        ScriptRenderer::new(ScriptOptions {
            dpi: 50.0,
            ..ScriptOptions::default()
        })
    }

    fn code_execution(err: RenderError) -> (String, String) {
        match err {
            RenderError::CodeExecution { message, trace } => (message, trace),
            other => panic!("expected code execution error, got {other:?}"),
        }
    }

    #[test]
    fn noop_draw_produces_png() {
        let png = renderer()
            .render("fn draw(fig, ax) { }")
            .expect("render succeeds");
        assert!(png.starts_with(PNG_MAGIC));
    }

    #[test]
    fn script_without_draw_still_renders() {
        let png = renderer()
            .render("let x = 1 + 1;")
            .expect("render succeeds");
        assert!(png.starts_with(PNG_MAGIC));
    }

    #[test]
    fn raised_error_carries_message_and_trace() {
        let err = renderer()
            .render("fn draw(fig, ax) { throw \"custom failure\"; }")
            .expect_err("draw throws");
        let (message, trace) = code_execution(err);
        assert!(message.contains("custom failure"), "message: {message}");
        assert!(!trace.is_empty());
        assert!(trace.contains("draw"), "trace: {trace}");
    }

    #[test]
    fn top_level_error_is_reported() {
        let err = renderer()
            .render("let y = undefined_name + 1;")
            .expect_err("unknown variable");
        let (message, _) = code_execution(err);
        assert!(message.contains("undefined_name"), "message: {message}");
    }

    #[test]
    fn wrong_draw_arity_is_rejected() {
        let err = renderer()
            .render("fn draw(ax) { }")
            .expect_err("arity mismatch");
        let (message, _) = code_execution(err);
        assert!(message.contains("two parameters"), "message: {message}");
    }

    #[test]
    fn invalid_option_is_a_code_execution_error() {
        let err = renderer()
            .render("fn draw(fig, ax) { ax.plot([0, 1], [0, 1], #{ colour: \"red\" }); }")
            .expect_err("unknown option");
        let (message, _) = code_execution(err);
        assert!(message.contains("colour"), "message: {message}");
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        let err = renderer()
            .render("fn draw(fig, ax) { ax.plot([0, 1, 2], [0, 1]); }")
            .expect_err("length mismatch");
        let (message, _) = code_execution(err);
        assert!(message.contains("same length"), "message: {message}");
    }

    #[test]
    fn identical_code_renders_identical_bytes() {
        let code = r#"
            fn draw(fig, ax) {
                let xs = np::linspace(0, 2 * np::pi, 50);
                ax.plot(xs, np::sin(xs), #{ color: "C0", label: "sin" });
                ax.scatter([1, 2, 3], [0.5, -0.5, 0.0], #{ color: "tab:red" });
                ax.add_circle(0, 0, 0.5, #{ facecolor: "gold", alpha: 0.5 });
                ax.set_title("wave");
                ax.legend();
            }
        "#;
        let renderer = renderer();
        let first = renderer.render(code).expect("first render");
        let second = renderer.render(code).expect("second render");
        assert_eq!(first, second);
    }

    #[test]
    fn different_drawings_produce_different_images() {
        let renderer = renderer();
        let line = renderer
            .render("fn draw(fig, ax) { ax.plot([0, 1], [0, 1]); }")
            .expect("line");
        let bars = renderer
            .render("fn draw(fig, ax) { ax.bar([0, 1, 2], [3, 1, 2]); }")
            .expect("bars");
        assert_ne!(line, bars);
    }

    #[test]
    fn facecolor_does_not_tint_saved_image() {
        let png = renderer()
            .render(
                "fn draw(fig, ax) { fig.set_facecolor(\"navy\"); ax.plot([0, 1], [0, 1]); }",
            )
            .expect("render");
        let pixmap = resvg::tiny_skia::Pixmap::decode_png(&png).expect("decode");
        let corner = pixmap.pixel(0, 0).expect("corner pixel");
        assert_eq!(
            (corner.red(), corner.green(), corner.blue()),
            (255, 255, 255)
        );
    }

    #[test]
    fn unknown_facecolor_is_rejected() {
        let (message, _) = code_execution(
            renderer()
                .render("fn draw(fig, ax) { fig.set_facecolor(\"not-a-colour\"); }")
                .expect_err("bad colour"),
        );
        assert!(message.contains("set_facecolor"));
    }

    #[test]
    fn runaway_script_is_stopped() {
        let renderer = ScriptRenderer::new(ScriptOptions {
            max_operations: 10_000,
            dpi: 50.0,
            ..ScriptOptions::default()
        });
        let err = renderer
            .render("fn draw(fig, ax) { loop { } }")
            .expect_err("operation budget");
        assert!(matches!(err, RenderError::CodeExecution { .. }));
    }
}
