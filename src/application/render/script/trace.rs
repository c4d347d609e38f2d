//! Convert Rhai failures into [`RenderError::CodeExecution`] with a readable trace.

use rhai::{EvalAltResult, ParseError, Position};

use crate::application::render::types::RenderError;

const TRACE_HEADER: &str = "Traceback (most recent call last):";

fn describe(position: Position) -> String {
    match (position.line(), position.position()) {
        (Some(line), Some(column)) => format!("line {line}, column {column}"),
        (Some(line), None) => format!("line {line}"),
        _ => "unknown location".to_string(),
    }
}

pub(super) fn parse_error(error: &ParseError) -> RenderError {
    let message = format!("Syntax error: {error}");
    let trace = format!(
        "{TRACE_HEADER}\n  compiling script ({})\n{message}",
        describe(error.position())
    );
    RenderError::code_execution(message, trace)
}

/// Unwrap nested function-call errors so the message names the original failure
/// while the trace keeps every frame.
pub(super) fn eval_error(error: &EvalAltResult) -> RenderError {
    collect(Vec::new(), error)
}

/// Like [`eval_error`] for a failure of a function called directly from the
/// host, which Rhai reports without a frame for that function.
pub(super) fn eval_error_in(function: &str, error: &EvalAltResult) -> RenderError {
    let outer = match error {
        EvalAltResult::ErrorInFunctionCall(name, _, _, _) if name == function => Vec::new(),
        _ => vec![format!("  in function '{function}'")],
    };
    collect(outer, error)
}

fn collect(mut frames: Vec<String>, error: &EvalAltResult) -> RenderError {
    let mut current = error;
    loop {
        match current {
            EvalAltResult::ErrorInFunctionCall(name, _, inner, position) => {
                frames.push(format!("  in function '{name}' ({})", describe(*position)));
                current = inner.as_ref();
            }
            EvalAltResult::ErrorInModule(name, inner, position) => {
                frames.push(format!("  in module '{name}' ({})", describe(*position)));
                current = inner.as_ref();
            }
            _ => break,
        }
    }

    let message = current.to_string();
    frames.push(format!("  raised at {}", describe(current.position())));

    let mut trace = String::from(TRACE_HEADER);
    for frame in &frames {
        trace.push('\n');
        trace.push_str(frame);
    }
    trace.push('\n');
    trace.push_str(&message);

    RenderError::code_execution(message, trace)
}

#[cfg(test)]
mod tests {
    use rhai::Engine;

    use super::*;

    #[test]
    fn nested_call_keeps_frames_and_inner_message() {
        let engine = Engine::new();
        let err = engine
            .run("fn inner() { throw \"kaboom\"; }\nfn outer() { inner(); }\nouter();")
            .expect_err("script throws");

        match eval_error(&err) {
            RenderError::CodeExecution { message, trace } => {
                assert!(message.contains("kaboom"), "message: {message}");
                assert!(trace.contains("in function 'outer'"), "trace: {trace}");
                assert!(trace.contains("in function 'inner'"), "trace: {trace}");
                assert!(trace.starts_with(TRACE_HEADER));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn host_call_gets_its_own_frame() {
        let engine = Engine::new();
        let ast = engine
            .compile("fn draw(a, b) { throw \"custom failure\"; }")
            .expect("compiles");
        let err = engine
            .call_fn::<rhai::Dynamic>(&mut rhai::Scope::new(), &ast, "draw", (1_i64, 2_i64))
            .expect_err("draw throws");

        match eval_error_in("draw", &err) {
            RenderError::CodeExecution { message, trace } => {
                assert!(message.contains("custom failure"), "message: {message}");
                assert_eq!(trace.matches("in function 'draw'").count(), 1, "trace: {trace}");
                assert!(trace.contains("raised at line 1"), "trace: {trace}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn syntax_errors_report_location() {
        let engine = Engine::new();
        let err = engine.compile("let x = ;").expect_err("invalid syntax");
        match parse_error(&err) {
            RenderError::CodeExecution { message, trace } => {
                assert!(message.starts_with("Syntax error"));
                assert!(trace.contains("line 1"), "trace: {trace}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
