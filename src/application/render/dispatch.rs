//! Dispatch core: validates input, routes by mode, normalizes every outcome
//! into a [`RenderResult`].

use std::{num::NonZeroUsize, sync::Arc, time::Instant};

use metrics::{counter, histogram};
use tokio::sync::Semaphore;
use tracing::{info, warn};

use super::{
    script::{ScriptOptions, ScriptRenderer},
    toolchain::{ToolchainOptions, ToolchainRenderer},
    types::{RenderError, RenderMode, RenderRequest, RenderResult},
};

pub const METRIC_RENDER_TOTAL: &str = "figrender_render_total";
pub const METRIC_RENDER_MS: &str = "figrender_render_ms";

#[derive(Debug, Clone)]
pub struct RenderDispatcher {
    script: Arc<ScriptRenderer>,
    toolchain: Arc<ToolchainRenderer>,
    permits: Arc<Semaphore>,
}

impl RenderDispatcher {
    pub fn new(
        script: ScriptOptions,
        toolchain: ToolchainOptions,
        max_concurrent: NonZeroUsize,
    ) -> Self {
        Self {
            script: Arc::new(ScriptRenderer::new(script)),
            toolchain: Arc::new(ToolchainRenderer::new(toolchain)),
            permits: Arc::new(Semaphore::new(max_concurrent.get())),
        }
    }

    /// Whether the compiled backend's compiler is currently on the search path.
    pub fn compiled_available(&self) -> bool {
        self.toolchain.is_available()
    }

    /// Run one render. Never fails: errors come back inside the result.
    pub async fn dispatch(&self, request: &RenderRequest) -> RenderResult {
        let started_at = Instant::now();
        let outcome = self.run(request).await;
        let elapsed_ms = started_at.elapsed().as_secs_f64() * 1000.0;

        let mode = request
            .mode
            .parse::<RenderMode>()
            .map_or("unknown", RenderMode::as_str);
        let outcome_label = if outcome.is_ok() { "success" } else { "failure" };
        counter!(METRIC_RENDER_TOTAL, "mode" => mode, "outcome" => outcome_label).increment(1);
        histogram!(METRIC_RENDER_MS, "mode" => mode).record(elapsed_ms);

        match outcome {
            Ok(image) => {
                info!(
                    target = "application::render::dispatch",
                    op = "render::dispatch",
                    mode,
                    result = "success",
                    elapsed_ms = elapsed_ms as u64,
                    image_bytes = image.len(),
                    "Render succeeded"
                );
                RenderResult::succeeded(image)
            }
            Err(err) => {
                warn!(
                    target = "application::render::dispatch",
                    op = "render::dispatch",
                    mode,
                    result = "failure",
                    elapsed_ms = elapsed_ms as u64,
                    error_code = err.code(),
                    error = %err,
                    "Render failed"
                );
                RenderResult::failed(&err)
            }
        }
    }

    async fn run(&self, request: &RenderRequest) -> Result<Vec<u8>, RenderError> {
        if request.code.trim().is_empty() {
            return Err(RenderError::EmptyInput);
        }
        let mode = request.mode.parse::<RenderMode>()?;
        if mode == RenderMode::Compiled && !self.toolchain.is_available() {
            return Err(self.toolchain.compiler_missing());
        }

        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|err| RenderError::internal(format!("render queue closed: {err}")))?;

        match mode {
            RenderMode::Script => {
                let renderer = Arc::clone(&self.script);
                let code = request.code.clone();
                // The permit lives as long as the blocking render, not the caller.
                tokio::task::spawn_blocking(move || {
                    let _permit = permit;
                    renderer.render(&code)
                })
                .await
                .map_err(|err| RenderError::internal(format!("script render task failed: {err}")))?
            }
            RenderMode::Compiled => {
                let result = self.toolchain.render(&request.code).await;
                drop(permit);
                result
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{ffi::OsString, path::PathBuf};

    use tempfile::TempDir;

    use super::*;

    fn dispatcher_with(search_path: PathBuf, scratch: PathBuf) -> RenderDispatcher {
        RenderDispatcher::new(
            ScriptOptions {
                dpi: 40.0,
                ..ScriptOptions::default()
            },
            ToolchainOptions {
                search_path: Some(OsString::from(search_path)),
                scratch_root: Some(scratch),
                ..ToolchainOptions::default()
            },
            NonZeroUsize::new(2).expect("non-zero"),
        )
    }

    struct Fixture {
        tools: TempDir,
        scratch: TempDir,
        dispatcher: RenderDispatcher,
    }

    fn fixture() -> Fixture {
        let tools = TempDir::new().expect("tools");
        let scratch = TempDir::new().expect("scratch");
        let dispatcher = dispatcher_with(tools.path().to_path_buf(), scratch.path().to_path_buf());
        Fixture {
            tools,
            scratch,
            dispatcher,
        }
    }

    fn scratch_entries(fixture: &Fixture) -> usize {
        std::fs::read_dir(fixture.scratch.path())
            .expect("read scratch")
            .count()
    }

    #[tokio::test]
    async fn whitespace_code_is_rejected_for_every_mode() {
        let fixture = fixture();
        for mode in ["script", "compiled", "bogus"] {
            let result = fixture
                .dispatcher
                .dispatch(&RenderRequest::new(mode, " \n\t "))
                .await;
            assert!(!result.success());
            assert_eq!(result.error(), Some("No code provided"));
            assert_eq!(result.error_code(), Some("empty_input"));
            assert!(result.image().is_none());
        }
        assert_eq!(scratch_entries(&fixture), 0);
    }

    #[tokio::test]
    async fn unknown_mode_is_named() {
        let fixture = fixture();
        let result = fixture
            .dispatcher
            .dispatch(&RenderRequest::new("matplotlib", "fn draw(fig, ax) {}"))
            .await;
        assert!(!result.success());
        assert_eq!(result.error(), Some("Unknown mode: matplotlib"));
    }

    #[tokio::test]
    async fn script_success_has_image_and_no_error() {
        let fixture = fixture();
        let result = fixture
            .dispatcher
            .dispatch(&RenderRequest::script("fn draw(fig, ax) { }"))
            .await;
        assert!(result.success(), "error: {:?}", result.error());
        assert!(result.image().is_some_and(|image| !image.is_empty()));
        assert!(result.error().is_none());
        assert!(result.error_code().is_none());
    }

    #[tokio::test]
    async fn script_failure_is_normalized() {
        let fixture = fixture();
        let result = fixture
            .dispatcher
            .dispatch(&RenderRequest::script(
                "fn draw(fig, ax) { throw \"axis exploded\"; }",
            ))
            .await;
        assert!(!result.success());
        assert!(result.image().is_none());
        assert!(result.error().is_some_and(|error| error.contains("axis exploded")));
        assert!(result.diagnostic().is_some_and(|trace| !trace.is_empty()));
        assert_eq!(result.error_code(), Some("code_execution"));
    }

    #[tokio::test]
    async fn compiled_without_compiler_leaves_no_workspace() {
        let fixture = fixture();
        assert!(!fixture.dispatcher.compiled_available());
        let result = fixture
            .dispatcher
            .dispatch(&RenderRequest::compiled("\\draw (0,0) -- (1,1);"))
            .await;
        assert!(!result.success());
        assert_eq!(result.error_code(), Some("toolchain_unavailable"));
        assert_eq!(scratch_entries(&fixture), 0);
    }

    #[tokio::test]
    async fn abandoned_script_render_keeps_its_permit() {
        let dispatcher = RenderDispatcher::new(
            ScriptOptions {
                dpi: 40.0,
                max_operations: 200_000_000,
                ..ScriptOptions::default()
            },
            ToolchainOptions::default(),
            NonZeroUsize::new(1).expect("non-zero"),
        );
        let slow = RenderRequest::script(
            "fn draw(fig, ax) { let i = 0; while i < 5000000 { i += 1; } }",
        );

        let abandoned = tokio::time::timeout(
            std::time::Duration::from_millis(100),
            dispatcher.dispatch(&slow),
        )
        .await;
        assert!(abandoned.is_err(), "render should still be running");
        assert_eq!(dispatcher.permits.available_permits(), 0);

        let deadline = Instant::now() + std::time::Duration::from_secs(120);
        while dispatcher.permits.available_permits() == 0 {
            assert!(Instant::now() < deadline, "permit never returned");
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        assert_eq!(dispatcher.permits.available_permits(), 1);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn compiled_failure_cleans_workspace() {
        use std::os::unix::fs::PermissionsExt;

        let fixture = fixture();
        let compiler = fixture.tools.path().join("pdflatex");
        std::fs::write(
            &compiler,
            "#!/bin/sh\nprintf '! Emergency stop.' > figure.log\nexit 1\n",
        )
        .expect("write compiler");
        std::fs::set_permissions(&compiler, std::fs::Permissions::from_mode(0o755))
            .expect("chmod");

        assert!(fixture.dispatcher.compiled_available());
        let result = fixture
            .dispatcher
            .dispatch(&RenderRequest::compiled("\\undefined"))
            .await;
        assert!(!result.success());
        assert_eq!(result.error_code(), Some("compilation"));
        assert_eq!(result.diagnostic(), Some("! Emergency stop."));
        assert_eq!(scratch_entries(&fixture), 0);
    }
}
