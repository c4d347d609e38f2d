//! Toolchain compilation renderer: TikZ source → `pdflatex` → PDF → PNG.

mod process;
mod tools;
mod workspace;

use std::{
    ffi::{OsStr, OsString},
    io::ErrorKind,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};

use tracing::{debug, info};

pub use tools::{CONVERTERS, Converter, ConverterChoice, find_tool};
pub use workspace::{ScratchWorkspace, with_workspace};

use self::process::{ToolOutcome, run_tool};
use super::types::RenderError;

const SOURCE_FILE: &str = "figure.tex";
const LOG_FILE: &str = "figure.log";
const PDF_FILE: &str = "figure.pdf";
const PNG_FILE: &str = "figure.png";

const NO_CONVERTER_MESSAGE: &str =
    "No PDF-to-PNG converter found. Please install poppler-utils (pdftoppm) or ImageMagick.";

const PREAMBLE: &str = r"\documentclass[tikz,border=2pt]{standalone}
\usepackage{amsmath}
\usepackage{amssymb}
\usepackage{pgfplots}
\pgfplotsset{compat=1.18}
\usetikzlibrary{calc, decorations.pathreplacing, patterns, angles, quotes}
\begin{document}
";

const POSTAMBLE: &str = r"
\end{document}
";

/// Embed `code` verbatim between the fixed preamble and `\end{document}`.
pub fn document(code: &str) -> String {
    let mut source = String::with_capacity(PREAMBLE.len() + code.len() + POSTAMBLE.len());
    source.push_str(PREAMBLE);
    source.push_str(code);
    source.push_str(POSTAMBLE);
    source
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolchainOptions {
    pub compiler: String,
    pub timeout: Duration,
    pub dpi: u32,
    pub log_tail_chars: usize,
    pub scratch_root: Option<PathBuf>,
    /// Directories searched for tools; the process `PATH` when `None`.
    pub search_path: Option<OsString>,
}

impl Default for ToolchainOptions {
    fn default() -> Self {
        Self {
            compiler: "pdflatex".to_string(),
            timeout: Duration::from_secs(30),
            dpi: 300,
            log_tail_chars: 2000,
            scratch_root: None,
            search_path: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ToolchainRenderer {
    options: ToolchainOptions,
}

impl ToolchainRenderer {
    pub fn new(options: ToolchainOptions) -> Self {
        Self { options }
    }

    fn search_path(&self) -> Option<&OsStr> {
        self.options.search_path.as_deref()
    }

    /// Resolve the compiler executable against the current search path.
    pub fn compiler_path(&self) -> Option<PathBuf> {
        find_tool(&[self.options.compiler.as_str()], self.search_path())
    }

    pub fn is_available(&self) -> bool {
        self.compiler_path().is_some()
    }

    pub fn compiler_missing(&self) -> RenderError {
        RenderError::toolchain_unavailable(format!(
            "{} not found. Please install TeX Live for compiled rendering support.",
            self.options.compiler
        ))
    }

    /// Compile `code` inside a scratch workspace and return the PNG bytes.
    pub async fn render(&self, code: &str) -> Result<Vec<u8>, RenderError> {
        let started_at = Instant::now();
        let result = with_workspace(self.options.scratch_root.as_deref(), |dir| async move {
            self.render_in(&dir, code).await
        })
        .await;

        info!(
            target = "application::render::toolchain",
            op = "toolchain::render",
            result = if result.is_ok() { "ok" } else { "error" },
            error_code = result.as_ref().err().map(RenderError::code),
            elapsed_ms = started_at.elapsed().as_millis() as u64,
            "Compiled render finished"
        );
        result
    }

    async fn render_in(&self, dir: &Path, code: &str) -> Result<Vec<u8>, RenderError> {
        let source = dir.join(SOURCE_FILE);
        tokio::fs::write(&source, document(code))
            .await
            .map_err(|err| RenderError::internal(format!("failed to write {SOURCE_FILE}: {err}")))?;

        let compiler = self.compiler_path().ok_or_else(|| self.compiler_missing())?;
        let outcome = run_tool(
            &compiler,
            &[
                OsString::from("-interaction=nonstopmode"),
                OsString::from(SOURCE_FILE),
            ],
            dir,
            self.options.timeout,
        )
        .await;
        debug!(
            target = "application::render::toolchain",
            op = "toolchain::compile",
            outcome = ?outcome,
            "Compiler finished"
        );

        let pdf = dir.join(PDF_FILE);
        if matches!(outcome, ToolOutcome::TimedOut) || !artifact_exists(&pdf).await {
            let log_tail = read_log_tail(&dir.join(LOG_FILE), self.options.log_tail_chars).await;
            return Err(RenderError::compilation(
                compilation_message(&outcome, self.options.timeout),
                log_tail,
            ));
        }

        let choice = ConverterChoice::discover(self.search_path())
            .ok_or_else(|| RenderError::toolchain_unavailable(NO_CONVERTER_MESSAGE))?;
        let png = dir.join(PNG_FILE);
        let outcome = run_tool(
            &choice.path,
            &choice.converter.args(&pdf, &png, self.options.dpi),
            dir,
            self.options.timeout,
        )
        .await;
        debug!(
            target = "application::render::toolchain",
            op = "toolchain::convert",
            converter = choice.converter.program(),
            outcome = ?outcome,
            "Converter finished"
        );

        if matches!(outcome, ToolOutcome::TimedOut) || !artifact_exists(&png).await {
            return Err(RenderError::conversion(conversion_message(
                &outcome,
                choice.converter,
                self.options.timeout,
            )));
        }

        tokio::fs::read(&png)
            .await
            .map_err(|err| RenderError::internal(format!("failed to read {PNG_FILE}: {err}")))
    }
}

async fn artifact_exists(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

/// Last `limit` characters of the log, decoded lossily; empty when absent.
async fn read_log_tail(path: &Path, limit: usize) -> String {
    match tokio::fs::read(path).await {
        Ok(bytes) => tail_chars(&String::from_utf8_lossy(&bytes), limit),
        Err(err) if err.kind() == ErrorKind::NotFound => String::new(),
        Err(err) => {
            debug!(
                target = "application::render::toolchain",
                op = "toolchain::read_log_tail",
                error = %err,
                "Compiler log unreadable"
            );
            String::new()
        }
    }
}

fn tail_chars(text: &str, limit: usize) -> String {
    let count = text.chars().count();
    text.chars().skip(count.saturating_sub(limit)).collect()
}

fn compilation_message(outcome: &ToolOutcome, timeout: Duration) -> String {
    match outcome {
        ToolOutcome::TimedOut => format!(
            "LaTeX compilation timed out after {}s. Check the log for details.",
            timeout.as_secs()
        ),
        ToolOutcome::SpawnFailed(err) => format!("Failed to run the LaTeX compiler: {err}"),
        ToolOutcome::Exited(_) => "LaTeX compilation failed. Check the log for details.".to_string(),
    }
}

fn conversion_message(outcome: &ToolOutcome, converter: Converter, timeout: Duration) -> String {
    match outcome {
        ToolOutcome::TimedOut => format!(
            "PDF to PNG conversion timed out after {}s ({}).",
            timeout.as_secs(),
            converter.program()
        ),
        ToolOutcome::SpawnFailed(err) => {
            format!("PDF to PNG conversion failed ({}): {err}", converter.program())
        }
        ToolOutcome::Exited(_) => "PDF to PNG conversion failed.".to_string(),
    }
}


#[cfg(all(test, unix))]
mod pipeline_tests {
    use std::{fs, os::unix::fs::PermissionsExt};

    use tempfile::TempDir;

    use super::*;

    fn install(dir: &Path, name: &str, body: &str) {
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write tool");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod");
    }

    struct Harness {
        tools: TempDir,
        scratch: TempDir,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                tools: TempDir::new().expect("tools dir"),
                scratch: TempDir::new().expect("scratch dir"),
            }
        }

        fn renderer(&self, timeout: Duration) -> ToolchainRenderer {
            ToolchainRenderer::new(ToolchainOptions {
                timeout,
                scratch_root: Some(self.scratch.path().to_path_buf()),
                search_path: Some(self.tools.path().as_os_str().to_os_string()),
                ..ToolchainOptions::default()
            })
        }

        fn scratch_is_empty(&self) -> bool {
            fs::read_dir(self.scratch.path())
                .expect("read scratch")
                .next()
                .is_none()
        }
    }

    const FAKE_PDFLATEX: &str = "grep -q 'FAIL' figure.tex && { printf 'line one\\n! Undefined control sequence.' > figure.log; exit 1; }\nprintf '%%PDF-1.5' > figure.pdf\necho 'warning' > figure.log\nexit 1";
    const FAKE_PDFTOPPM: &str = "for last; do :; done\nprintf 'PNGDATA' > \"$last.png\"\nexit 0";

    #[tokio::test]
    async fn renders_with_noisy_exit_codes() {
        let harness = Harness::new();
        install(harness.tools.path(), "pdflatex", FAKE_PDFLATEX);
        install(harness.tools.path(), "pdftoppm", FAKE_PDFTOPPM);

        let png = harness
            .renderer(Duration::from_secs(5))
            .render("\\draw (0,0) circle (1);")
            .await
            .expect("render succeeds");
        assert_eq!(png, b"PNGDATA");
        assert!(harness.scratch_is_empty());
    }

    #[tokio::test]
    async fn compilation_failure_carries_log_tail() {
        let harness = Harness::new();
        install(harness.tools.path(), "pdflatex", FAKE_PDFLATEX);
        install(harness.tools.path(), "pdftoppm", FAKE_PDFTOPPM);

        let err = harness
            .renderer(Duration::from_secs(5))
            .render("\\FAIL")
            .await
            .expect_err("compile fails");
        match err {
            RenderError::Compilation { log_tail, .. } => {
                assert!(log_tail.ends_with("! Undefined control sequence."));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(harness.scratch_is_empty());
    }

    #[tokio::test]
    async fn log_tail_is_truncated() {
        let harness = Harness::new();
        install(
            harness.tools.path(),
            "pdflatex",
            "i=0\nwhile [ $i -lt 300 ]; do printf '0123456789' >> figure.log; i=$((i+1)); done\nprintf 'END' >> figure.log",
        );

        let err = harness
            .renderer(Duration::from_secs(5))
            .render("x")
            .await
            .expect_err("no pdf produced");
        match err {
            RenderError::Compilation { log_tail, .. } => {
                assert_eq!(log_tail.chars().count(), 2000);
                assert!(log_tail.ends_with("789END"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_converter_is_toolchain_unavailable() {
        let harness = Harness::new();
        install(harness.tools.path(), "pdflatex", FAKE_PDFLATEX);

        let err = harness
            .renderer(Duration::from_secs(5))
            .render("ok")
            .await
            .expect_err("no converter");
        assert!(matches!(err, RenderError::ToolchainUnavailable { .. }));
        assert!(err.to_string().contains("poppler-utils"));
        assert!(err.to_string().contains("ImageMagick"));
        assert!(harness.scratch_is_empty());
    }

    #[tokio::test]
    async fn converter_without_output_is_conversion_error() {
        let harness = Harness::new();
        install(harness.tools.path(), "pdflatex", FAKE_PDFLATEX);
        install(harness.tools.path(), "magick", "exit 0");

        let err = harness
            .renderer(Duration::from_secs(5))
            .render("ok")
            .await
            .expect_err("conversion fails");
        assert!(matches!(err, RenderError::Conversion { .. }));
        assert_eq!(err.to_string(), "PDF to PNG conversion failed.");
    }

    #[tokio::test]
    async fn slow_compiler_is_killed() {
        let harness = Harness::new();
        install(harness.tools.path(), "pdflatex", "sleep 10");

        let started = Instant::now();
        let err = harness
            .renderer(Duration::from_millis(300))
            .render("ok")
            .await
            .expect_err("timeout");
        assert!(matches!(err, RenderError::Compilation { .. }));
        assert!(err.to_string().contains("timed out"));
        assert!(started.elapsed() < Duration::from_secs(8));
        assert!(harness.scratch_is_empty());
    }

    #[tokio::test]
    async fn compiler_timeout_fails_even_with_partial_pdf() {
        let harness = Harness::new();
        install(
            harness.tools.path(),
            "pdflatex",
            "printf '%%PDF-1.5 partial' > figure.pdf\nexec sleep 10",
        );
        install(harness.tools.path(), "pdftoppm", FAKE_PDFTOPPM);

        let err = harness
            .renderer(Duration::from_millis(500))
            .render("ok")
            .await
            .expect_err("timeout");
        assert!(matches!(err, RenderError::Compilation { .. }));
        assert!(err.to_string().contains("timed out"));
        assert!(harness.scratch_is_empty());
    }

    #[tokio::test]
    async fn converter_timeout_discards_partial_png() {
        let harness = Harness::new();
        install(harness.tools.path(), "pdflatex", FAKE_PDFLATEX);
        install(
            harness.tools.path(),
            "pdftoppm",
            "for last; do :; done\nprintf 'PARTIAL' > \"$last.png\"\nexec sleep 10",
        );

        let err = harness
            .renderer(Duration::from_millis(500))
            .render("ok")
            .await
            .expect_err("timeout");
        assert!(matches!(err, RenderError::Conversion { .. }));
        assert!(err.to_string().contains("timed out"));
        assert!(harness.scratch_is_empty());
    }

    #[tokio::test]
    async fn missing_compiler_reported_by_name() {
        let harness = Harness::new();
        let renderer = harness.renderer(Duration::from_secs(1));
        assert!(!renderer.is_available());
        let err = renderer.render("ok").await.expect_err("no compiler");
        assert!(matches!(err, RenderError::ToolchainUnavailable { .. }));
        assert!(err.to_string().starts_with("pdflatex not found"));
        assert!(harness.scratch_is_empty());
    }
}
