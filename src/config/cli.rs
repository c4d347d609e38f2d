use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

/// Command-line arguments for the figrender binary.
#[derive(Debug, Parser)]
#[command(
    name = "figrender",
    version,
    about = "Render Rhai plotting scripts and TikZ sources to PNG"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "FIGRENDER_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP render service.
    Serve(Box<ServeArgs>),
    /// Render a single figure from a file or stdin.
    Render(RenderArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct RenderOverrides {
    /// Override the maximum number of renders running at once.
    #[arg(long = "render-max-concurrent", value_name = "COUNT")]
    pub max_concurrent: Option<u64>,

    /// Override the LaTeX compiler executable name used for compiled renders.
    #[arg(long = "compiler", value_name = "NAME")]
    pub compiler: Option<String>,

    /// Override the per-tool timeout for compiled renders.
    #[arg(long = "compile-timeout-seconds", value_name = "SECONDS")]
    pub compile_timeout_seconds: Option<u64>,

    /// Override the directory under which scratch workspaces are created.
    #[arg(long = "scratch-root", value_name = "PATH", value_hint = ValueHint::DirPath)]
    pub scratch_root: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub render: RenderOverrides,

    /// Override the listener host.
    #[arg(long = "host", value_name = "HOST")]
    pub host: Option<String>,

    /// Override the listener port.
    #[arg(long = "port", value_name = "PORT")]
    pub port: Option<u16>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Emit logs as JSON.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        num_args = 0..=1,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,
}

#[derive(Debug, Args, Clone)]
pub struct RenderArgs {
    #[command(flatten)]
    pub overrides: RenderOverrides,

    /// Render mode (`script` or `compiled`).
    #[arg(long, default_value = "script", value_name = "MODE")]
    pub mode: String,

    /// Source file to render; `-` reads standard input.
    #[arg(long, default_value = "-", value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub input: PathBuf,

    /// Where to write the PNG image.
    #[arg(long, value_name = "FILE", value_hint = ValueHint::FilePath)]
    pub output: PathBuf,
}

impl RenderArgs {
    pub fn reads_stdin(&self) -> bool {
        self.input.as_os_str() == "-"
    }
}
