//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    ffi::OsString,
    net::SocketAddr,
    num::NonZeroUsize,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::application::render::{ScriptOptions, ToolchainOptions};

mod cli;

pub use cli::{CliArgs, Command, RenderArgs, RenderOverrides, ServeArgs, ServeOverrides};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "figrender";
const ENV_PREFIX: &str = "FIGRENDER";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 5678;
const DEFAULT_MAX_CONCURRENT: u64 = 4;
const MAX_SCRIPT_DPI: f64 = 1200.0;
const MAX_SCRIPT_INCHES: f64 = 50.0;

/// Fully-resolved settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub render: RenderSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct RenderSettings {
    pub max_concurrent: NonZeroUsize,
    pub script: ScriptOptions,
    pub compiled: ToolchainOptions,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Render(args)) => raw.apply_render_overrides(&args.overrides),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    render: RawRenderSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.port {
            self.server.port = Some(port);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }

        self.apply_render_overrides(&overrides.render);
    }

    fn apply_render_overrides(&mut self, overrides: &RenderOverrides) {
        if let Some(max) = overrides.max_concurrent {
            self.render.max_concurrent = Some(max);
        }
        if let Some(compiler) = overrides.compiler.as_ref() {
            self.render.compiled.compiler = Some(compiler.clone());
        }
        if let Some(seconds) = overrides.compile_timeout_seconds {
            self.render.compiled.timeout_seconds = Some(seconds);
        }
        if let Some(root) = overrides.scratch_root.as_ref() {
            self.render.compiled.scratch_root = Some(root.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            render,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            render: build_render_settings(render)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    Ok(ServerSettings { addr })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_render_settings(render: RawRenderSettings) -> Result<RenderSettings, LoadError> {
    let max_concurrent = non_zero_usize(
        render.max_concurrent.unwrap_or(DEFAULT_MAX_CONCURRENT),
        "render.max_concurrent",
    )?;

    Ok(RenderSettings {
        max_concurrent,
        script: build_script_options(render.script)?,
        compiled: build_toolchain_options(render.compiled)?,
    })
}

fn build_script_options(script: RawScriptSettings) -> Result<ScriptOptions, LoadError> {
    let defaults = ScriptOptions::default();

    let dpi = script.dpi.unwrap_or(defaults.dpi);
    if !(dpi.is_finite() && dpi > 0.0 && dpi <= MAX_SCRIPT_DPI) {
        return Err(LoadError::invalid(
            "render.script.dpi",
            format!("must be within (0, {MAX_SCRIPT_DPI}]"),
        ));
    }

    let width_inches = positive_inches(
        script.width_inches.unwrap_or(defaults.width_inches),
        "render.script.width_inches",
    )?;
    let height_inches = positive_inches(
        script.height_inches.unwrap_or(defaults.height_inches),
        "render.script.height_inches",
    )?;

    let max_operations = script.max_operations.unwrap_or(defaults.max_operations);
    if max_operations == 0 {
        return Err(LoadError::invalid(
            "render.script.max_operations",
            "must be greater than zero",
        ));
    }

    Ok(ScriptOptions {
        dpi,
        width_inches,
        height_inches,
        max_operations,
    })
}

fn build_toolchain_options(compiled: RawCompiledSettings) -> Result<ToolchainOptions, LoadError> {
    let defaults = ToolchainOptions::default();

    let compiler = compiled
        .compiler
        .map(|value| value.trim().to_string())
        .unwrap_or(defaults.compiler);
    if compiler.is_empty() {
        return Err(LoadError::invalid(
            "render.compiled.compiler",
            "compiler name must not be empty",
        ));
    }

    let timeout = match compiled.timeout_seconds {
        Some(0) => {
            return Err(LoadError::invalid(
                "render.compiled.timeout_seconds",
                "must be greater than zero",
            ));
        }
        Some(seconds) => Duration::from_secs(seconds),
        None => defaults.timeout,
    };

    let dpi = compiled.dpi.unwrap_or(defaults.dpi);
    if dpi == 0 {
        return Err(LoadError::invalid(
            "render.compiled.dpi",
            "must be greater than zero",
        ));
    }

    let log_tail_chars = compiled.log_tail_chars.unwrap_or(defaults.log_tail_chars);

    let scratch_root = compiled.scratch_root.filter(|path| !path.as_os_str().is_empty());
    let search_path = compiled
        .search_path
        .filter(|value| !value.trim().is_empty())
        .map(OsString::from);

    Ok(ToolchainOptions {
        compiler,
        timeout,
        dpi,
        log_tail_chars,
        scratch_root,
        search_path,
    })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRenderSettings {
    max_concurrent: Option<u64>,
    script: RawScriptSettings,
    compiled: RawCompiledSettings,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawScriptSettings {
    dpi: Option<f64>,
    width_inches: Option<f64>,
    height_inches: Option<f64>,
    max_operations: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawCompiledSettings {
    compiler: Option<String>,
    timeout_seconds: Option<u64>,
    dpi: Option<u32>,
    log_tail_chars: Option<usize>,
    scratch_root: Option<PathBuf>,
    search_path: Option<String>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_usize(value: u64, key: &'static str) -> Result<NonZeroUsize, LoadError> {
    let value: usize = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for usize"))?;
    NonZeroUsize::new(value).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

fn positive_inches(value: f64, key: &'static str) -> Result<f64, LoadError> {
    if value.is_finite() && value > 0.0 && value <= MAX_SCRIPT_INCHES {
        Ok(value)
    } else {
        Err(LoadError::invalid(
            key,
            format!("must be within (0, {MAX_SCRIPT_INCHES}]"),
        ))
    }
}
