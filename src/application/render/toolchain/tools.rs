//! External tool discovery. Nothing here is cached: every lookup walks the
//! search path as it is at call time.

use std::{
    env,
    ffi::{OsStr, OsString},
    fs,
    path::{Path, PathBuf},
};

/// PDF-to-PNG converters in priority order.
pub const CONVERTERS: &[Converter] = &[Converter::Pdftoppm, Converter::Magick, Converter::Convert];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Converter {
    /// poppler-utils
    Pdftoppm,
    /// ImageMagick 7
    Magick,
    /// ImageMagick 6
    Convert,
}

impl Converter {
    pub fn program(self) -> &'static str {
        match self {
            Converter::Pdftoppm => "pdftoppm",
            Converter::Magick => "magick",
            Converter::Convert => "convert",
        }
    }

    /// Arguments that turn `pdf` into `png` at `dpi`.
    ///
    /// `pdftoppm` takes an output prefix and appends `.png` itself.
    pub fn args(self, pdf: &Path, png: &Path, dpi: u32) -> Vec<OsString> {
        let dpi = dpi.to_string();
        match self {
            Converter::Pdftoppm => vec![
                "-png".into(),
                "-r".into(),
                dpi.into(),
                "-singlefile".into(),
                pdf.into(),
                png.with_extension("").into(),
            ],
            Converter::Magick | Converter::Convert => vec![
                "-density".into(),
                dpi.into(),
                pdf.into(),
                "-quality".into(),
                "100".into(),
                png.into(),
            ],
        }
    }
}

/// A converter found on the search path for one render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConverterChoice {
    pub converter: Converter,
    pub path: PathBuf,
}

impl ConverterChoice {
    pub fn discover(search_path: Option<&OsStr>) -> Option<Self> {
        CONVERTERS.iter().find_map(|converter| {
            find_tool(&[converter.program()], search_path).map(|path| ConverterChoice {
                converter: *converter,
                path,
            })
        })
    }
}

/// First executable among `names` on `search_path` (the process `PATH` when
/// `None`). Names are tried in order; each name is looked up across every
/// directory before the next name is considered.
pub fn find_tool(names: &[&str], search_path: Option<&OsStr>) -> Option<PathBuf> {
    let path = match search_path {
        Some(path) => path.to_os_string(),
        None => env::var_os("PATH")?,
    };
    let dirs: Vec<PathBuf> = env::split_paths(&path)
        .filter(|dir| !dir.as_os_str().is_empty())
        .collect();

    names.iter().find_map(|name| {
        dirs.iter()
            .flat_map(|dir| candidates(dir, name))
            .find(|candidate| is_executable(candidate))
    })
}

#[cfg(windows)]
fn candidates(dir: &Path, name: &str) -> Vec<PathBuf> {
    vec![dir.join(format!("{name}.exe")), dir.join(name)]
}

#[cfg(not(windows))]
fn candidates(dir: &Path, name: &str) -> Vec<PathBuf> {
    vec![dir.join(name)]
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}
