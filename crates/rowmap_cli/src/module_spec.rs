//! Crate root discovery and module path resolution.
//!
//! # Responsibility
//! - Locate the enclosing crate by walking up to `Cargo.toml`.
//! - Map `crate::a::b` module paths to host directories and back.
//!
//! # Invariants
//! - `root_dir` is canonical, so resolved directories compare equal to the
//!   canonical directories `scan_dir` registers entities under.
//! - Module paths naming another crate are rejected.

use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const MANIFEST_FILE: &str = "Cargo.toml";
const SOURCE_DIR: &str = "src";

/// Module resolution failure.
#[derive(Debug)]
pub enum ModuleError {
    /// No `Cargo.toml` was found from the start directory upward.
    ManifestNotFound(PathBuf),
    /// The manifest is not valid TOML.
    ParseManifest {
        path: PathBuf,
        source: toml::de::Error,
    },
    /// The manifest carries no `[package]` name.
    InvalidManifest(PathBuf),
    /// The module path names a crate other than the scanned one.
    ExternalCrate(String),
    Io(io::Error),
}

impl Display for ModuleError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ManifestNotFound(start) => {
                write!(f, "no {MANIFEST_FILE} found above {}", start.display())
            }
            Self::ParseManifest { path, source } => {
                write!(f, "failed to parse {}: {source}", path.display())
            }
            Self::InvalidManifest(path) => {
                write!(f, "no package name in {}", path.display())
            }
            Self::ExternalCrate(path) => {
                write!(f, "external crate is not supported: {path}")
            }
            Self::Io(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ModuleError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::ParseManifest { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<io::Error> for ModuleError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

/// The crate being scanned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSpec {
    /// Canonical directory holding `Cargo.toml`.
    pub root_dir: PathBuf,
    /// Package name with `-` normalised to `_`.
    pub crate_name: String,
}

impl ModuleSpec {
    /// Discovers the crate enclosing the working directory.
    pub fn discover() -> Result<Self, ModuleError> {
        let cwd = std::env::current_dir()?;
        Self::discover_from(&cwd)
    }

    /// Discovers the crate enclosing `start`.
    pub fn discover_from(start: &Path) -> Result<Self, ModuleError> {
        let start = fs::canonicalize(start)?;
        let mut current = Some(start.as_path());
        while let Some(dir) = current {
            let manifest = dir.join(MANIFEST_FILE);
            if manifest.is_file() {
                let crate_name = read_package_name(&manifest)?;
                return Ok(Self {
                    root_dir: dir.to_path_buf(),
                    crate_name,
                });
            }
            current = dir.parent();
        }
        Err(ModuleError::ManifestNotFound(start))
    }

    /// Returns the `src` directory of the crate.
    pub fn source_dir(&self) -> PathBuf {
        self.root_dir.join(SOURCE_DIR)
    }

    /// Maps `crate::a::b` (or `<crate_name>::a::b`) to the directory hosting
    /// the module's items.
    ///
    /// A module backed by `a/b.rs` is hosted by `a/`; a module backed by
    /// `a/b/mod.rs` is hosted by `a/b/`.
    pub fn resolve_module_path(&self, module_path: &str) -> Result<PathBuf, ModuleError> {
        let mut segments = module_path.split("::").map(str::trim);
        match segments.next() {
            Some("crate") => {}
            Some(first) if first == self.crate_name => {}
            _ => return Err(ModuleError::ExternalCrate(module_path.to_string())),
        }

        let rest = segments.filter(|s| !s.is_empty()).collect::<Vec<_>>();
        let mut dir = self.source_dir();
        for segment in &rest {
            dir.push(segment);
        }
        if dir.is_dir() {
            return Ok(dir);
        }

        if let Some((last, parents)) = rest.split_last() {
            let mut parent = self.source_dir();
            for segment in parents {
                parent.push(segment);
            }
            if parent.join(format!("{last}.rs")).is_file() {
                return Ok(parent);
            }
        }
        Ok(dir)
    }

    /// Returns the absolute module path of `dir`, e.g. `crate::embed`.
    pub fn module_path_for_dir(&self, dir: &Path) -> Option<String> {
        let relative = dir.strip_prefix(self.source_dir()).ok()?;
        let mut path = String::from("crate");
        for component in relative.components() {
            path.push_str("::");
            path.push_str(component.as_os_str().to_str()?);
        }
        Some(path)
    }

    /// Returns the absolute module path declared by a source file.
    ///
    /// `mod.rs`, `lib.rs` and `main.rs` name their directory's module.
    pub fn module_path_for_file(&self, file: &Path) -> Option<String> {
        let dir_path = self.module_path_for_dir(file.parent()?)?;
        let stem = file.file_stem()?.to_str()?;
        match stem {
            "mod" | "lib" | "main" => Some(dir_path),
            _ => Some(format!("{dir_path}::{stem}")),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Manifest {
    package: Option<Package>,
}

#[derive(Debug, Deserialize)]
struct Package {
    name: String,
}

fn read_package_name(manifest: &Path) -> Result<String, ModuleError> {
    let content = fs::read_to_string(manifest)?;
    let parsed: Manifest =
        toml::from_str(&content).map_err(|source| ModuleError::ParseManifest {
            path: manifest.to_path_buf(),
            source,
        })?;

    match parsed.package {
        Some(package) if !package.name.trim().is_empty() => {
            Ok(package.name.trim().replace('-', "_"))
        }
        _ => Err(ModuleError::InvalidManifest(manifest.to_path_buf())),
    }
}
