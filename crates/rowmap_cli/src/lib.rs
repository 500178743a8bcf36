//! Static entity enhancer.
//!
//! # Responsibility
//! - Scan a crate's source directory for annotated entity structs.
//! - Flatten each configured entity's inheritance chain from source and
//!   emit table metadata plus a change-tracking wrapper beside it.
//!
//! # Invariants
//! - Flattening is fail-open: missing ancestors are logged and skipped.
//! - One `EntityRegistry` lives for exactly one `run`.
//!
//! # See also
//! - `rowmap_core::derive_schema` for the runtime counterpart of
//!   `flatten`.

use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io;
use std::path::{Path, PathBuf};

pub mod config;
pub mod emit;
pub mod flatten;
pub mod module_spec;
pub mod registry;
pub mod scan;

pub use config::{Config, ConfigError, EntityOption};
pub use flatten::Flattened;
pub use module_spec::{ModuleError, ModuleSpec};
pub use registry::{ColumnFieldSpec, EntityRegistry, EntitySpec, ImportSpec};

pub type EnhanceResult<T> = Result<T, EnhanceError>;

/// Enhancer failure.
#[derive(Debug)]
pub enum EnhanceError {
    Io(io::Error),
    Module(ModuleError),
    Parse { path: PathBuf, source: syn::Error },
    /// Generated tokens did not form a valid file.
    Render(String),
    UnknownEntity { name: String, dir: PathBuf },
}

impl Display for EnhanceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "{err}"),
            Self::Module(err) => write!(f, "{err}"),
            Self::Parse { path, source } => {
                write!(f, "failed to parse {}: {source}", path.display())
            }
            Self::Render(message) => write!(f, "failed to render enhancement: {message}"),
            Self::UnknownEntity { name, dir } => {
                write!(f, "Can not find entity {name} in {}", dir.display())
            }
        }
    }
}

impl Error for EnhanceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Module(err) => Some(err),
            Self::Parse { source, .. } => Some(source),
            Self::Render(_) | Self::UnknownEntity { .. } => None,
        }
    }
}

impl From<io::Error> for EnhanceError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<ModuleError> for EnhanceError {
    fn from(value: ModuleError) -> Self {
        Self::Module(value)
    }
}

/// Enhances every configured entity declared directly in `dir`.
///
/// The directory is scanned twice: first to register every entity it
/// declares, then to emit enhancements. Returns the written files.
pub fn run(mod_spec: &ModuleSpec, dir: &Path, config: &Config) -> EnhanceResult<Vec<PathBuf>> {
    let mut registry = EntityRegistry::new();
    scan::scan_dir(mod_spec, dir, scan::scan_predicate, |mod_spec, file| {
        if let Err(err) = scan::build_entity_registry(&mut registry, mod_spec, file) {
            warn!(
                "event=entity_register module=cli status=error file={} error={err}",
                file.display()
            );
        }
    })?;
    info!(
        "event=registry_built module=cli status=ok dir={} entities={}",
        dir.display(),
        registry.len()
    );

    let mut written = Vec::new();
    let mut failure = None;
    scan::scan_dir(mod_spec, dir, scan::scan_predicate, |mod_spec, file| {
        match enhance_file(&mut registry, mod_spec, file, config) {
            Ok(paths) => written.extend(paths),
            Err(err) => {
                error!(
                    "event=enhance module=cli status=error file={} error={err}",
                    file.display()
                );
                failure.get_or_insert(err);
            }
        }
    })?;

    match failure {
        Some(err) => Err(err),
        None => Ok(written),
    }
}

/// Enhances the configured entities declared in one file.
pub fn enhance_file(
    registry: &mut EntityRegistry,
    mod_spec: &ModuleSpec,
    file: &Path,
    config: &Config,
) -> EnhanceResult<Vec<PathBuf>> {
    let parsed = scan::parse_file(file)?;
    let host_dir = file.parent().map(Path::to_path_buf).unwrap_or_default();

    let mut written = Vec::new();
    for item in &parsed.items {
        let syn::Item::Struct(item) = item else {
            continue;
        };
        let name = item.ident.to_string();
        let Some(option) = config.entity_option(&name) else {
            continue;
        };

        let spec = registry
            .lookup(&host_dir, &name)
            .ok_or_else(|| EnhanceError::UnknownEntity {
                name: name.clone(),
                dir: host_dir.clone(),
            })?;
        written.push(emit::enhance_entity(registry, mod_spec, option, &spec)?);
    }
    Ok(written)
}
