//! Source directory scanning.
//!
//! # Responsibility
//! - Walk one directory of `.rs` files and parse them with `syn`.
//! - Register annotated structs and record the imports in scope for them.
//!
//! # Invariants
//! - Only files directly inside the scanned directory are visited, in name
//!   order.
//! - Generated `_enhanced` files are never scanned.
//! - Relative imports are stored as absolute `crate::` paths.

use crate::module_spec::ModuleSpec;
use crate::registry::{is_entity, EntityRegistry, EntitySpec, ImportSpec};
use crate::{EnhanceError, EnhanceResult};
use log::debug;
use std::fs;
use std::io;
use std::path::Path;
use syn::{Item, UseTree};

const ENHANCED_SUFFIX: &str = "_enhanced.rs";
const ENHANCED_TEST_SUFFIX: &str = "_enhanced_test.rs";

/// Selects source files worth scanning.
pub fn scan_predicate(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
        return false;
    };
    name.ends_with(".rs") && !name.ends_with(ENHANCED_SUFFIX) && !name.ends_with(ENHANCED_TEST_SUFFIX)
}

/// Visits every file in `dir` accepted by `predicate`, sorted by name.
///
/// Paths that are not directories are ignored.
pub fn scan_dir<P, F>(mod_spec: &ModuleSpec, dir: &Path, predicate: P, mut visitor: F) -> io::Result<()>
where
    P: Fn(&Path) -> bool,
    F: FnMut(&ModuleSpec, &Path),
{
    let dir = fs::canonicalize(dir)?;
    if !dir.is_dir() {
        return Ok(());
    }

    let mut files = fs::read_dir(&dir)?
        .map(|entry| entry.map(|entry| entry.path()))
        .collect::<io::Result<Vec<_>>>()?;
    files.sort();

    for file in files.iter().filter(|path| path.is_file() && predicate(path)) {
        visitor(mod_spec, file);
    }
    Ok(())
}

pub fn parse_file(path: &Path) -> EnhanceResult<syn::File> {
    let content = fs::read_to_string(path)?;
    syn::parse_file(&content).map_err(|source| EnhanceError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Registers every annotated struct declared at the top level of `file`.
///
/// Returns how many new entities were stored.
pub fn build_entity_registry(
    registry: &mut EntityRegistry,
    mod_spec: &ModuleSpec,
    file: &Path,
) -> EnhanceResult<usize> {
    let parsed = parse_file(file)?;
    let imports = file_imports(mod_spec, file, &parsed);

    let mut registered = 0;
    for item in &parsed.items {
        let Item::Struct(item) = item else {
            continue;
        };
        if !is_entity(item) {
            continue;
        }
        if registry.register(EntitySpec::new(item.clone(), file, imports.clone())) {
            registered += 1;
            debug!(
                "event=entity_register module=scan status=ok entity={} file={}",
                item.ident,
                file.display()
            );
        }
    }
    Ok(registered)
}

/// Flattens the top-level `use` items of a parsed file.
pub fn file_imports(mod_spec: &ModuleSpec, file: &Path, parsed: &syn::File) -> Vec<ImportSpec> {
    let file_module = mod_spec.module_path_for_file(file);
    let mut leaves = Vec::new();
    for item in &parsed.items {
        if let Item::Use(item) = item {
            flatten_use_tree(&mut Vec::new(), &item.tree, &mut leaves);
        }
    }

    leaves
        .into_iter()
        .map(|(segments, alias)| {
            let path = absolutize(&segments, file_module.as_deref(), &mod_spec.crate_name);
            ImportSpec::new(path, alias)
        })
        .collect()
}

fn flatten_use_tree(
    prefix: &mut Vec<String>,
    tree: &UseTree,
    out: &mut Vec<(Vec<String>, Option<String>)>,
) {
    match tree {
        UseTree::Path(path) => {
            prefix.push(path.ident.to_string());
            flatten_use_tree(prefix, &path.tree, out);
            prefix.pop();
        }
        UseTree::Name(name) => {
            let mut segments = prefix.clone();
            if name.ident != "self" {
                segments.push(name.ident.to_string());
            }
            out.push((segments, None));
        }
        UseTree::Rename(rename) => {
            let mut segments = prefix.clone();
            if rename.ident != "self" {
                segments.push(rename.ident.to_string());
            }
            out.push((segments, Some(rename.rename.to_string())));
        }
        UseTree::Glob(_) => {
            let mut segments = prefix.clone();
            segments.push("*".to_string());
            out.push((segments, None));
        }
        UseTree::Group(group) => {
            for item in &group.items {
                flatten_use_tree(prefix, item, out);
            }
        }
    }
}

/// Rewrites `self::`, `super::` and `<crate_name>::` prefixes relative to
/// the module declaring the import.
pub(crate) fn absolutize(segments: &[String], file_module: Option<&str>, crate_name: &str) -> String {
    let first = segments.first().map(String::as_str);
    let relative = matches!(first, Some("self") | Some("super"));

    if first == Some(crate_name) {
        let mut path = vec!["crate".to_string()];
        path.extend(segments[1..].iter().cloned());
        return path.join("::");
    }
    let Some(file_module) = file_module.filter(|_| relative) else {
        return segments.join("::");
    };

    let mut base = file_module.split("::").map(str::to_string).collect::<Vec<_>>();
    let mut rest = segments;
    while let Some((head, tail)) = rest.split_first() {
        match head.as_str() {
            "self" => {}
            "super" if base.len() > 1 => {
                base.pop();
            }
            "super" => {}
            _ => break,
        }
        rest = tail;
    }
    base.extend(rest.iter().cloned());
    base.join("::")
}
