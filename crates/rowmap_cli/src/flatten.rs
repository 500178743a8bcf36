//! Static flattening of an entity's inheritance chain.
//!
//! # Responsibility
//! - Follow `table=` composed fields through source files, resolving the
//!   composed type by imports and module paths.
//! - Produce per-table column fields, imports and access paths for the
//!   code emitter.
//!
//! # Invariants
//! - Tables are listed with the entity's own table first, followed by each
//!   ancestor depth first in declaration order.
//! - Only `#[extends]` fields with a `table=` attribute are followed.
//! - An ancestor that cannot be found, or that is already on the current
//!   chain, is logged and omitted; flattening itself never fails.

use crate::module_spec::ModuleSpec;
use crate::registry::{db_annotation, ColumnFieldSpec, EntityRegistry, EntitySpec, ImportSpec};
use crate::scan::{absolutize, build_entity_registry, scan_dir, scan_predicate};
use log::{error, warn};
use rowmap_core::entity::annotation::Annotation;
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use syn::{GenericArgument, PathArguments, Type};

/// Result of flattening one entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flattened {
    pub tables: Vec<String>,
    /// Column fields owned by each table.
    pub field_specs: BTreeMap<String, Vec<ColumnFieldSpec>>,
    /// Imports in scope where each table's record is declared.
    pub import_specs: BTreeMap<String, Vec<ImportSpec>>,
    /// Composed field names leading from the entity to each table's record.
    pub access_paths: BTreeMap<String, Vec<String>>,
}

impl EntitySpec {
    /// Flattens this entity mapped to `table` together with its ancestors.
    pub fn flatten_field_specs(
        &self,
        registry: &mut EntityRegistry,
        mod_spec: &ModuleSpec,
        table: &str,
    ) -> Flattened {
        let mut flattened = Flattened::default();
        let mut chain = HashSet::from([(self.host_dir.clone(), self.name.clone())]);
        flatten_into(
            self,
            registry,
            mod_spec,
            table,
            Vec::new(),
            &mut chain,
            &mut flattened,
        );
        flattened
    }

    /// Resolves a composed field type to its declaring directory and name.
    fn resolve_type(&self, mod_spec: &ModuleSpec, segments: &[String]) -> (PathBuf, String) {
        let Some((name, module)) = segments.split_last() else {
            return (self.host_dir.clone(), String::new());
        };
        let file_module = mod_spec.module_path_for_file(&self.file);

        let (module_path, name) = if module.is_empty() {
            match self.find_import(name) {
                Some(import) => match import.path.rsplit_once("::") {
                    Some((module_path, imported)) => {
                        (Some(module_path.to_string()), imported.to_string())
                    }
                    None => (None, name.clone()),
                },
                None => (None, name.clone()),
            }
        } else {
            let first = module[0].as_str();
            let module_path = match first {
                "crate" | "self" | "super" => {
                    absolutize(module, file_module.as_deref(), &mod_spec.crate_name)
                }
                _ if first == mod_spec.crate_name => {
                    absolutize(module, file_module.as_deref(), &mod_spec.crate_name)
                }
                _ => match self.find_import(first) {
                    Some(import) => {
                        let mut path = vec![import.path.clone()];
                        path.extend(module[1..].iter().cloned());
                        path.join("::")
                    }
                    None => {
                        let mut relative = vec!["self".to_string()];
                        relative.extend(module.iter().cloned());
                        absolutize(&relative, file_module.as_deref(), &mod_spec.crate_name)
                    }
                },
            };
            (Some(module_path), name.clone())
        };

        let Some(module_path) = module_path else {
            return (self.host_dir.clone(), name);
        };
        match mod_spec.resolve_module_path(&module_path) {
            Ok(dir) => (dir, name),
            Err(err) => {
                error!(
                    "event=flatten module=flatten status=error reason=unresolved_module entity={} path={module_path} error={err}",
                    self.name
                );
                (self.host_dir.clone(), name)
            }
        }
    }

    fn find_import(&self, name: &str) -> Option<&ImportSpec> {
        self.imports
            .iter()
            .find(|import| !import.is_glob() && import.name() == name)
    }
}

/// `chain` holds the `(dir, name)` keys of the entities between the root
/// and `spec`, inclusive.
fn flatten_into(
    spec: &EntitySpec,
    registry: &mut EntityRegistry,
    mod_spec: &ModuleSpec,
    table: &str,
    access_path: Vec<String>,
    chain: &mut HashSet<(PathBuf, String)>,
    out: &mut Flattened,
) {
    out.tables.push(table.to_string());
    out.field_specs
        .insert(table.to_string(), spec.field_specs.clone());
    out.import_specs
        .insert(table.to_string(), spec.imports.clone());
    out.access_paths
        .insert(table.to_string(), access_path.clone());

    let syn::Fields::Named(fields) = &spec.item.fields else {
        return;
    };
    for field in &fields.named {
        let Some(ident) = &field.ident else {
            continue;
        };
        let Some(raw) = db_annotation(&field.attrs) else {
            continue;
        };
        let annotation = Annotation::parse(&raw);
        let Some(base_table) = annotation.table() else {
            continue;
        };
        if !field.attrs.iter().any(|attr| attr.path().is_ident("extends")) {
            warn!(
                "event=flatten module=flatten status=skip reason=table_without_extends entity={} field={ident}",
                spec.name
            );
            continue;
        }
        let Some(segments) = type_segments(&field.ty) else {
            warn!(
                "event=flatten module=flatten status=skip reason=unsupported_type entity={} field={ident}",
                spec.name
            );
            continue;
        };

        let (dir, name) = spec.resolve_type(mod_spec, &segments);
        let key = (dir.clone(), name.clone());
        if chain.contains(&key) {
            warn!(
                "event=flatten module=flatten status=skip reason=cyclic_entity entity={} field={ident} base={name}",
                spec.name
            );
            continue;
        }
        let base = match registry.lookup(&dir, &name) {
            Some(base) => Some(base),
            None => {
                let scanned = scan_dir(mod_spec, &dir, scan_predicate, |mod_spec, file| {
                    if let Err(err) = build_entity_registry(registry, mod_spec, file) {
                        warn!(
                            "event=entity_register module=flatten status=error file={} error={err}",
                            file.display()
                        );
                    }
                });
                if let Err(err) = scanned {
                    warn!(
                        "event=scan_dir module=flatten status=error dir={} error={err}",
                        dir.display()
                    );
                }
                registry.lookup(&dir, &name)
            }
        };

        match base {
            Some(base) => {
                let mut base_path = access_path.clone();
                base_path.push(ident.to_string());
                chain.insert(key.clone());
                flatten_into(&base, registry, mod_spec, base_table, base_path, chain, out);
                chain.remove(&key);
            }
            None => error!(
                "event=flatten module=flatten status=error reason=entity_not_found entity={name} dir={}",
                dir.display()
            ),
        }
    }
}

/// Path segments of a composed field type, with references and `Box`
/// stripped.
fn type_segments(ty: &Type) -> Option<Vec<String>> {
    match ty {
        Type::Reference(reference) => type_segments(&reference.elem),
        Type::Paren(paren) => type_segments(&paren.elem),
        Type::Group(group) => type_segments(&group.elem),
        Type::Path(type_path) if type_path.qself.is_none() => {
            let last = type_path.path.segments.last()?;
            if last.ident == "Box" {
                if let PathArguments::AngleBracketed(args) = &last.arguments {
                    if let Some(GenericArgument::Type(inner)) = args.args.first() {
                        return type_segments(inner);
                    }
                }
            }
            Some(
                type_path
                    .path
                    .segments
                    .iter()
                    .map(|segment| segment.ident.to_string())
                    .collect(),
            )
        }
        _ => None,
    }
}

/// Appends the imports of every ancestor table not already present.
pub fn merge_base_imports(
    imports: &mut Vec<ImportSpec>,
    tables: &[String],
    import_specs: &BTreeMap<String, Vec<ImportSpec>>,
) {
    for table in tables.iter().skip(1) {
        let Some(base_imports) = import_specs.get(table) else {
            continue;
        };
        for import in base_imports {
            if !imports.contains(import) {
                imports.push(import.clone());
            }
        }
    }
}
