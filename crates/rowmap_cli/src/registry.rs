//! Statically derived entity descriptions and their registry.
//!
//! # Responsibility
//! - Describe an annotated struct found in source: its column fields, its
//!   declaring file and directory, and the imports in scope there.
//! - Cache descriptions for one tool invocation.
//!
//! # Invariants
//! - Registry keys are `(record name, canonical declaring directory)`.
//! - The first registration for a key wins; entries are never evicted.

use quote::ToTokens;
use rowmap_core::entity::annotation::Annotation;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use syn::{Attribute, Expr, ItemStruct, Lit, Meta};

/// One column-mapped field of a scanned struct.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnFieldSpec {
    pub name: String,
    pub column: String,
    /// Field type as written in source.
    pub declared_type: String,
}

/// One flattened `use` leaf of a scanned file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImportSpec {
    /// Absolute path when the import was relative; `*` for glob leaves.
    pub path: String,
    pub alias: Option<String>,
}

impl ImportSpec {
    pub fn new(path: impl Into<String>, alias: Option<String>) -> Self {
        Self {
            path: path.into(),
            alias,
        }
    }

    /// Name the import binds in scope.
    pub fn name(&self) -> &str {
        match &self.alias {
            Some(alias) => alias,
            None => self.path.rsplit("::").next().unwrap_or(&self.path),
        }
    }

    pub fn is_glob(&self) -> bool {
        self.path.ends_with('*')
    }

    /// Renders the import as a `use` item.
    pub fn to_use_item(&self) -> String {
        match &self.alias {
            Some(alias) => format!("use {} as {alias};", self.path),
            None => format!("use {};", self.path),
        }
    }
}

/// A struct with at least one `#[db]` field, as found in source.
#[derive(Debug, Clone)]
pub struct EntitySpec {
    pub name: String,
    pub item: ItemStruct,
    pub field_specs: Vec<ColumnFieldSpec>,
    /// Canonical directory of the declaring file.
    pub host_dir: PathBuf,
    pub file: PathBuf,
    pub imports: Vec<ImportSpec>,
}

impl EntitySpec {
    pub fn new(item: ItemStruct, file: &Path, imports: Vec<ImportSpec>) -> Self {
        Self {
            name: item.ident.to_string(),
            field_specs: entity_fields(&item),
            item,
            host_dir: file.parent().map(Path::to_path_buf).unwrap_or_default(),
            file: file.to_path_buf(),
            imports,
        }
    }
}

/// Entity descriptions keyed by name and declaring directory.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    entries: HashMap<(String, PathBuf), Rc<EntitySpec>>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `spec` unless its key is already present.
    ///
    /// Returns whether the entity was stored.
    pub fn register(&mut self, spec: EntitySpec) -> bool {
        let key = (spec.name.clone(), spec.host_dir.clone());
        if self.entries.contains_key(&key) {
            return false;
        }
        self.entries.insert(key, Rc::new(spec));
        true
    }

    pub fn lookup(&self, dir: &Path, name: &str) -> Option<Rc<EntitySpec>> {
        self.entries
            .get(&(name.to_string(), dir.to_path_buf()))
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Reads `#[db = "..."]` from a field's attributes.
pub fn db_annotation(attrs: &[Attribute]) -> Option<String> {
    attrs
        .iter()
        .filter(|attr| attr.path().is_ident("db"))
        .find_map(|attr| match &attr.meta {
            Meta::NameValue(nv) => match &nv.value {
                Expr::Lit(expr_lit) => match &expr_lit.lit {
                    Lit::Str(lit_str) => Some(lit_str.value()),
                    _ => None,
                },
                _ => None,
            },
            _ => None,
        })
}

/// Returns whether any field of `item` carries a `#[db]` annotation.
pub fn is_entity(item: &ItemStruct) -> bool {
    item.fields
        .iter()
        .any(|field| db_annotation(&field.attrs).is_some())
}

/// Collects the fields of `item` that map a column.
pub fn entity_fields(item: &ItemStruct) -> Vec<ColumnFieldSpec> {
    item.fields
        .iter()
        .filter_map(|field| {
            let ident = field.ident.as_ref()?;
            let annotation = Annotation::parse(&db_annotation(&field.attrs)?);
            if !annotation.is_column() {
                return None;
            }
            Some(ColumnFieldSpec {
                name: ident.to_string(),
                column: annotation.column,
                declared_type: field.ty.to_token_stream().to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{entity_fields, is_entity, EntityRegistry, EntitySpec, ImportSpec};
    use std::path::Path;
    use syn::parse_quote;

    #[test]
    fn import_names_follow_alias() {
        let plain = ImportSpec::new("crate::embed::mood::Mood", None);
        assert_eq!(plain.name(), "Mood");
        assert_eq!(plain.to_use_item(), "use crate::embed::mood::Mood;");

        let aliased = ImportSpec::new("crate::embed::mood", Some("m".to_string()));
        assert_eq!(aliased.name(), "m");
        assert_eq!(aliased.to_use_item(), "use crate::embed::mood as m;");
        assert!(ImportSpec::new("crate::embed::*", None).is_glob());
    }

    #[test]
    fn only_column_fields_are_collected() {
        let item = parse_quote! {
            pub struct Employee {
                #[extends]
                #[db = ",table=person"]
                pub person: Person,
                #[db = "company"]
                pub company: Option<String>,
                #[db = "-"]
                pub scratch: String,
                pub cache: u8,
            }
        };

        assert!(is_entity(&item));
        let fields = entity_fields(&item);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].name, "company");
        assert_eq!(fields[0].column, "company");
        assert_eq!(fields[0].declared_type, "Option < String >");
    }

    #[test]
    fn first_registration_wins() {
        let mut registry = EntityRegistry::new();
        let first: syn::ItemStruct = parse_quote! {
            struct City { #[db = "id"] id: i64 }
        };
        let second: syn::ItemStruct = parse_quote! {
            struct City { #[db = "name"] name: String }
        };
        let file = Path::new("/work/src/geo/city.rs");

        assert!(registry.register(EntitySpec::new(first, file, Vec::new())));
        assert!(!registry.register(EntitySpec::new(second, file, Vec::new())));
        assert_eq!(registry.len(), 1);

        let found = registry.lookup(Path::new("/work/src/geo"), "City").unwrap();
        assert_eq!(found.field_specs[0].column, "id");
        assert!(registry.lookup(Path::new("/work/src"), "City").is_none());
    }
}
