//! Code emitter for entity enhancements.
//!
//! # Responsibility
//! - Render table metadata accessors and a change-tracking wrapper for one
//!   entity, written next to the file declaring it.
//!
//! # Invariants
//! - Output starts with `GENERATED_HEADER`.
//! - Imports carried over from the entity's file and its ancestors' files
//!   are kept only when the rendered code references them.
//! - Setter names are unique; a column field shadowed by a nearer level
//!   gets no setter of its own.

use crate::config::EntityOption;
use crate::flatten::{merge_base_imports, Flattened};
use crate::module_spec::ModuleSpec;
use crate::registry::{EntityRegistry, EntitySpec, ImportSpec};
use crate::{EnhanceError, EnhanceResult};
use log::{info, warn};
use proc_macro2::{Ident, Span, TokenStream};
use quote::quote;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use syn::visit::{self, Visit};

pub const GENERATED_HEADER: &str = "// CODE GENERATED AUTOMATICALLY WITH rowmap entity enhancer\n// THIS FILE SHOULD NOT BE EDITED BY HAND\n";

/// Names the generated file imports on its own.
const TEMPLATE_NAMES: [&str; 5] = ["ChangeSet", "ChangeTracker", "Entity", "Deref", "DerefMut"];

/// File name of the enhancement generated for `entity` declared in
/// `source_file`.
pub fn output_file_name(entity: &str, source_file: &Path) -> String {
    let stem = entity.to_lowercase();
    let is_test = source_file
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.ends_with("_test.rs"));
    if is_test {
        format!("{stem}_enhanced_test.rs")
    } else {
        format!("{stem}_enhanced.rs")
    }
}

/// Flattens `spec`, renders its enhancement and writes it beside the
/// declaring file.
pub fn enhance_entity(
    registry: &mut EntityRegistry,
    mod_spec: &ModuleSpec,
    option: &EntityOption,
    spec: &EntitySpec,
) -> EnhanceResult<PathBuf> {
    let flattened = spec.flatten_field_specs(registry, mod_spec, &option.table);
    let content = generate(spec, option, &flattened)?;

    let output = spec.host_dir.join(output_file_name(&spec.name, &spec.file));
    fs::write(&output, content)?;
    info!(
        "event=enhance module=emit status=ok entity={} table={} tables={} output={}",
        spec.name,
        option.table,
        flattened.tables.join(","),
        output.display()
    );
    Ok(output)
}

/// Renders the formatted enhancement source for `spec`.
pub fn generate(spec: &EntitySpec, option: &EntityOption, flattened: &Flattened) -> EnhanceResult<String> {
    let mut imports = spec.imports.clone();
    merge_base_imports(&mut imports, &flattened.tables, &flattened.import_specs);
    imports.retain(|import| {
        let name = import.name();
        !TEMPLATE_NAMES.contains(&name) && name != spec.name
    });

    let draft = render(spec, option, flattened, &imports)?;
    let used = referenced_names(&draft);
    imports.retain(|import| import.is_glob() || used.contains(import.name()));

    let file = render(spec, option, flattened, &imports)?;
    Ok(format!("{GENERATED_HEADER}\n{}", prettyplease::unparse(&file)))
}

fn render(
    spec: &EntitySpec,
    option: &EntityOption,
    flattened: &Flattened,
    imports: &[ImportSpec],
) -> EnhanceResult<syn::File> {
    let table = option.table.as_str();
    let entity = ident(&spec.name);
    let fields_ty = ident(&format!("{}EntityFields", spec.name));
    let columns_ty = ident(&format!("{}TableColumns", spec.name));
    let tracker_ty = ident(&format!("{}WithUpdateTracker", spec.name));

    let source_use = match spec.file.file_stem().and_then(|stem| stem.to_str()) {
        Some("mod" | "lib" | "main") | None => quote! { use super::#entity; },
        Some(stem) => {
            let module = ident(stem);
            quote! { use super::#module::#entity; }
        }
    };

    let mut import_items = Vec::with_capacity(imports.len());
    for import in imports {
        match syn::parse_str::<syn::ItemUse>(&import.to_use_item()) {
            Ok(item) => import_items.push(item),
            Err(err) => warn!(
                "event=render module=emit status=skip reason=invalid_import import={} error={err}",
                import.path
            ),
        }
    }

    let own = flattened
        .field_specs
        .get(table)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let own_idents = own.iter().map(|field| ident(&field.name)).collect::<Vec<_>>();
    let own_names = own
        .iter()
        .map(|field| field.name.trim_start_matches("r#").to_string())
        .collect::<Vec<_>>();
    let own_columns = own.iter().map(|field| field.column.clone()).collect::<Vec<_>>();

    let setters = setters(flattened)?;

    let tokens = quote! {
        #source_use
        #(#import_items)*
        use rowmap_core::{ChangeSet, ChangeTracker, Entity};
        use std::ops::{Deref, DerefMut};

        pub struct #fields_ty {
            #(pub #own_idents: &'static str,)*
        }

        pub struct #columns_ty {
            #(pub #own_idents: &'static str,)*
        }

        impl #entity {
            pub fn table_name(&self) -> &'static str {
                #table
            }

            pub fn entity_fields(&self) -> #fields_ty {
                #fields_ty {
                    #(#own_idents: #own_names,)*
                }
            }

            pub fn table_columns(&self) -> #columns_ty {
                #columns_ty {
                    #(#own_idents: #own_columns,)*
                }
            }
        }

        #[derive(Clone, Entity)]
        #[rowmap(change_tracker)]
        pub struct #tracker_ty {
            #[extends]
            pub entity: #entity,
            pub track_map: ChangeSet,
        }

        impl #tracker_ty {
            pub fn new(entity: #entity) -> Self {
                Self {
                    entity,
                    track_map: ChangeSet::new(),
                }
            }

            pub fn into_inner(self) -> #entity {
                self.entity
            }

            #(#setters)*
        }

        impl Deref for #tracker_ty {
            type Target = #entity;

            fn deref(&self) -> &Self::Target {
                &self.entity
            }
        }

        impl DerefMut for #tracker_ty {
            fn deref_mut(&mut self) -> &mut Self::Target {
                &mut self.entity
            }
        }

        impl ChangeTracker for #tracker_ty {
            fn columns_changed(&self, table: Option<&str>) -> Vec<String> {
                self.track_map.columns_changed(table.unwrap_or(#table))
            }
        }
    };

    syn::parse2(tokens).map_err(|err| EnhanceError::Render(err.to_string()))
}

/// One `set_<field>` per column field across every level.
fn setters(flattened: &Flattened) -> EnhanceResult<Vec<TokenStream>> {
    let mut seen = HashSet::new();
    let mut setters = Vec::new();

    for table in &flattened.tables {
        let path = flattened
            .access_paths
            .get(table)
            .map(|path| path.iter().map(|segment| ident(segment)).collect::<Vec<_>>())
            .unwrap_or_default();
        let Some(fields) = flattened.field_specs.get(table) else {
            continue;
        };

        for field in fields {
            let bare_name = field.name.trim_start_matches("r#");
            if !seen.insert(bare_name.to_string()) {
                warn!(
                    "event=render module=emit status=skip reason=shadowed_setter table={table} field={bare_name}"
                );
                continue;
            }
            let setter = ident(&format!("set_{bare_name}"));
            let field_ident = ident(&field.name);
            let ty = syn::parse_str::<syn::Type>(&field.declared_type).map_err(|err| {
                EnhanceError::Render(format!("field `{}`: {err}", field.name))
            })?;
            let column = field.column.as_str();

            setters.push(quote! {
                pub fn #setter(&mut self, val: #ty) -> &mut Self {
                    self.entity #(.#path)* .#field_ident = val;
                    self.track_map.register_change(#table, #column);
                    self
                }
            });
        }
    }
    Ok(setters)
}

fn ident(name: &str) -> Ident {
    match name.strip_prefix("r#") {
        Some(raw) => Ident::new_raw(raw, Span::call_site()),
        None => Ident::new(name, Span::call_site()),
    }
}

/// Collects every path segment outside `use` items.
#[derive(Default)]
struct NameCollector {
    names: HashSet<String>,
}

impl<'ast> Visit<'ast> for NameCollector {
    fn visit_item_use(&mut self, _item: &'ast syn::ItemUse) {}

    fn visit_path(&mut self, path: &'ast syn::Path) {
        for segment in &path.segments {
            self.names.insert(segment.ident.to_string());
        }
        visit::visit_path(self, path);
    }
}

fn referenced_names(file: &syn::File) -> HashSet<String> {
    let mut collector = NameCollector::default();
    collector.visit_file(file);
    collector.names
}
