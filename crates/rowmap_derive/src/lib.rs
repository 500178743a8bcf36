//! Derive macro for rowmap entities.
//!
//! `#[derive(Entity)]` implements `rowmap_core::Entity` for a struct with
//! named fields:
//!
//! ```rust,ignore
//! use rowmap_core::Entity;
//!
//! #[derive(Clone, Default, Entity)]
//! pub struct Employee {
//!     #[extends]
//!     #[db = ",table=person"]
//!     pub person: Person,
//!     #[db = "company"]
//!     pub company: Option<String>,
//! }
//! ```
//!
//! Fields annotated with a column are read through `ToSql` and written
//! through `FromSql`. Fields marked `#[extends]` must themselves implement
//! `Entity`. The struct must implement `Clone`.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Attribute, Data, DeriveInput, Error, Expr, Fields, Lit, Meta};

/// Derive `rowmap_core::Entity`.
///
/// # Attributes
/// - `#[db = "column[,attr=value...]"]` on fields; `-` as column skips the
///   field.
/// - `#[extends]` on a field whose record maps a parent table. Only such
///   fields may carry `table=`.
/// - `#[rowmap(change_tracker)]` on the struct when it implements
///   `rowmap_core::ChangeTracker`.
#[proc_macro_derive(Entity, attributes(db, extends, rowmap))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match derive_entity_impl(input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

struct FieldData {
    ident: syn::Ident,
    annotation: Option<String>,
    composed: bool,
}

impl FieldData {
    fn has_column(&self) -> bool {
        self.annotation.as_deref().is_some_and(|annotation| {
            let column = annotation.split(',').next().unwrap_or_default().trim();
            !column.is_empty() && column != "-"
        })
    }

    fn declares_table(&self) -> bool {
        self.annotation.as_deref().is_some_and(|annotation| {
            annotation
                .split(',')
                .skip(1)
                .any(|attr| attr.split('=').next().unwrap_or_default().trim() == "table")
        })
    }
}

fn derive_entity_impl(input: DeriveInput) -> Result<proc_macro2::TokenStream, Error> {
    let name = &input.ident;

    if !input.generics.params.is_empty() {
        return Err(Error::new_spanned(
            &input.generics,
            "Entity cannot be derived for generic structs",
        ));
    }

    let fields = match &input.data {
        Data::Struct(data) => match &data.fields {
            Fields::Named(fields) => &fields.named,
            _ => {
                return Err(Error::new_spanned(
                    &input,
                    "Entity can only be derived for structs with named fields",
                ))
            }
        },
        _ => {
            return Err(Error::new_spanned(
                &input,
                "Entity can only be derived for structs",
            ))
        }
    };

    let mut collected = Vec::new();
    for field in fields {
        let Some(ident) = field.ident.clone() else {
            continue;
        };
        let data = FieldData {
            ident,
            annotation: db_annotation(&field.attrs)?,
            composed: field.attrs.iter().any(|attr| attr.path().is_ident("extends")),
        };
        if !data.composed && data.declares_table() {
            return Err(Error::new_spanned(
                field,
                "`table=` is only valid on fields marked #[extends]",
            ));
        }
        collected.push(data);
    }

    let tracks_changes = has_change_tracker_flag(&input.attrs)?;

    let type_name = name.to_string();
    let field_shapes = collected.iter().map(|field| {
        let field_name = field.ident.to_string();
        let annotation = match &field.annotation {
            Some(annotation) => quote! { ::core::option::Option::Some(#annotation) },
            None => quote! { ::core::option::Option::None },
        };
        let kind = if field.composed {
            quote! { ::rowmap_core::FieldKind::Composed }
        } else {
            quote! { ::rowmap_core::FieldKind::Column }
        };
        quote! {
            ::rowmap_core::FieldShape {
                name: #field_name,
                annotation: #annotation,
                kind: #kind,
            }
        }
    });

    let visible = collected
        .iter()
        .filter(|field| field.composed || field.has_column())
        .collect::<Vec<_>>();

    let field_arms = visible.iter().map(|field| {
        let ident = &field.ident;
        let field_name = ident.to_string();
        if field.composed {
            quote! { #field_name => ::core::option::Option::Some(::rowmap_core::FieldRef::Composed(&self.#ident)) }
        } else {
            quote! { #field_name => ::core::option::Option::Some(::rowmap_core::FieldRef::Column(&self.#ident)) }
        }
    });

    let field_mut_arms = visible.iter().map(|field| {
        let ident = &field.ident;
        let field_name = ident.to_string();
        if field.composed {
            quote! { #field_name => ::core::option::Option::Some(::rowmap_core::FieldMut::Composed(&mut self.#ident)) }
        } else {
            quote! { #field_name => ::core::option::Option::Some(::rowmap_core::FieldMut::Column(&mut self.#ident)) }
        }
    });

    let tracker_impl = if tracks_changes {
        quote! {
            fn change_tracker(&self) -> ::core::option::Option<&dyn ::rowmap_core::ChangeTracker> {
                ::core::option::Option::Some(self)
            }
        }
    } else {
        quote! {}
    };

    Ok(quote! {
        impl ::rowmap_core::Entity for #name {
            fn shape(&self) -> &'static ::rowmap_core::Shape {
                static SHAPE: ::rowmap_core::Shape = ::rowmap_core::Shape {
                    name: #type_name,
                    fields: &[#(#field_shapes),*],
                };
                &SHAPE
            }

            fn field(&self, name: &str) -> ::core::option::Option<::rowmap_core::FieldRef<'_>> {
                match name {
                    #(#field_arms,)*
                    _ => ::core::option::Option::None,
                }
            }

            fn field_mut(&mut self, name: &str) -> ::core::option::Option<::rowmap_core::FieldMut<'_>> {
                match name {
                    #(#field_mut_arms,)*
                    _ => ::core::option::Option::None,
                }
            }

            fn clone_entity(&self) -> ::std::boxed::Box<dyn ::rowmap_core::Entity> {
                ::std::boxed::Box::new(::core::clone::Clone::clone(self))
            }

            #tracker_impl
        }
    })
}

/// Extracts `#[db = "..."]` from field attributes.
fn db_annotation(attrs: &[Attribute]) -> Result<Option<String>, Error> {
    for attr in attrs {
        if !attr.path().is_ident("db") {
            continue;
        }
        if let Meta::NameValue(nv) = &attr.meta {
            if let Expr::Lit(expr_lit) = &nv.value {
                if let Lit::Str(lit_str) = &expr_lit.lit {
                    return Ok(Some(lit_str.value()));
                }
            }
        }
        return Err(Error::new_spanned(attr, "Expected #[db = \"...\"]"));
    }
    Ok(None)
}

/// Reads `#[rowmap(change_tracker)]` from struct attributes.
fn has_change_tracker_flag(attrs: &[Attribute]) -> Result<bool, Error> {
    let mut enabled = false;
    for attr in attrs {
        if !attr.path().is_ident("rowmap") {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("change_tracker") {
                enabled = true;
                Ok(())
            } else {
                Err(meta.error("unsupported rowmap attribute"))
            }
        })?;
    }
    Ok(enabled)
}
