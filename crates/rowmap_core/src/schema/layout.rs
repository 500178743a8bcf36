//! Parsed shape layouts cached by shape identity.

use crate::entity::annotation::Annotation;
use crate::entity::{FieldKind, Shape};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

static LAYOUTS: Lazy<Mutex<HashMap<usize, Arc<ShapeLayout>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

#[derive(Debug)]
pub(crate) struct FieldLayout {
    pub name: &'static str,
    pub kind: FieldKind,
    pub annotation: Option<Annotation>,
}

impl FieldLayout {
    /// Returns the mapped column of a non-composed field.
    pub fn column(&self) -> Option<&str> {
        match (self.kind, self.annotation.as_ref()) {
            (FieldKind::Column, Some(annotation)) if annotation.is_column() => {
                Some(annotation.column.as_str())
            }
            _ => None,
        }
    }
}

#[derive(Debug)]
pub(crate) struct ShapeLayout {
    pub fields: Vec<FieldLayout>,
}

impl ShapeLayout {
    fn build(shape: &Shape) -> Self {
        let fields = shape
            .fields
            .iter()
            .map(|field| FieldLayout {
                name: field.name,
                kind: field.kind,
                annotation: field.annotation.map(Annotation::parse),
            })
            .collect();
        Self { fields }
    }

    /// Returns whether any plain field carries a `db` annotation at all.
    pub fn has_direct_annotation(&self) -> bool {
        self.fields
            .iter()
            .any(|field| field.kind == FieldKind::Column && field.annotation.is_some())
    }

    pub fn composed(&self) -> impl Iterator<Item = &FieldLayout> {
        self.fields
            .iter()
            .filter(|field| field.kind == FieldKind::Composed)
    }
}

/// Returns the parsed layout of `shape`, parsing it on first use.
pub(crate) fn layout_of(shape: &'static Shape) -> Arc<ShapeLayout> {
    let mut layouts = LAYOUTS
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    layouts
        .entry(shape.identity())
        .or_insert_with(|| Arc::new(ShapeLayout::build(shape)))
        .clone()
}

#[cfg(test)]
mod tests {
    use super::layout_of;
    use crate::entity::{FieldKind, FieldShape, Shape};
    use std::sync::Arc;

    static SHAPE: Shape = Shape {
        name: "Sample",
        fields: &[
            FieldShape {
                name: "id",
                annotation: Some("id"),
                kind: FieldKind::Column,
            },
            FieldShape {
                name: "note",
                annotation: Some("-"),
                kind: FieldKind::Column,
            },
            FieldShape {
                name: "base",
                annotation: Some(",table=base"),
                kind: FieldKind::Composed,
            },
        ],
    };

    #[test]
    fn layout_is_parsed_once_per_shape() {
        let first = layout_of(&SHAPE);
        let second = layout_of(&SHAPE);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn layout_exposes_columns_and_composed_fields() {
        let layout = layout_of(&SHAPE);
        assert!(layout.has_direct_annotation());
        assert_eq!(layout.fields[0].column(), Some("id"));
        assert_eq!(layout.fields[1].column(), None);
        assert_eq!(
            layout.composed().map(|field| field.name).collect::<Vec<_>>(),
            vec!["base"]
        );
    }
}
