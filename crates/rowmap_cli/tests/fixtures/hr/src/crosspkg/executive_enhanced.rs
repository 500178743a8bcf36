// CODE GENERATED AUTOMATICALLY WITH rowmap entity enhancer
// THIS FILE SHOULD NOT BE EDITED BY HAND

use super::executive::Executive;
use crate::embed::mood::Mood;
use rowmap_core::{ChangeSet, ChangeTracker, Entity};
use std::ops::{Deref, DerefMut};
pub struct ExecutiveEntityFields {
    pub level: &'static str,
}
pub struct ExecutiveTableColumns {
    pub level: &'static str,
}
impl Executive {
    pub fn table_name(&self) -> &'static str {
        "executive"
    }
    pub fn entity_fields(&self) -> ExecutiveEntityFields {
        ExecutiveEntityFields { level: "level" }
    }
    pub fn table_columns(&self) -> ExecutiveTableColumns {
        ExecutiveTableColumns { level: "level" }
    }
}
#[derive(Clone, Entity)]
#[rowmap(change_tracker)]
pub struct ExecutiveWithUpdateTracker {
    #[extends]
    pub entity: Executive,
    pub track_map: ChangeSet,
}
impl ExecutiveWithUpdateTracker {
    pub fn new(entity: Executive) -> Self {
        Self {
            entity,
            track_map: ChangeSet::new(),
        }
    }
    pub fn into_inner(self) -> Executive {
        self.entity
    }
    pub fn set_level(&mut self, val: Option<i64>) -> &mut Self {
        self.entity.level = val;
        self.track_map.register_change("executive", "level");
        self
    }
    pub fn set_title(&mut self, val: Option<String>) -> &mut Self {
        self.entity.manager.title = val;
        self.track_map.register_change("manager", "title");
        self
    }
    pub fn set_company(&mut self, val: Option<String>) -> &mut Self {
        self.entity.manager.employee.company = val;
        self.track_map.register_change("employee", "company");
        self
    }
    pub fn set_id(&mut self, val: i64) -> &mut Self {
        self.entity.manager.employee.person.id = val;
        self.track_map.register_change("person", "id");
        self
    }
    pub fn set_first_name(&mut self, val: String) -> &mut Self {
        self.entity.manager.employee.person.first_name = val;
        self.track_map.register_change("person", "first_name");
        self
    }
    pub fn set_last_name(&mut self, val: String) -> &mut Self {
        self.entity.manager.employee.person.last_name = val;
        self.track_map.register_change("person", "last_name");
        self
    }
    pub fn set_email(&mut self, val: Option<String>) -> &mut Self {
        self.entity.manager.employee.person.email = val;
        self.track_map.register_change("person", "email");
        self
    }
    pub fn set_current_mood(&mut self, val: Mood) -> &mut Self {
        self.entity.manager.employee.person.current_mood = val;
        self.track_map.register_change("person", "current_mood");
        self
    }
}
impl Deref for ExecutiveWithUpdateTracker {
    type Target = Executive;
    fn deref(&self) -> &Self::Target {
        &self.entity
    }
}
impl DerefMut for ExecutiveWithUpdateTracker {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.entity
    }
}
impl ChangeTracker for ExecutiveWithUpdateTracker {
    fn columns_changed(&self, table: Option<&str>) -> Vec<String> {
        self.track_map.columns_changed(table.unwrap_or("executive"))
    }
}
