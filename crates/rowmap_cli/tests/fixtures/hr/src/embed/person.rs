use super::mood::Mood;
use rowmap_core::Entity;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Entity)]
pub struct Person {
    #[db = "id"]
    pub id: i64,
    #[db = "first_name"]
    pub first_name: String,
    #[db = "last_name"]
    pub last_name: String,
    #[db = "email"]
    pub email: Option<String>,
    #[db = "current_mood"]
    pub current_mood: Mood,
    #[db = "-"]
    pub scratch: String,
}

impl Person {
    pub fn labels(&self) -> HashMap<&'static str, String> {
        HashMap::from([("first_name", self.first_name.clone())])
    }
}
