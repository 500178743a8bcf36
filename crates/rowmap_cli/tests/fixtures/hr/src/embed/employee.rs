use super::person::Person;
use rowmap_core::Entity;

#[derive(Debug, Clone, Default, PartialEq, Entity)]
pub struct Employee {
    #[extends]
    #[db = ",table=person"]
    pub person: Person,
    #[db = "company"]
    pub company: Option<String>,
}
