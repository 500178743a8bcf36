use crate::embed::employee;
use rowmap_core::Entity;

#[derive(Debug, Clone, Default, PartialEq, Entity)]
pub struct Manager {
    #[extends]
    #[db = ",table=employee"]
    pub employee: employee::Employee,
    #[db = "title"]
    pub title: Option<String>,
}
