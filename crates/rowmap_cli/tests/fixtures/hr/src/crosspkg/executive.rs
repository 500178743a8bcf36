use crate::embed::manager::Manager as Boss;
use rowmap_core::Entity;

#[derive(Debug, Clone, Default, PartialEq, Entity)]
pub struct Executive {
    #[extends]
    #[db = ",table=manager"]
    pub manager: Boss,
    #[db = "level"]
    pub level: Option<i64>,
}
