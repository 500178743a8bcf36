//! Enhancer configuration.
//!
//! A config file lists the entities to enhance:
//!
//! ```json
//! {"entityenhancer": [{"entity": "Manager", "table": "manager"}]}
//! ```

use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::io;
use std::path::Path;

#[derive(Debug)]
pub enum ConfigError {
    Io(io::Error),
    Parse(serde_json::Error),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read config: {err}"),
            Self::Parse(err) => write!(f, "invalid config: {err}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
        }
    }
}

impl From<io::Error> for ConfigError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// One entity to enhance and the table it maps.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EntityOption {
    pub entity: String,
    pub table: String,
}

impl EntityOption {
    pub fn new(entity: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            table: table.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub entityenhancer: Vec<EntityOption>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Adds `option`, replacing an earlier entry for the same entity.
    pub fn push(&mut self, option: EntityOption) {
        self.entityenhancer
            .retain(|existing| existing.entity != option.entity);
        self.entityenhancer.push(option);
    }

    pub fn entity_option(&self, entity: &str) -> Option<&EntityOption> {
        self.entityenhancer
            .iter()
            .find(|option| option.entity == entity)
    }

    pub fn is_empty(&self) -> bool {
        self.entityenhancer.is_empty()
    }
}
