use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandType {
    Text,
    Alias,
    Module,
    Addon,
}

impl FromStr for CommandType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(CommandType::Text),
            "alias" => Ok(CommandType::Alias),
            "module" => Ok(CommandType::Module),
            "addon" => Ok(CommandType::Addon),
            _ => Err(format!("Unknown command type: {}", s)),
        }
    }
}

/// A chat command as persisted by the storage collaborator. Only `text` and
/// `alias` commands can be stored; callables are registered in code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredCommand {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub content: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}
