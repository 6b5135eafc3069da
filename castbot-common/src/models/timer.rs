use serde::{Deserialize, Serialize};

/// Recurring announcement or command as configured for a channel.
/// `interval` is expressed in minutes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimerDefinition {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub interval: Option<f64>,
    #[serde(default)]
    pub sequential: bool,
}
