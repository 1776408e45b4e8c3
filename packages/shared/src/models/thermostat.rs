use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Per-class thermostat configuration, stored at
/// `users/{uid}/thermostatSettings/{classId}`.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ThermostatSettings {
    pub class_id: String,
    #[serde(default)]
    pub target: i32,
    #[serde(default)]
    pub options: Map<String, Value>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl ThermostatSettings {
    pub fn new(class_id: &str, target: i32) -> Self {
        ThermostatSettings {
            class_id: class_id.to_string(),
            target,
            options: Map::new(),
            updated_at: Utc::now(),
        }
    }
}
