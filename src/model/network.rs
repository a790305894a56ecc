//! Network configuration records (spec §3 "Network configuration").

use serde_json::Map as JsonMap;

/// A user-defined network's configuration (the `networks` map-level
/// section).
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    pub driver: String,
    pub driver_options: JsonMap<String, serde_json::Value>,
    pub internal: bool,
    pub create_options: JsonMap<String, serde_json::Value>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            driver: "bridge".to_string(),
            driver_options: JsonMap::new(),
            internal: false,
            create_options: JsonMap::new(),
        }
    }
}
