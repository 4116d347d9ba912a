use std::path::Path;

use serde::{Deserialize, Serialize};
use ship_dispatch::{HandlerSpec, SubscriptionConfig};

use super::ConnectionConfig;
use crate::Error;

/// Contents of a `serve` configuration file.
///
/// ```json
/// {
///   "subscription": { "startBlock": 100, "maxMessagesInFlight": 8 },
///   "connections": [{ "name": "indexer", "host": "127.0.0.1", "port": "8080" }],
///   "handlers": [{ "name": "indexer", "modulePath": "indexer.wasm", "writeContexts": ["tokens"] }]
/// }
/// ```
///
/// Relative module paths are resolved against the directory of the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonConfig {
    /// Block subscription every session issues.
    #[serde(default)]
    pub subscription: SubscriptionConfig,
    /// Endpoints to register.
    #[serde(default)]
    pub connections: Vec<ConnectionConfig>,
    /// Handlers to run.
    pub handlers: Vec<HandlerSpec>,
}

impl DaemonConfig {
    /// Reads the configuration at `path`.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let contents = std::fs::read_to_string(path)
            .map_err(|source| Error::ConfigRead { path: path.to_path_buf(), source })?;
        let mut config: Self = serde_json::from_str(&contents)
            .map_err(|source| Error::ConfigParse { path: path.to_path_buf(), source })?;

        if let Some(base) = path.parent() {
            for handler in &mut config.handlers {
                if handler.module_path.is_relative() {
                    handler.module_path = base.join(&handler.module_path);
                }
            }
        }
        Ok(config)
    }
}
