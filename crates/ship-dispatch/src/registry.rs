use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock},
};

use crate::Name;

/// The state-history endpoint a handler streams blocks from.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, derive_more::Display, serde::Serialize, serde::Deserialize,
)]
#[display("{host}:{port}")]
pub struct ConnectionEndpoint {
    /// Host name or address.
    pub host: String,
    /// Port, kept as text the way it was registered.
    pub port: String,
}

impl ConnectionEndpoint {
    /// Creates a new endpoint.
    pub fn new(host: impl Into<String>, port: impl Into<String>) -> Self {
        Self { host: host.into(), port: port.into() }
    }
}

/// Thread-safe mapping from handler name to the endpoint its sessions connect to.
///
/// Registration is last-write-wins and performs no reachability check.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<Name, ConnectionEndpoint>>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the endpoint for `id`.
    pub fn add_connection(&self, id: Name, host: impl Into<String>, port: impl Into<String>) {
        let endpoint = ConnectionEndpoint::new(host, port);
        let previous = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, endpoint.clone());
        match previous {
            Some(previous) => {
                tracing::debug!(handler = %id, %previous, %endpoint, "Replaced connection")
            }
            None => tracing::debug!(handler = %id, %endpoint, "Added connection"),
        }
    }

    /// Returns the endpoint registered for `id`.
    pub(crate) fn endpoint(&self, id: Name) -> Option<ConnectionEndpoint> {
        self.connections.read().unwrap_or_else(PoisonError::into_inner).get(&id).cloned()
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.connections.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use super::*;

    fn name(s: &str) -> Name {
        s.parse().unwrap()
    }

    #[test]
    fn test_last_write_wins() {
        let registry = ConnectionRegistry::new();
        registry.add_connection(name("h1"), "10.0.0.1", "9000");
        registry.add_connection(name("h1"), "10.0.0.2", "9001");

        assert_eq!(
            registry.endpoint(name("h1")),
            Some(ConnectionEndpoint::new("10.0.0.2", "9001"))
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_unknown_handler() {
        let registry = ConnectionRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.endpoint(name("nobody")), None);
    }

    #[test]
    fn test_concurrent_registration() {
        let registry = Arc::new(ConnectionRegistry::new());
        let handles: Vec<_> = (1..=5u32)
            .map(|i| {
                let registry = registry.clone();
                thread::spawn(move || {
                    registry.add_connection(name(&format!("h{i}")), "127.0.0.1", i.to_string())
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.len(), 5);
        assert_eq!(registry.endpoint(name("h3")).unwrap().to_string(), "127.0.0.1:3");
    }
}
