use alloy_primitives::Bytes;

use crate::{BlockHandler, ExecutionTrap, Name, StoreError};

/// A [`BlockHandler`] that records what the session asks of it.
///
/// Invoking it traps when the loaded payload starts with `!`.
#[derive(Debug)]
pub struct RecordingHandler {
    /// Identity reported to the session.
    pub name: Name,
    /// Payload of every invocation, in order.
    pub invoked: Vec<Bytes>,
    /// Number of commits.
    pub commits: usize,
    /// Number of resets.
    pub resets: usize,
    /// The payload currently loaded.
    pub loaded: Option<Bytes>,
}

impl Default for RecordingHandler {
    fn default() -> Self {
        Self {
            name: "recorder".parse().unwrap(),
            invoked: Vec::new(),
            commits: 0,
            resets: 0,
            loaded: None,
        }
    }
}

impl BlockHandler for RecordingHandler {
    fn name(&self) -> Name {
        self.name
    }

    fn reset(&mut self) {
        self.resets += 1;
        self.loaded = None;
    }

    fn load(&mut self, payload: Bytes) {
        self.loaded = Some(payload);
    }

    fn invoke(&mut self) -> Result<(), ExecutionTrap> {
        let payload = self.loaded.clone().unwrap_or_default();
        self.invoked.push(payload.clone());
        if payload.starts_with(b"!") {
            return Err(ExecutionTrap {
                handler: self.name,
                entry_point: "start".to_string(),
                block_num: None,
                reason: "payload starts with `!`".to_string(),
            });
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<(), StoreError> {
        self.commits += 1;
        self.loaded = None;
        Ok(())
    }
}
