use std::{thread, time::Duration};

use clap::Parser;
use ship_dispatch::{Connector, DispatchError, Dispatcher, HandlerSpec};

use super::HandlerSummary;

/// Reconnect policy arguments
#[derive(Parser, Debug, Clone, Default)]
pub struct ReconnectArgs {
    /// Re-create a session that closed abruptly or lost its connection
    #[arg(long = "reconnect")]
    pub reconnect: bool,

    /// Delay before re-creating a session, in milliseconds
    #[arg(long = "reconnect.delay-ms", default_value = "1000")]
    pub delay_ms: u64,

    /// Maximum number of sessions per handler, the first one included. Unlimited if not
    /// specified.
    #[arg(long = "reconnect.max-attempts")]
    pub max_attempts: Option<u32>,
}

impl ReconnectArgs {
    /// Delay before re-creating a session.
    pub const fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Whether another session may follow `sessions` sessions that ended with the given retry
    /// hint.
    pub fn should_retry(&self, retry: bool, sessions: u32) -> bool {
        self.reconnect && retry && self.max_attempts.is_none_or(|max| sessions < max)
    }
}

/// Runs `spec` until its session ends for good.
///
/// A session that closes with the retry hint, or fails with a retryable error, is re-created
/// when the policy allows it. Traps, protocol violations, store failures and configuration
/// errors always end the handler.
pub fn run_handler<C: Connector>(
    dispatcher: &Dispatcher<C>,
    spec: &HandlerSpec,
    reconnect: &ReconnectArgs,
) -> Result<HandlerSummary, DispatchError> {
    let handler = spec.name;
    let mut summary = HandlerSummary::new(handler);
    loop {
        summary.sessions += 1;
        let result = dispatcher.create(spec);
        let retry = match &result {
            Ok(outcome) => {
                summary.record(outcome);
                outcome.retry
            }
            Err(err) => err.is_retryable(),
        };
        if !reconnect.should_retry(retry, summary.sessions) {
            return result.map(|_| summary);
        }

        match result {
            Ok(outcome) => tracing::warn!(
                %handler,
                blocks = outcome.blocks_processed,
                delay_ms = reconnect.delay_ms,
                "Session closed abruptly, reconnecting"
            ),
            Err(err) => {
                tracing::warn!(%handler, %err, delay_ms = reconnect.delay_ms, "Reconnecting")
            }
        }
        thread::sleep(reconnect.delay());
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ship_dispatch::{
        test_utils::{
            blocks_event, recording_handler_wat, status_event, write_module, MockConnector,
            MockRemote,
        },
        ConnectionEndpoint, MemoryStore, Name,
    };
    use tempfile::TempDir;

    use super::*;

    fn ctx() -> Name {
        "ctx".parse().unwrap()
    }

    fn setup() -> (TempDir, Dispatcher<MockConnector>, HandlerSpec, MockRemote) {
        let dir = tempfile::tempdir().unwrap();
        let module = write_module(dir.path(), "recording.wat", &recording_handler_wat(ctx()));
        let store = Arc::new(MemoryStore::new());
        let dispatcher = Dispatcher::with_connector(store, MockConnector::new()).unwrap();
        let name: Name = "h1".parse().unwrap();
        dispatcher.add_connection(name, "127.0.0.1", "8080");
        let remote = dispatcher.connector().remote(&ConnectionEndpoint::new("127.0.0.1", "8080"));
        remote.handshake();
        remote.send(status_event(10));
        remote.send(blocks_event(1, b"B0"));
        let spec = HandlerSpec::new(name, module).with_write_contexts([ctx()]);
        (dir, dispatcher, spec, remote)
    }

    fn policy(reconnect: bool) -> ReconnectArgs {
        ReconnectArgs { reconnect, delay_ms: 0, max_attempts: Some(3) }
    }

    #[test]
    fn test_should_retry() {
        let args = policy(true);
        assert!(args.should_retry(true, 2));
        assert!(!args.should_retry(true, 3));
        assert!(!args.should_retry(false, 1));
        assert!(!policy(false).should_retry(true, 1));
        let unlimited = ReconnectArgs { max_attempts: None, ..policy(true) };
        assert!(unlimited.should_retry(true, u32::MAX - 1));
    }

    #[test]
    fn test_abrupt_close_without_reconnect() {
        let (_dir, dispatcher, spec, remote) = setup();
        drop(remote);

        let summary = run_handler(&dispatcher, &spec, &policy(false)).unwrap();

        assert_eq!(summary.sessions, 1);
        assert_eq!(summary.blocks_processed, 1);
        assert_eq!(summary.last_block, Some(1));
    }

    #[test]
    fn test_reconnects_until_attempts_exhausted() {
        let (_dir, dispatcher, spec, remote) = setup();
        drop(remote);

        // The first session ends abruptly; later connections are refused.
        let err = run_handler(&dispatcher, &spec, &policy(true)).unwrap_err();

        assert!(matches!(err, DispatchError::Connection(_)), "{err:?}");
        assert_eq!(dispatcher.connector().connections().len(), 3);
    }

    #[test]
    fn test_clean_close_is_final() {
        let (_dir, dispatcher, spec, remote) = setup();
        remote.close(false);

        let summary = run_handler(&dispatcher, &spec, &policy(true)).unwrap();

        assert_eq!(summary.sessions, 1);
        assert_eq!(dispatcher.connector().connections().len(), 1);
    }

    #[test]
    fn test_trap_is_not_retried() {
        let (_dir, dispatcher, spec, remote) = setup();
        remote.send(blocks_event(2, b"!B1"));

        let err = run_handler(&dispatcher, &spec, &policy(true)).unwrap_err();

        assert!(matches!(err, DispatchError::Trap(_)), "{err:?}");
        assert_eq!(dispatcher.connector().connections().len(), 1);
    }
}
