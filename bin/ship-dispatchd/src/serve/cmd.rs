use std::{path::PathBuf, thread};

use clap::Parser;
use ship_dispatch::{Connector, DispatchError, Dispatcher, Name};

use super::{run_handler, DaemonConfig, HandlerSummary, LogArgs, ReconnectArgs, StoreArgs};
use crate::Error;

/// Run every handler listed in a configuration file
#[derive(Parser, Debug)]
pub struct Cmd {
    /// JSON file listing connections and handlers
    #[arg(long = "config", value_name = "FILE")]
    pub config: PathBuf,

    /// Run handler sessions concurrently instead of one at a time
    #[arg(long = "concurrent")]
    pub concurrent: bool,

    // Shared argument groups
    /// Store configuration
    #[command(flatten)]
    pub store_args: StoreArgs,

    /// Reconnect policy
    #[command(flatten)]
    pub reconnect_args: ReconnectArgs,

    /// Logging configuration
    #[command(flatten)]
    pub log_args: LogArgs,
}

/// How one handler run by `serve` ended.
pub type HandlerResult = (Name, Result<HandlerSummary, DispatchError>);

impl Cmd {
    /// Execute the serve command
    pub fn run(&self) -> Result<(), Error> {
        self.log_args.init()?;
        let config = DaemonConfig::load(&self.config)?;
        let store = self.store_args.open()?;
        let dispatcher = Dispatcher::new(store)?
            .with_subscription(config.subscription.clone())
            .with_serialized_sessions(!self.concurrent);

        let results = serve(&config, &dispatcher, &self.reconnect_args)?;

        let total = results.len();
        let mut failed = 0;
        for (handler, result) in results {
            match result {
                Ok(summary) => println!("{}", serde_json::to_string(&summary)?),
                Err(err) => {
                    tracing::error!(%handler, %err, "Handler failed");
                    eprintln!("handler {handler} failed: {err}");
                    failed += 1;
                }
            }
        }
        if failed > 0 {
            return Err(Error::HandlersFailed { failed, total });
        }
        Ok(())
    }
}

/// Registers the configured connections and runs every handler on its own thread.
///
/// All threads share `dispatcher`. Unless it was built with serialization lifted, handlers take
/// turns, each holding the dispatcher until its session ends. Returns once every handler has
/// stopped, with the results in configuration order.
pub fn serve<C: Connector + Sync>(
    config: &DaemonConfig,
    dispatcher: &Dispatcher<C>,
    reconnect: &ReconnectArgs,
) -> Result<Vec<HandlerResult>, Error> {
    for connection in &config.connections {
        let endpoint = connection.endpoint.clone();
        dispatcher.add_connection(connection.name, endpoint.host, endpoint.port);
    }

    thread::scope(|scope| -> Result<Vec<HandlerResult>, Error> {
        let mut workers = Vec::with_capacity(config.handlers.len());
        for spec in &config.handlers {
            let worker = thread::Builder::new()
                .name(format!("handler-{}", spec.name))
                .spawn_scoped(scope, move || run_handler(dispatcher, spec, reconnect))
                .map_err(Error::Spawn)?;
            workers.push((spec.name, worker));
        }

        let mut results = Vec::with_capacity(workers.len());
        for (handler, worker) in workers {
            // The panic hook exits the process before a panicked worker could be joined.
            if let Ok(result) = worker.join() {
                results.push((handler, result));
            }
        }
        Ok(results)
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ship_dispatch::{
        test_utils::{
            blocks_event, recording_handler_wat, status_event, write_module, MockConnector,
        },
        ConfigError, ConnectionEndpoint, HandlerSpec, KvStore, MemoryStore,
    };

    use super::*;
    use crate::common::ConnectionConfig;

    fn name(s: &str) -> Name {
        s.parse().unwrap()
    }

    #[test]
    fn test_serve_runs_every_handler() {
        let dir = tempfile::tempdir().unwrap();
        let (ctx1, ctx2) = (name("ctx1"), name("ctx2"));
        let module1 = write_module(dir.path(), "h1.wat", &recording_handler_wat(ctx1));
        let module2 = write_module(dir.path(), "h2.wat", &recording_handler_wat(ctx2));
        let config = DaemonConfig {
            subscription: Default::default(),
            connections: vec![
                ConnectionConfig {
                    name: name("h1"),
                    endpoint: ConnectionEndpoint::new("10.0.0.1", "8080"),
                },
                ConnectionConfig {
                    name: name("h2"),
                    endpoint: ConnectionEndpoint::new("10.0.0.2", "8080"),
                },
            ],
            handlers: vec![
                HandlerSpec::new(name("h1"), module1).with_write_contexts([ctx1]),
                HandlerSpec::new(name("h2"), module2).with_write_contexts([ctx2]),
                HandlerSpec::new(name("h3"), dir.path().join("missing.wasm")),
            ],
        };

        let store = Arc::new(MemoryStore::new());
        let dispatcher = Dispatcher::with_connector(store.clone(), MockConnector::new()).unwrap();
        for (host, payload) in [("10.0.0.1", b"A0"), ("10.0.0.2", b"B0")] {
            let remote = dispatcher.connector().remote(&ConnectionEndpoint::new(host, "8080"));
            remote.handshake();
            remote.send(status_event(10));
            remote.send(blocks_event(1, payload));
            remote.close(false);
        }

        let results = serve(&config, &dispatcher, &ReconnectArgs::default()).unwrap();

        let handlers: Vec<_> = results.iter().map(|(handler, _)| *handler).collect();
        assert_eq!(handlers, [name("h1"), name("h2"), name("h3")]);
        assert_eq!(results[0].1.as_ref().unwrap().blocks_processed, 1);
        assert_eq!(results[1].1.as_ref().unwrap().blocks_processed, 1);
        assert!(matches!(
            results[2].1,
            Err(DispatchError::Config(ConfigError::ModuleLoad { .. }))
        ));
        assert!(store.get(ctx1, b"A0").unwrap().is_some());
        assert!(store.get(ctx2, b"B0").unwrap().is_some());
        assert_eq!(store.commit_count(), 2);
    }
}
