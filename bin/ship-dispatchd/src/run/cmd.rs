use std::path::PathBuf;

use clap::Parser;
use ship_dispatch::{Connector, Dispatcher, HandlerSpec, Name};

use super::{
    run_handler, ConnectionConfig, HandlerSummary, LogArgs, ReconnectArgs, StoreArgs,
    SubscriptionArgs,
};
use crate::Error;

/// Run a single handler configured from flags
#[derive(Parser, Debug)]
pub struct Cmd {
    /// Name of the handler. Selects the connection it streams from.
    #[arg(long = "name")]
    pub name: Name,

    /// Wasm module of the handler, in binary or text format
    #[arg(long = "wasm", value_name = "FILE")]
    pub wasm: PathBuf,

    /// Allow the handler to write to any context
    #[arg(long = "privileged")]
    pub privileged: bool,

    /// Argument passed to the handler. Repeat for more arguments.
    #[arg(long = "arg", value_name = "ARG", allow_hyphen_values = true)]
    pub args: Vec<String>,

    /// Context the handler may write to. Repeatable.
    #[arg(long = "write-context", value_name = "NAME")]
    pub write_contexts: Vec<Name>,

    /// Source the handler subscribes to. Repeatable.
    #[arg(long = "ship", value_name = "NAME")]
    pub ships: Vec<Name>,

    /// Function the module must export besides the entry point. Repeatable.
    #[arg(long = "handler", value_name = "EXPORT")]
    pub handler_names: Vec<String>,

    /// State-history endpoint of a handler. Repeatable. The handler streams from
    /// 127.0.0.1:8080 unless a connection is given for it.
    #[arg(long = "connection", value_name = "NAME=HOST:PORT")]
    pub connections: Vec<ConnectionConfig>,

    // Shared argument groups
    /// Block subscription configuration
    #[command(flatten)]
    pub subscription_args: SubscriptionArgs,

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

impl Cmd {
    /// Execute the run command
    pub fn run(&self) -> Result<(), Error> {
        self.log_args.init()?;
        let store = self.store_args.open()?;
        let dispatcher =
            Dispatcher::new(store)?.with_subscription(self.subscription_args.config());

        let summary = self.execute(&dispatcher)?;
        println!("{}", serde_json::to_string_pretty(&summary)?);
        Ok(())
    }

    /// Registers the connections and runs the handler on `dispatcher`.
    pub fn execute<C: Connector>(
        &self,
        dispatcher: &Dispatcher<C>,
    ) -> Result<HandlerSummary, Error> {
        for ConnectionConfig { name, endpoint } in self.resolved_connections() {
            dispatcher.add_connection(name, endpoint.host, endpoint.port);
        }
        Ok(run_handler(dispatcher, &self.spec(), &self.reconnect_args)?)
    }

    /// The handler described by the flags.
    pub fn spec(&self) -> HandlerSpec {
        HandlerSpec {
            name: self.name,
            module_path: self.wasm.clone(),
            privileged: self.privileged,
            args: self.args.clone(),
            write_contexts: self.write_contexts.clone(),
            subscribed_sources: self.ships.clone(),
            handler_names: self.handler_names.clone(),
        }
    }

    /// The given connections, plus the default endpoint for the handler if none names it.
    pub fn resolved_connections(&self) -> Vec<ConnectionConfig> {
        let mut connections = self.connections.clone();
        if !connections.iter().any(|connection| connection.name == self.name) {
            connections.push(ConnectionConfig::default_for(self.name));
        }
        connections
    }
}
