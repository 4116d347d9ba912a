mod connection;
mod logging;
mod outcome;
mod reconnect;
mod store;
mod subscription;

pub use connection::*;
pub use logging::*;
pub use outcome::*;
pub use reconnect::*;
pub use store::*;
pub use subscription::*;
