//! Test utilities for the dispatcher: a scripted transport, a recording block handler and wasm
//! handler fixtures.

mod handler;
mod transport;
mod wasm;

pub use handler::*;
pub use transport::*;
pub use wasm::*;
