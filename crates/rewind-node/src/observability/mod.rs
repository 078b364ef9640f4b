//! Logging setup for the node.

mod logging;

pub use logging::{init_logging, LogFormat};
