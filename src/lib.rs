// Library exports for the vigil process watcher

pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod notify;
pub mod process;
pub mod state;

pub use context::Context;
pub use error::{Result, VigilError};
