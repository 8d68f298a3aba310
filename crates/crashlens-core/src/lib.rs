pub mod chunk;
pub mod config;
pub mod diff;
pub mod error;
pub mod io;
pub mod paths;
pub mod rca;
pub mod seed;
pub mod store;
pub mod types;

pub use error::{CrashLensError, Result};
