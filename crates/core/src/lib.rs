pub mod config;
pub mod error;
pub mod patch;
pub mod workload;

pub use config::Config;
pub use error::*;
pub use patch::*;
pub use workload::*;
