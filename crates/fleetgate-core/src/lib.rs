pub mod config;
pub mod types;

pub use config::FleetConfig;
pub use types::*;
