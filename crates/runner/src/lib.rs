pub mod config;
pub mod logging;
pub mod run;

pub use config::{Config, ConfigError, RunOptions};
pub use run::{run_once, RunReport};
