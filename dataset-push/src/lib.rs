pub mod candidates;
pub mod cli;
pub mod load_config;

pub use cli::{run, Cli, Commands};
