pub mod cli;
pub mod study;

pub use cli::{build_cli_command, Cli, Commands};
pub use study::Study;
