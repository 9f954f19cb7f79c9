pub mod cli;
pub mod config;
pub mod errors;
pub mod git;
pub mod utils;
pub mod workflow;

pub use errors::GitumError;
pub use workflow::Gitum;
