pub mod clone;
pub mod completions;
pub mod create;
pub mod merge;
pub mod pull;
pub mod remove;
pub mod status;
pub mod update;
