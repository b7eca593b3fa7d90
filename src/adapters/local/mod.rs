//! Local adapters for development deployments.

pub mod fs;

pub use fs::FsAdapter;
