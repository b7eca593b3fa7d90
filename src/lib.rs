//! vodpipe - media transcode and subtitle pipeline
//!
//! Hexagonal Architecture:
//! - domain/: Pure data and text logic (jobs, hls)
//! - ports/: Trait definitions for external collaborators
//! - adapters/: Concrete implementations (S3, local fs, ffmpeg, OpenAI, HTTP)
//! - application/: Services driving the ports (fan-out, packaging, subtitles, dispatcher)
//! - config: Environment configuration
//! - error: Shared error type

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod ports;

#[cfg(test)]
mod testing;

pub use config::AppConfig;
pub use error::{PipelineError, PipelineResult};
