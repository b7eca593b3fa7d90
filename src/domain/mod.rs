//! Domain layer - Pure business logic.

// Adaptive streaming ladder and manifests
pub mod hls;

// Job definitions exchanged with the registry
pub mod jobs;
