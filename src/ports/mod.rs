//! Ports - trait definitions for every external collaborator.

pub mod media;
pub mod registry;
pub mod speech;
pub mod storage;
