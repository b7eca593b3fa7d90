//! HTTP adapters: the inbound API and the outbound job registry client.

pub mod api;
pub mod registry;
