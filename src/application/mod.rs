//! Application layer - services that drive the ports.

pub mod dispatcher;
pub mod encode;
pub mod fanout;
pub mod gateway;
pub mod packager;
pub mod pipeline;
pub mod reporter;
pub mod subtitles;
