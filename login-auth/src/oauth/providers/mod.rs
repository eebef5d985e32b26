//! Provider presets and their identity parsers.

pub mod github;
pub mod google;
pub mod standard;
