//! Configuration management for screen-shield
//!
//! Settings are a flat JSON object in the user's config directory, merged with
//! defaults on load and written back on every change.

pub mod settings;

pub use settings::Settings;
