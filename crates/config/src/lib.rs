//! User settings for the `tally` CLI.

pub mod settings;

pub use settings::Settings;
