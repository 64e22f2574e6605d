/*
[INPUT]:  Public API exports for the contriblock-cli crate
[OUTPUT]: Module declarations and public re-exports
[POS]:    Crate root - library entry point
[UPDATE]: When adding new modules or public exports
*/

pub mod app;
pub mod config;

pub use app::App;
pub use config::CliConfig;
