//! Host-facing render script: configuration and per-frame orchestration.

pub mod config;
pub mod render_script;

pub use config::ScriptConfig;
pub use render_script::{RenderScript, STATUS_INVALID, ScriptState};
