//! CLI subcommand implementations for the Pitchkit binary.

pub mod classify_cmd;
pub mod doctor;
pub mod extract_cmd;
pub mod output;
pub mod serve_cmd;

use crate::config::ExtractorConfig;
use crate::pipeline::Pipeline;
use crate::renderer::DisabledLauncher;
use std::sync::Arc;

/// Build the pipeline a command runs on. `no_browser` keeps it static-only.
pub fn build_pipeline(config: &ExtractorConfig, no_browser: bool) -> Pipeline {
    if no_browser {
        Pipeline::with_launcher(config, Arc::new(DisabledLauncher))
    } else {
        Pipeline::from_config(config)
    }
}
