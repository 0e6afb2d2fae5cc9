//! `pitchkit serve`: run the REST API in the foreground.

use crate::config::ExtractorConfig;
use crate::rest::{self, AppState};
use anyhow::Result;
use std::sync::Arc;
use tracing::info;

/// Run the serve command until Ctrl-C.
pub async fn run(port: u16, config: &ExtractorConfig, no_browser: bool) -> Result<()> {
    info!(
        "starting Pitchkit v{} ({:?} mode{})",
        env!("CARGO_PKG_VERSION"),
        config.deploy_mode,
        if no_browser { ", static only" } else { "" }
    );
    let state = Arc::new(AppState::new(super::build_pipeline(config, no_browser)));
    rest::start(port, state).await
}
