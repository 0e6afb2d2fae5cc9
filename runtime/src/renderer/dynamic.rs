//! Dynamic rendering: load a URL in a shared-browser tab and return the
//! hydrated HTML.

use super::blocklist::BlockPolicy;
use super::{NavigateOptions, RenderContext};
use crate::config::RenderSettings;
use crate::pool::manager::BrowserManager;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Landmarks that usually wrap the main content once a page has hydrated.
pub const CONTENT_LANDMARKS: &str = r#"main, article, [role="main"], #content, .content"#;

/// Why a dynamic render produced no HTML.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The shared browser could not be started at all.
    #[error("browser launch failed: {0:#}")]
    Launch(anyhow::Error),
    /// A tab could not be opened on the shared browser.
    #[error("failed to open page: {0:#}")]
    Page(anyhow::Error),
    /// Navigation, interception or content retrieval failed.
    #[error("{0:#}")]
    Navigation(anyhow::Error),
}

impl RenderError {
    /// Whether the browser itself is unavailable, as opposed to one page failing.
    pub fn is_launch_failure(&self) -> bool {
        matches!(self, Self::Launch(_))
    }
}

async fn bounded<T>(
    timeout_ms: u64,
    what: &str,
    fut: impl Future<Output = anyhow::Result<T>>,
) -> anyhow::Result<T> {
    match tokio::time::timeout(Duration::from_millis(timeout_ms), fut).await {
        Ok(result) => result,
        Err(_) => anyhow::bail!("{what} timed out after {timeout_ms}ms"),
    }
}

/// Renders pages on the browser held by a [`BrowserManager`].
pub struct DynamicRenderer {
    manager: Arc<BrowserManager>,
    settings: RenderSettings,
    policy: Arc<BlockPolicy>,
}

impl DynamicRenderer {
    pub fn new(manager: Arc<BrowserManager>, settings: RenderSettings) -> Self {
        Self {
            manager,
            settings,
            policy: Arc::new(BlockPolicy::default()),
        }
    }

    pub fn manager(&self) -> &Arc<BrowserManager> {
        &self.manager
    }

    /// Load `url` in a fresh tab on the shared browser and return the HTML
    /// as it stands once the network settles and content had a moment to
    /// hydrate.
    ///
    /// The tab is closed whatever happened; a close failure is logged and
    /// never replaces the render outcome. A browser that cannot open a tab,
    /// or that lost its connection during the render, is handed back to the
    /// manager so the next render relaunches it.
    pub async fn render(&self, url: &str) -> Result<String, RenderError> {
        let browser = self
            .manager
            .acquire_browser()
            .await
            .map_err(RenderError::Launch)?;

        let mut page = match self.step("opening a tab", browser.new_context()).await {
            Ok(page) => page,
            Err(e) => {
                self.manager.invalidate(&browser).await;
                return Err(RenderError::Page(e));
            }
        };

        let outcome = self.drive(page.as_mut(), url).await;

        if let Err(e) = self.step("closing the tab", page.close()).await {
            debug!("page close failed for {url}: {e:#}");
        }

        if outcome.is_err() && !browser.is_connected() {
            self.manager.invalidate(&browser).await;
        }

        outcome.map_err(RenderError::Navigation)
    }

    async fn drive(&self, page: &mut dyn RenderContext, url: &str) -> anyhow::Result<String> {
        self.step("setting the user agent", page.set_user_agent(&self.settings.user_agent))
            .await?;
        self.step(
            "enabling request interception",
            page.block_requests(Arc::clone(&self.policy)),
        )
        .await?;

        let options = NavigateOptions {
            timeout_ms: self.settings.navigation_timeout_ms,
            idle_max_inflight: self.settings.idle_max_inflight,
            idle_quiet_ms: self.settings.idle_quiet_ms,
        };
        // The context enforces `timeout_ms` itself; this outer cap also
        // covers reading the final URL afterwards.
        let nav = bounded(
            self.settings.navigation_timeout_ms + self.settings.step_timeout_ms,
            "navigation",
            page.navigate(url, options),
        )
        .await?;
        info!("rendered {url} in {}ms", nav.load_time_ms);

        self.nudge_hydration(page).await;

        self.step("reading the page HTML", page.get_html()).await
    }

    async fn step<T>(
        &self,
        what: &str,
        fut: impl Future<Output = anyhow::Result<T>>,
    ) -> anyhow::Result<T> {
        bounded(self.settings.step_timeout_ms, what, fut).await
    }

    /// Give slow-hydrating content a moment: whichever finishes first of a
    /// landmark wait and a fixed delay. The loser is dropped.
    async fn nudge_hydration(&self, page: &dyn RenderContext) {
        let landmark = page.wait_for_selector(CONTENT_LANDMARKS, self.settings.landmark_wait_ms);
        let delay = tokio::time::sleep(Duration::from_millis(self.settings.fallback_delay_ms));

        tokio::select! {
            found = landmark => match found {
                Ok(true) => debug!("content landmark present"),
                Ok(false) => debug!("no content landmark"),
                Err(e) => debug!("landmark wait failed: {e:#}"),
            },
            _ = delay => debug!("landmark wait outlasted fallback delay"),
        }
    }
}
