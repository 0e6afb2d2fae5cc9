//! Shared browser manager.
//!
//! Owns at most one live browser per process and hands it to every render.
//! Launching is expensive, so the handle is created lazily and reused; it is
//! re-validated on each acquisition and relaunched after a crash.

use crate::renderer::{BrowserLauncher, Renderer};
use anyhow::Result;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Lazily-launched, process-wide browser handle.
pub struct BrowserManager {
    launcher: Arc<dyn BrowserLauncher>,
    /// Held across the launch await so concurrent callers queue behind one
    /// launch instead of starting their own.
    current: Mutex<Option<Arc<dyn Renderer>>>,
    launches: AtomicUsize,
}

impl BrowserManager {
    /// Create a manager. No browser is started until the first acquisition.
    pub fn new(launcher: Arc<dyn BrowserLauncher>) -> Self {
        Self {
            launcher,
            current: Mutex::new(None),
            launches: AtomicUsize::new(0),
        }
    }

    /// Return the live browser, launching one if none is cached or the cached
    /// one has disconnected.
    ///
    /// A failed launch leaves nothing cached; the next call tries again.
    pub async fn acquire_browser(&self) -> Result<Arc<dyn Renderer>> {
        let mut slot = self.current.lock().await;

        if let Some(browser) = slot.as_ref() {
            if browser.is_connected() {
                debug!("reusing shared browser");
                return Ok(Arc::clone(browser));
            }
            warn!("shared browser disconnected, relaunching");
            *slot = None;
        }

        self.launches.fetch_add(1, Ordering::SeqCst);
        let browser = self.launcher.launch().await?;
        info!("shared browser ready");
        *slot = Some(Arc::clone(&browser));
        Ok(browser)
    }

    /// Drop the cached handle if it is the one given (it failed mid-render).
    ///
    /// A handle that was already replaced by a relaunch is left alone.
    pub async fn invalidate(&self, failed: &Arc<dyn Renderer>) {
        let mut slot = self.current.lock().await;
        if slot
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, failed))
        {
            debug!("invalidating shared browser");
            *slot = None;
        }
    }

    /// Whether a connected browser is currently cached.
    pub async fn is_warm(&self) -> bool {
        self.current
            .lock()
            .await
            .as_ref()
            .is_some_and(|b| b.is_connected())
    }

    /// Number of launches attempted over the manager's lifetime.
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    /// Shut down and forget the cached browser.
    pub async fn shutdown(&self) -> Result<()> {
        let browser = self.current.lock().await.take();
        if let Some(browser) = browser {
            info!("shutting down shared browser");
            browser.shutdown().await?;
        }
        Ok(())
    }
}
