//! Renderer abstraction for browser-based page rendering.
//!
//! Defines the `BrowserLauncher`, `Renderer` and `RenderContext` traits that
//! abstract over the browser engine (currently Chromium via chromiumoxide),
//! so the browser manager and the dynamic renderer can be driven by test
//! doubles.

pub mod blocklist;
pub mod chromium;
pub mod dynamic;

use anyhow::Result;
use async_trait::async_trait;
use blocklist::BlockPolicy;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Time taken until the network settled, in milliseconds.
    pub load_time_ms: u64,
}

/// How long to wait for a navigation and what counts as settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigateOptions {
    /// Hard cap covering load and the network-settle wait.
    pub timeout_ms: u64,
    /// Settled means at most this many requests in flight...
    pub idle_max_inflight: usize,
    /// ...for at least this long.
    pub idle_quiet_ms: u64,
}

/// Starts a browser process.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Launch a fresh browser. Expensive; the manager calls this rarely.
    async fn launch(&self) -> Result<Arc<dyn Renderer>>;
}

/// A live browser that can open tabs.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Create a new browser context (tab).
    async fn new_context(&self) -> Result<Box<dyn RenderContext>>;
    /// Whether the connection to the browser process is still alive.
    fn is_connected(&self) -> bool;
    /// Shut down the browser engine.
    async fn shutdown(&self) -> Result<()>;
    /// Number of currently open contexts.
    fn active_contexts(&self) -> usize;
}

/// A single browser context (tab) for rendering pages.
#[async_trait]
pub trait RenderContext: Send + Sync {
    /// Override the user-agent string for this tab.
    async fn set_user_agent(&mut self, user_agent: &str) -> Result<()>;
    /// Intercept every request from this tab and apply `policy`.
    async fn block_requests(&mut self, policy: Arc<BlockPolicy>) -> Result<()>;
    /// Navigate and wait for the network to settle.
    async fn navigate(&mut self, url: &str, options: NavigateOptions) -> Result<NavigationResult>;
    /// Poll for an element matching `selector`. `Ok(false)` on timeout.
    async fn wait_for_selector(&self, selector: &str, timeout_ms: u64) -> Result<bool>;
    /// Get the full page HTML.
    async fn get_html(&self) -> Result<String>;
    /// Close this context.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Launcher used when rendering is switched off.
///
/// Every launch fails, so the pipeline runs on static HTML only.
pub struct DisabledLauncher;

#[async_trait]
impl BrowserLauncher for DisabledLauncher {
    async fn launch(&self) -> Result<Arc<dyn Renderer>> {
        Err(anyhow::anyhow!("browser rendering disabled (static-only mode)"))
    }
}
