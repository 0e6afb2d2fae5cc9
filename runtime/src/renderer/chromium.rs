//! Chromium-based renderer using chromiumoxide.

use super::blocklist::{BlockPolicy, RequestDecision, ResourceKind};
use super::{BrowserLauncher, NavigateOptions, NavigationResult, RenderContext, Renderer};
use crate::config::{DeployMode, ExtractorConfig};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::error::CdpError;
use chromiumoxide::handler::Handler;
use chromiumoxide::cdp::browser_protocol::fetch::{
    self, ContinueRequestParams, EventRequestPaused, FailRequestParams, RequestPattern,
};
use chromiumoxide::cdp::browser_protocol::network::{
    ErrorReason, EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent, ResourceType,
};
use chromiumoxide::page::Page;
use dashmap::DashSet;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Flags for a full local Chromium.
const LOCAL_ARGS: &[&str] = &[
    "--headless=new",
    "--disable-gpu",
    "--no-sandbox",
    "--disable-dev-shm-usage",
    "--disable-extensions",
    "--disable-background-networking",
];

/// Flags for a headless shell on a constrained function host.
const SERVERLESS_ARGS: &[&str] = &[
    "--disable-gpu",
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-dev-shm-usage",
    "--disable-software-rasterizer",
    "--single-process",
    "--no-zygote",
    "--disable-extensions",
    "--disable-background-networking",
    "--no-first-run",
    "--mute-audio",
    "--hide-scrollbars",
];

/// Launch flags for a deployment mode.
pub fn launch_args(mode: DeployMode) -> &'static [&'static str] {
    match mode {
        DeployMode::Local => LOCAL_ARGS,
        DeployMode::Serverless => SERVERLESS_ARGS,
    }
}

/// Find a full Chromium/Chrome binary on this machine.
pub fn find_chromium() -> Option<PathBuf> {
    // 1. ~/.pitchkit/chromium/
    if let Some(home) = dirs::home_dir() {
        let candidates = if cfg!(target_os = "macos") {
            vec![
                home.join(".pitchkit/chromium/chrome-mac-arm64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".pitchkit/chromium/chrome-mac-x64/Google Chrome for Testing.app/Contents/MacOS/Google Chrome for Testing"),
                home.join(".pitchkit/chromium/chrome"),
            ]
        } else {
            vec![
                home.join(".pitchkit/chromium/chrome-linux64/chrome"),
                home.join(".pitchkit/chromium/chrome"),
            ]
        };
        if let Some(found) = candidates.into_iter().find(|c| c.exists()) {
            return Some(found);
        }
    }

    // 2. System PATH
    for name in ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
        if let Ok(path) = which::which(name) {
            return Some(path);
        }
    }

    // 3. Common macOS location
    if cfg!(target_os = "macos") {
        let common = PathBuf::from("/Applications/Google Chrome.app/Contents/MacOS/Google Chrome");
        if common.exists() {
            return Some(common);
        }
    }

    None
}

/// Find a lightweight headless shell, falling back to a full Chromium.
pub fn find_headless_shell() -> Option<PathBuf> {
    let bundled = [
        "/opt/chromium/chrome-headless-shell",
        "/opt/chrome/chrome-headless-shell",
        "/opt/chromium/chromium",
    ];
    if let Some(found) = bundled.iter().map(PathBuf::from).find(|p| p.exists()) {
        return Some(found);
    }
    if let Ok(path) = which::which("chrome-headless-shell") {
        return Some(path);
    }
    find_chromium()
}

/// Builds Chromium instances for one deployment mode.
pub struct ChromiumLauncher {
    mode: DeployMode,
    explicit_path: Option<PathBuf>,
    remote_ws_url: Option<String>,
}

impl ChromiumLauncher {
    pub fn new(mode: DeployMode, explicit_path: Option<PathBuf>) -> Self {
        Self {
            mode,
            explicit_path,
            remote_ws_url: None,
        }
    }

    pub fn from_config(config: &ExtractorConfig) -> Self {
        Self::new(config.deploy_mode, config.chromium_path.clone())
            .with_remote(config.browser_ws_url.clone())
    }

    /// Attach to an already running browser instead of spawning one.
    pub fn with_remote(mut self, ws_url: Option<String>) -> Self {
        self.remote_ws_url = ws_url;
        self
    }

    pub fn remote(&self) -> Option<&str> {
        self.remote_ws_url.as_deref()
    }

    /// Resolve the binary this launcher would start.
    pub fn executable(&self) -> Option<PathBuf> {
        if let Some(path) = &self.explicit_path {
            return Some(path.clone());
        }
        match self.mode {
            DeployMode::Local => find_chromium(),
            DeployMode::Serverless => find_headless_shell(),
        }
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Arc<dyn Renderer>> {
        if let Some(ws_url) = &self.remote_ws_url {
            let renderer = ChromiumRenderer::connect(ws_url, Heartbeat::default()).await?;
            info!("attached to remote browser at {ws_url}");
            return Ok(Arc::new(renderer));
        }

        let executable = self
            .executable()
            .context("Chromium not found. Set PITCHKIT_CHROMIUM_PATH or install Chrome.")?;
        let renderer = ChromiumRenderer::launch(&executable, launch_args(self.mode)).await?;
        info!(
            "launched {:?} browser from {}",
            self.mode,
            executable.display()
        );
        Ok(Arc::new(renderer))
    }
}

/// How often a live browser is asked for its version, and how long it may
/// take to answer before it is considered gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for Heartbeat {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(3),
        }
    }
}

/// Handler errors after which the CDP socket is unusable.
fn is_connection_loss(error: &CdpError) -> bool {
    matches!(
        error,
        CdpError::Ws(_) | CdpError::Io(_) | CdpError::ChannelSendError(_)
    )
}

/// Chromium-based renderer.
pub struct ChromiumRenderer {
    browser: Arc<RwLock<Browser>>,
    connected: Arc<AtomicBool>,
    active_count: Arc<AtomicUsize>,
    handler_task: JoinHandle<()>,
    heartbeat_task: JoinHandle<()>,
}

impl ChromiumRenderer {
    /// Launch a headless Chromium instance.
    pub async fn launch(executable: &Path, args: &[&str]) -> Result<Self> {
        let mut builder = BrowserConfig::builder().chrome_executable(executable);
        for arg in args {
            builder = builder.arg(*arg);
        }
        let config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build browser config: {e}"))?;

        let (browser, handler) = Browser::launch(config)
            .await
            .context("failed to launch Chromium")?;

        Ok(Self::supervise(browser, handler, Heartbeat::default()))
    }

    /// Attach to a running browser over its DevTools websocket.
    pub async fn connect(ws_url: &str, heartbeat: Heartbeat) -> Result<Self> {
        let (browser, handler) = Browser::connect(ws_url)
            .await
            .with_context(|| format!("failed to connect to browser at {ws_url}"))?;

        Ok(Self::supervise(browser, handler, heartbeat))
    }

    /// Drive the CDP handler and watch the connection.
    ///
    /// A socket that closes cleanly leaves the handler stream pending rather
    /// than ending it, so liveness also rests on the browser answering a
    /// version query within `heartbeat.timeout`.
    fn supervise(browser: Browser, mut handler: Handler, heartbeat: Heartbeat) -> Self {
        let connected = Arc::new(AtomicBool::new(true));
        let browser = Arc::new(RwLock::new(browser));

        let flag = Arc::clone(&connected);
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                match event {
                    Err(e) if is_connection_loss(&e) => {
                        debug!("cdp connection error: {e}");
                        break;
                    }
                    Err(e) => debug!("cdp handler: {e}"),
                    Ok(()) => {}
                }
            }
            flag.store(false, Ordering::SeqCst);
            warn!("browser connection lost");
        });

        let flag = Arc::clone(&connected);
        let watched = Arc::clone(&browser);
        let heartbeat_task = tokio::spawn(async move {
            loop {
                tokio::time::sleep(heartbeat.interval).await;
                let answer = {
                    let browser = watched.read().await;
                    tokio::time::timeout(heartbeat.timeout, browser.version()).await
                };
                match answer {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => {
                        warn!("browser stopped answering: {e}");
                        break;
                    }
                    Err(_) => {
                        warn!(
                            "browser did not answer within {}ms",
                            heartbeat.timeout.as_millis()
                        );
                        break;
                    }
                }
            }
            flag.store(false, Ordering::SeqCst);
        });

        Self {
            browser,
            connected,
            active_count: Arc::new(AtomicUsize::new(0)),
            handler_task,
            heartbeat_task,
        }
    }

    /// Whether a browser process we spawned has exited. Attached browsers
    /// have no child and never report an exit here.
    fn child_exited(&self) -> bool {
        let Ok(mut browser) = self.browser.try_write() else {
            // Busy with a tab or a heartbeat; the next check will see it.
            return false;
        };
        match browser.try_wait() {
            Ok(Some(status)) => {
                warn!("browser process exited: {status}");
                true
            }
            Ok(None) => false,
            Err(e) => {
                debug!("could not poll browser process: {e}");
                false
            }
        }
    }
}

impl Drop for ChromiumRenderer {
    fn drop(&mut self) {
        self.heartbeat_task.abort();
        self.handler_task.abort();
    }
}

#[async_trait]
impl Renderer for ChromiumRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        let page = {
            let browser = self.browser.read().await;
            browser
                .new_page("about:blank")
                .await
                .context("failed to create new page")?
        };

        let inflight = Arc::new(DashSet::new());
        let tasks = match track_network(&page, Arc::clone(&inflight)).await {
            Ok(tasks) => tasks,
            Err(e) => {
                let _ = page.close().await;
                return Err(e);
            }
        };

        self.active_count.fetch_add(1, Ordering::Relaxed);

        Ok(Box::new(ChromiumContext {
            page,
            inflight,
            tasks,
            active_count: Arc::clone(&self.active_count),
            closed: false,
        }))
    }

    fn is_connected(&self) -> bool {
        if !self.connected.load(Ordering::SeqCst)
            || self.handler_task.is_finished()
            || self.heartbeat_task.is_finished()
        {
            return false;
        }
        if self.child_exited() {
            self.connected.store(false, Ordering::SeqCst);
            return false;
        }
        true
    }

    async fn shutdown(&self) -> Result<()> {
        self.heartbeat_task.abort();
        self.connected.store(false, Ordering::SeqCst);
        let mut browser = self.browser.write().await;
        browser.close().await.context("failed to close browser")?;
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.active_count.load(Ordering::Relaxed)
    }
}

/// Track in-flight requests so navigation can wait for the network to settle.
async fn track_network(page: &Page, inflight: Arc<DashSet<String>>) -> Result<Vec<JoinHandle<()>>> {
    let mut sent = page
        .event_listener::<EventRequestWillBeSent>()
        .await
        .context("failed to listen for requests")?;
    let mut finished = page
        .event_listener::<EventLoadingFinished>()
        .await
        .context("failed to listen for finished loads")?;
    let mut failed = page
        .event_listener::<EventLoadingFailed>()
        .await
        .context("failed to listen for failed loads")?;

    let on_sent = Arc::clone(&inflight);
    let on_finished = Arc::clone(&inflight);
    let on_failed = inflight;

    Ok(vec![
        tokio::spawn(async move {
            while let Some(event) = sent.next().await {
                on_sent.insert(event.request_id.inner().clone());
            }
        }),
        tokio::spawn(async move {
            while let Some(event) = finished.next().await {
                on_finished.remove(event.request_id.inner());
            }
        }),
        tokio::spawn(async move {
            while let Some(event) = failed.next().await {
                on_failed.remove(event.request_id.inner());
            }
        }),
    ])
}

fn resource_kind(resource_type: &ResourceType) -> ResourceKind {
    match resource_type {
        ResourceType::Document => ResourceKind::Document,
        ResourceType::Stylesheet => ResourceKind::Stylesheet,
        ResourceType::Script => ResourceKind::Script,
        ResourceType::Image => ResourceKind::Image,
        ResourceType::Media => ResourceKind::Media,
        ResourceType::Font => ResourceKind::Font,
        ResourceType::Xhr | ResourceType::Fetch => ResourceKind::Xhr,
        _ => ResourceKind::Other,
    }
}

/// Wait until at most `options.idle_max_inflight` requests have been in
/// flight for `options.idle_quiet_ms` without interruption. Any rise above
/// the limit restarts the quiet window. Never returns on a page that keeps
/// the network busy; callers bound it with a timeout.
pub async fn wait_for_network_settle(inflight: &DashSet<String>, options: NavigateOptions) {
    let quiet = Duration::from_millis(options.idle_quiet_ms);
    let mut quiet_since: Option<Instant> = None;
    loop {
        if inflight.len() <= options.idle_max_inflight {
            let since = *quiet_since.get_or_insert_with(Instant::now);
            if since.elapsed() >= quiet {
                return;
            }
        } else {
            quiet_since = None;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// A single Chromium page context.
pub struct ChromiumContext {
    page: Page,
    inflight: Arc<DashSet<String>>,
    tasks: Vec<JoinHandle<()>>,
    active_count: Arc<AtomicUsize>,
    closed: bool,
}

impl Drop for ChromiumContext {
    fn drop(&mut self) {
        self.active_count.fetch_sub(1, Ordering::Relaxed);
        for task in self.tasks.drain(..) {
            task.abort();
        }
        // Dropped without close(): the render was cancelled mid-flight.
        if !self.closed {
            if let Ok(runtime) = tokio::runtime::Handle::try_current() {
                let page = self.page.clone();
                runtime.spawn(async move {
                    if let Err(e) = page.close().await {
                        debug!("deferred page close failed: {e}");
                    }
                });
            }
        }
    }
}

#[async_trait]
impl RenderContext for ChromiumContext {
    async fn set_user_agent(&mut self, user_agent: &str) -> Result<()> {
        self.page
            .set_user_agent(user_agent)
            .await
            .context("failed to set user agent")?;
        Ok(())
    }

    async fn block_requests(&mut self, policy: Arc<BlockPolicy>) -> Result<()> {
        let mut paused = self
            .page
            .event_listener::<EventRequestPaused>()
            .await
            .context("failed to listen for paused requests")?;

        self.page
            .execute(
                fetch::EnableParams::builder()
                    .pattern(RequestPattern::builder().url_pattern("*").build())
                    .build(),
            )
            .await
            .context("failed to enable request interception")?;

        let page = self.page.clone();
        self.tasks.push(tokio::spawn(async move {
            while let Some(event) = paused.next().await {
                let kind = resource_kind(&event.resource_type);
                let outcome = match policy.decide(kind, &event.request.url) {
                    RequestDecision::Abort => page
                        .execute(FailRequestParams::new(
                            event.request_id.clone(),
                            ErrorReason::BlockedByClient,
                        ))
                        .await
                        .map(|_| ()),
                    RequestDecision::Continue => page
                        .execute(ContinueRequestParams::new(event.request_id.clone()))
                        .await
                        .map(|_| ()),
                };
                if let Err(e) = outcome {
                    debug!("interception for {} failed: {e}", event.request.url);
                }
            }
        }));

        Ok(())
    }

    async fn navigate(&mut self, url: &str, options: NavigateOptions) -> Result<NavigationResult> {
        let start = Instant::now();

        let load = async {
            self.page.goto(url).await.context("navigation failed")?;
            wait_for_network_settle(&self.inflight, options).await;
            Ok::<_, anyhow::Error>(())
        };

        match tokio::time::timeout(Duration::from_millis(options.timeout_ms), load).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e),
            Err(_) => bail!("navigation timed out after {}ms", options.timeout_ms),
        }

        let final_url = self
            .page
            .url()
            .await
            .ok()
            .flatten()
            .unwrap_or_else(|| url.to_string());

        Ok(NavigationResult {
            final_url,
            load_time_ms: start.elapsed().as_millis() as u64,
        })
    }

    async fn wait_for_selector(&self, selector: &str, timeout_ms: u64) -> Result<bool> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);
        loop {
            if self.page.find_element(selector).await.is_ok() {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn get_html(&self) -> Result<String> {
        self.page.content().await.context("failed to get HTML")
    }

    async fn close(mut self: Box<Self>) -> Result<()> {
        self.closed = true;
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.page
            .clone()
            .close()
            .await
            .context("failed to close page")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::SinkExt;
    use serde_json::{json, Value};
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::Message;

    fn settle_options() -> NavigateOptions {
        NavigateOptions {
            timeout_ms: 15_000,
            idle_max_inflight: 2,
            idle_quiet_ms: 500,
        }
    }

    fn requests(ids: &[&str]) -> DashSet<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    /// A DevTools endpoint that answers every command like a browser would,
    /// then drops the socket without a close frame after `lifetime`.
    async fn short_lived_devtools(lifetime: Duration) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            let _ = tokio::time::timeout(lifetime, async {
                while let Some(Ok(message)) = ws.next().await {
                    let Message::Text(text) = message else { continue };
                    let request: Value = serde_json::from_str(&text).unwrap();
                    let reply = json!({
                        "id": request["id"],
                        "result": {
                            "protocolVersion": "1.3",
                            "product": "HeadlessChrome/131.0.0.0",
                            "revision": "@0",
                            "userAgent": "HeadlessChrome",
                            "jsVersion": "13.1",
                        },
                    });
                    if ws.send(Message::Text(reply.to_string().into())).await.is_err() {
                        break;
                    }
                }
            })
            .await;
            drop(ws);
        });
        format!("ws://{addr}/devtools/browser/local")
    }

    #[test]
    fn test_serverless_profile_is_single_process() {
        let args = launch_args(DeployMode::Serverless);
        assert!(args.contains(&"--single-process"));
        assert!(args.contains(&"--no-zygote"));
        assert!(!launch_args(DeployMode::Local).contains(&"--single-process"));
    }

    #[test]
    fn test_explicit_path_wins() {
        let launcher = ChromiumLauncher::new(
            DeployMode::Serverless,
            Some(PathBuf::from("/srv/bin/headless-shell")),
        );
        assert_eq!(
            launcher.executable(),
            Some(PathBuf::from("/srv/bin/headless-shell"))
        );
    }

    #[test]
    fn test_resource_kind_mapping() {
        assert_eq!(resource_kind(&ResourceType::Image), ResourceKind::Image);
        assert_eq!(resource_kind(&ResourceType::Media), ResourceKind::Media);
        assert_eq!(resource_kind(&ResourceType::Fetch), ResourceKind::Xhr);
        assert_eq!(resource_kind(&ResourceType::Other), ResourceKind::Other);
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_returns_after_quiet_window() {
        let inflight = requests(&["a", "b"]);
        let started = Instant::now();
        wait_for_network_settle(&inflight, settle_options()).await;
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(500));
        assert!(waited < Duration::from_millis(700));
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_window_restarts_when_traffic_rises() {
        let inflight = requests(&["a", "b"]);
        let started = Instant::now();

        let traffic = async {
            tokio::time::sleep(Duration::from_millis(300)).await;
            inflight.insert("c".to_string());
            tokio::time::sleep(Duration::from_millis(300)).await;
            inflight.remove("c");
        };
        tokio::join!(wait_for_network_settle(&inflight, settle_options()), traffic);

        // Quiet again from ~600ms, so never done before 1100ms.
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(1_100), "settled after {waited:?}");
        assert!(waited < Duration::from_millis(1_500), "settled after {waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_settle_waits_while_network_busy() {
        let inflight = requests(&["a", "b", "c"]);
        let waited = tokio::time::timeout(
            Duration::from_secs(10),
            wait_for_network_settle(&inflight, settle_options()),
        )
        .await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn test_dropped_devtools_socket_marks_browser_gone() {
        let ws_url = short_lived_devtools(Duration::from_millis(600)).await;
        let heartbeat = Heartbeat {
            interval: Duration::from_millis(50),
            timeout: Duration::from_secs(1),
        };
        let renderer = ChromiumRenderer::connect(&ws_url, heartbeat)
            .await
            .expect("connect failed");
        assert!(renderer.is_connected());

        // Heartbeats are being answered.
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert!(renderer.is_connected());

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while renderer.is_connected() {
            assert!(
                std::time::Instant::now() < deadline,
                "dropped socket was never noticed"
            );
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    #[test]
    fn test_remote_url_comes_from_config() {
        let config = ExtractorConfig {
            browser_ws_url: Some("ws://10.0.0.5:9222/devtools/browser/abc".to_string()),
            ..ExtractorConfig::default()
        };
        let launcher = ChromiumLauncher::from_config(&config);
        assert_eq!(
            launcher.remote(),
            Some("ws://10.0.0.5:9222/devtools/browser/abc")
        );
    }

    #[tokio::test]
    #[ignore] // Requires Chromium to be installed
    async fn test_chromium_render_data_url() {
        let launcher = ChromiumLauncher::new(DeployMode::Local, None);
        let renderer = launcher.launch().await.expect("failed to launch");
        assert!(renderer.is_connected());

        let mut ctx = renderer
            .new_context()
            .await
            .expect("failed to create context");
        ctx.block_requests(Arc::new(BlockPolicy::default()))
            .await
            .expect("interception failed");

        let options = NavigateOptions {
            timeout_ms: 10_000,
            idle_max_inflight: 2,
            idle_quiet_ms: 200,
        };
        let nav = ctx
            .navigate("data:text/html,<main><h1>Hello</h1><p>World</p></main>", options)
            .await
            .expect("navigation failed");
        assert!(nav.load_time_ms < 10_000);

        assert!(ctx.wait_for_selector("main", 1_000).await.expect("wait failed"));
        let html = ctx.get_html().await.expect("get_html failed");
        assert!(html.contains("<h1>Hello</h1>"));

        ctx.close().await.expect("close failed");
        assert_eq!(renderer.active_contexts(), 0);

        renderer.shutdown().await.expect("shutdown failed");
    }
}
