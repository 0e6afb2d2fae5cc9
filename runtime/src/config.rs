//! Runtime configuration: deployment mode, timeouts and extraction thresholds.
//!
//! Everything here is read once at startup. The pipeline never consults the
//! environment directly; it receives an [`ExtractorConfig`] by value.

use serde::Deserialize;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

/// Chrome-on-macOS identity used for both the static fetch and rendered tabs.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
                                      AppleWebKit/537.36 (KHTML, like Gecko) \
                                      Chrome/131.0.0.0 Safari/537.36";

/// Static HTML shorter than this is treated as an unrendered shell.
pub const MIN_STATIC_HTML_CHARS: usize = 2000;
/// More `<script>` tags than this suggests a client-rendered page.
pub const MAX_STATIC_SCRIPT_TAGS: usize = 20;
/// Readability output at or below this length is noise, not an article.
pub const MIN_READABILITY_CHARS: usize = 200;
/// Text containers at or below this length are ignored by the dense-block pass.
pub const MIN_DENSE_BLOCK_CHARS: usize = 50;
/// Maximum retained characters handed to the downstream model.
pub const CONTENT_BUDGET_CHARS: usize = 4000;
/// Characters kept from the start of over-budget text.
pub const HEAD_KEEP_CHARS: usize = 2000;
/// Characters kept from the end of over-budget text.
pub const TAIL_KEEP_CHARS: usize = 2000;

/// Which browser launch profile to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployMode {
    /// Full Chromium discovered on the local machine.
    #[default]
    Local,
    /// Constrained function host: headless shell, single process, no zygote.
    Serverless,
}

impl FromStr for DeployMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" | "development" | "dev" => Ok(Self::Local),
            "serverless" | "lambda" | "production" | "prod" => Ok(Self::Serverless),
            other => Err(format!("unknown deploy mode '{other}'")),
        }
    }
}

/// Tunable heuristics. Defaults are the empirically tuned values downstream
/// prompts were written against; change them only deliberately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub min_static_html_chars: usize,
    pub max_static_script_tags: usize,
    pub min_readability_chars: usize,
    pub min_dense_block_chars: usize,
    pub content_budget_chars: usize,
    pub head_keep_chars: usize,
    pub tail_keep_chars: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_static_html_chars: MIN_STATIC_HTML_CHARS,
            max_static_script_tags: MAX_STATIC_SCRIPT_TAGS,
            min_readability_chars: MIN_READABILITY_CHARS,
            min_dense_block_chars: MIN_DENSE_BLOCK_CHARS,
            content_budget_chars: CONTENT_BUDGET_CHARS,
            head_keep_chars: HEAD_KEEP_CHARS,
            tail_keep_chars: TAIL_KEEP_CHARS,
        }
    }
}

/// Timing knobs for the dynamic renderer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Hard cap on navigation including the network-settle wait.
    pub navigation_timeout_ms: u64,
    /// Upper bound on waiting for a main-content landmark after load.
    pub landmark_wait_ms: u64,
    /// Fixed delay raced against the landmark wait.
    pub fallback_delay_ms: u64,
    /// Network counts as settled at or below this many in-flight requests.
    pub idle_max_inflight: usize,
    /// ...sustained for this long.
    pub idle_quiet_ms: u64,
    /// Cap on each remaining browser step: opening the tab, the user agent
    /// override, interception setup, reading the HTML and closing the tab.
    pub step_timeout_ms: u64,
    pub user_agent: String,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            navigation_timeout_ms: 15_000,
            landmark_wait_ms: 3_000,
            fallback_delay_ms: 1_000,
            idle_max_inflight: 2,
            idle_quiet_ms: 500,
            step_timeout_ms: 5_000,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

/// Top-level configuration for the extraction pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub deploy_mode: DeployMode,
    /// Explicit browser binary. When unset the launcher searches for one.
    pub chromium_path: Option<PathBuf>,
    /// DevTools websocket of an already running browser. When set, nothing
    /// is launched locally.
    pub browser_ws_url: Option<String>,
    pub static_timeout_ms: u64,
    pub render: RenderSettings,
    pub thresholds: Thresholds,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            deploy_mode: DeployMode::default(),
            chromium_path: None,
            browser_ws_url: None,
            static_timeout_ms: 10_000,
            render: RenderSettings::default(),
            thresholds: Thresholds::default(),
        }
    }
}

impl ExtractorConfig {
    /// Build a config from `PITCHKIT_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup("PITCHKIT_DEPLOY_MODE") {
            match raw.parse::<DeployMode>() {
                Ok(mode) => config.deploy_mode = mode,
                Err(e) => warn!("{e}, using {:?}", config.deploy_mode),
            }
        }

        if let Some(path) = lookup("PITCHKIT_CHROMIUM_PATH").filter(|p| !p.trim().is_empty()) {
            config.chromium_path = Some(PathBuf::from(path));
        }

        if let Some(ws) = lookup("PITCHKIT_BROWSER_WS_URL").filter(|u| !u.trim().is_empty()) {
            config.browser_ws_url = Some(ws.trim().to_string());
        }

        if let Some(ms) = parse_millis(&lookup, "PITCHKIT_STATIC_TIMEOUT_MS") {
            config.static_timeout_ms = ms;
        }
        if let Some(ms) = parse_millis(&lookup, "PITCHKIT_NAV_TIMEOUT_MS") {
            config.render.navigation_timeout_ms = ms;
        }

        config
    }
}

fn parse_millis<F>(lookup: &F, key: &str) -> Option<u64>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(0) | Err(_) => {
            warn!("ignoring invalid {key}={raw:?}");
            None
        }
        Ok(ms) => Some(ms),
    }
}
