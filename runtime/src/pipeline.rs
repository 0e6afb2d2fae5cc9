//! Extraction pipeline: URL in, bounded model-ready text out.
//!
//! ```text
//! static fetch → classify → [render dynamically] → extract (parallel) → merge & trim
//! ```
//!
//! Fallback failures (static fetch, render) are absorbed here. The only
//! error that escapes is a browser that cannot be launched when there is no
//! static HTML to fall back on.

use crate::acquisition::http_client::{HttpClient, StaticFetch};
use crate::acquisition::shell_detector::classify_document;
use crate::config::{ExtractorConfig, Thresholds};
use crate::events::{now_timestamp, EventBus, PipelineEvent};
use crate::extraction::extract_candidates;
use crate::extraction::merge::{merge_candidates, CandidateKind};
use crate::pool::manager::BrowserManager;
use crate::renderer::chromium::ChromiumLauncher;
use crate::renderer::dynamic::{DynamicRenderer, RenderError};
use crate::renderer::BrowserLauncher;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Which document the extractors read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentSource {
    /// The static response was adequate.
    Static,
    /// The browser-rendered document.
    Dynamic,
    /// Rendering was needed but failed; the static response was used anyway.
    StaticFallback,
    /// Nothing usable was retrieved.
    Empty,
}

impl DocumentSource {
    /// The same name the JSON surfaces use.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Dynamic => "dynamic",
            Self::StaticFallback => "static_fallback",
            Self::Empty => "empty",
        }
    }
}

/// Errors that abort an extraction.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("no static html for {url} and the browser is unavailable: {source}")]
    BrowserUnavailable {
        url: String,
        #[source]
        source: RenderError,
    },
}

/// Full outcome of one extraction.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionReport {
    pub url: String,
    /// Merged, bounded text. May be empty.
    pub text: String,
    pub source: DocumentSource,
    /// Status of the static fetch, when a response arrived. Callers use this,
    /// not `text`, to tell a blocked site from an empty page.
    pub static_status: Option<u16>,
    /// Why rendering was requested, if it was.
    pub render_reason: Option<String>,
    /// Render failure message, if rendering was attempted and failed.
    pub dynamic_error: Option<String>,
    pub candidates_used: Vec<CandidateKind>,
    pub truncated: bool,
    pub elapsed_ms: u64,
}

impl ExtractionReport {
    /// True when nothing usable came back.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    /// True when the static fetch was refused with a bot-protection status.
    pub fn looks_blocked(&self) -> bool {
        StaticFetch {
            status: self.static_status,
            html: None,
        }
        .looks_blocked()
    }
}

/// The extraction pipeline. Cheap to share behind an `Arc`.
pub struct Pipeline {
    fetcher: HttpClient,
    renderer: DynamicRenderer,
    thresholds: Thresholds,
    events: Option<Arc<EventBus>>,
}

impl Pipeline {
    /// Build a pipeline around an existing browser manager.
    pub fn new(config: &ExtractorConfig, manager: Arc<BrowserManager>) -> Self {
        Self {
            fetcher: HttpClient::new(config.static_timeout_ms, &config.render.user_agent),
            renderer: DynamicRenderer::new(manager, config.render.clone()),
            thresholds: config.thresholds,
            events: None,
        }
    }

    /// Build a pipeline with a Chromium launcher chosen by the deploy mode.
    pub fn from_config(config: &ExtractorConfig) -> Self {
        Self::with_launcher(config, Arc::new(ChromiumLauncher::from_config(config)))
    }

    /// Build a pipeline with a custom launcher.
    pub fn with_launcher(config: &ExtractorConfig, launcher: Arc<dyn BrowserLauncher>) -> Self {
        Self::new(config, Arc::new(BrowserManager::new(launcher)))
    }

    /// Publish stage events on `bus`.
    pub fn with_events(mut self, bus: Arc<EventBus>) -> Self {
        self.events = Some(bus);
        self
    }

    /// The shared browser manager.
    pub fn browser(&self) -> &Arc<BrowserManager> {
        self.renderer.manager()
    }

    /// Preprocessed page text of at most the content budget, or an empty
    /// string when nothing readable was found. Fails only when there is no
    /// static HTML and no browser could be started.
    pub async fn extract_and_preprocess_url(&self, url: &str) -> Result<String, ExtractError> {
        self.extract_with_report(url).await.map(|report| report.text)
    }

    /// Run the pipeline and keep the details callers need for messaging.
    pub async fn extract_with_report(&self, url: &str) -> Result<ExtractionReport, ExtractError> {
        let started = Instant::now();
        info!("extracting {url}");
        self.emit(PipelineEvent::ExtractionStarted {
            url: url.to_string(),
            timestamp: now_timestamp(),
        });

        let fetch_started = Instant::now();
        let fetched = self.fetcher.fetch(url).await;
        self.emit(PipelineEvent::StaticFetched {
            url: url.to_string(),
            status: fetched.status,
            bytes: fetched.html.as_ref().map_or(0, |h| h.len()),
            elapsed_ms: elapsed_ms(fetch_started),
        });

        let static_status = fetched.status;
        let verdict = classify_document(fetched.html.as_deref(), &self.thresholds);
        let mut render_reason = None;
        let mut dynamic_error = None;

        let (document, source) = if verdict.needs_render() {
            debug!("{url}: {verdict}, rendering");
            render_reason = Some(verdict.to_string());
            self.emit(PipelineEvent::RenderRequested {
                url: url.to_string(),
                reason: verdict.to_string(),
            });

            let render_started = Instant::now();
            match self.renderer.render(url).await {
                Ok(html) if !html.trim().is_empty() => {
                    self.emit(PipelineEvent::RenderComplete {
                        url: url.to_string(),
                        bytes: html.len(),
                        elapsed_ms: elapsed_ms(render_started),
                    });
                    (html, DocumentSource::Dynamic)
                }
                outcome => {
                    let message = match &outcome {
                        Ok(_) => "rendered document was empty".to_string(),
                        Err(e) => e.to_string(),
                    };
                    warn!("dynamic render failed for {url}: {message}");
                    self.emit(PipelineEvent::RenderFailed {
                        url: url.to_string(),
                        error: message.clone(),
                        elapsed_ms: elapsed_ms(render_started),
                    });
                    dynamic_error = Some(message);

                    match (fetched.html, outcome) {
                        (Some(html), _) => (html, DocumentSource::StaticFallback),
                        (None, Err(e)) if e.is_launch_failure() => {
                            let err = ExtractError::BrowserUnavailable {
                                url: url.to_string(),
                                source: e,
                            };
                            self.emit(PipelineEvent::ExtractionFailed {
                                url: url.to_string(),
                                error: err.to_string(),
                                total_ms: elapsed_ms(started),
                            });
                            return Err(err);
                        }
                        (None, _) => (String::new(), DocumentSource::Empty),
                    }
                }
            }
        } else {
            (fetched.html.unwrap_or_default(), DocumentSource::Static)
        };

        let candidates = extract_candidates(Arc::from(document), url, &self.thresholds).await;
        let merged = merge_candidates(&candidates, &self.thresholds);

        let report = ExtractionReport {
            url: url.to_string(),
            source: if merged.text.is_empty() {
                DocumentSource::Empty
            } else {
                source
            },
            static_status,
            render_reason,
            dynamic_error,
            candidates_used: merged.used,
            truncated: merged.truncated,
            elapsed_ms: elapsed_ms(started),
            text: merged.text,
        };

        info!(
            "extracted {} chars from {url} via {:?} in {}ms",
            report.text.chars().count(),
            report.source,
            report.elapsed_ms
        );
        self.emit(PipelineEvent::ExtractionComplete {
            url: url.to_string(),
            chars: report.text.chars().count(),
            source: report.source.as_str().to_string(),
            truncated: report.truncated,
            total_ms: report.elapsed_ms,
        });

        Ok(report)
    }

    fn emit(&self, event: PipelineEvent) {
        if let Some(bus) = &self.events {
            bus.emit(event);
        }
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    since.elapsed().as_millis() as u64
}
