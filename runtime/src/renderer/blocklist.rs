//! Request blocking policy for rendered tabs.
//!
//! Heavy resources and ad/tracking hosts add load time and noise without
//! adding text, so the renderer aborts them before they leave the browser.

use url::Url;

/// Advertising, tracking and analytics hosts. Matched by host suffix.
pub const DENIED_HOSTS: &[&str] = &[
    "doubleclick.net",
    "googlesyndication.com",
    "googleadservices.com",
    "google-analytics.com",
    "googletagmanager.com",
    "googletagservices.com",
    "adservice.google.com",
    "connect.facebook.net",
    "analytics.tiktok.com",
    "bat.bing.com",
    "clarity.ms",
    "hotjar.com",
    "segment.io",
    "segment.com",
    "mixpanel.com",
    "amplitude.com",
    "fullstory.com",
    "scorecardresearch.com",
    "quantserve.com",
    "criteo.com",
    "criteo.net",
    "taboola.com",
    "outbrain.com",
    "adnxs.com",
    "ads-twitter.com",
    "ads.linkedin.com",
    "snap.licdn.com",
    "nr-data.net",
];

/// Browser-agnostic resource category of an outgoing request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Document,
    Stylesheet,
    Script,
    Image,
    Media,
    Font,
    Xhr,
    Other,
}

/// What to do with an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestDecision {
    Continue,
    Abort,
}

/// Decides which requests a rendered tab may make.
#[derive(Debug, Clone)]
pub struct BlockPolicy {
    blocked_kinds: Vec<ResourceKind>,
    denied_hosts: Vec<String>,
}

impl Default for BlockPolicy {
    fn default() -> Self {
        Self {
            blocked_kinds: vec![ResourceKind::Image, ResourceKind::Media, ResourceKind::Font],
            denied_hosts: DENIED_HOSTS.iter().map(|h| h.to_string()).collect(),
        }
    }
}

impl BlockPolicy {
    /// Decide on a request by resource kind, then by host.
    pub fn decide(&self, kind: ResourceKind, url: &str) -> RequestDecision {
        if self.blocked_kinds.contains(&kind) || self.is_denied_host(url) {
            RequestDecision::Abort
        } else {
            RequestDecision::Continue
        }
    }

    fn is_denied_host(&self, url: &str) -> bool {
        let Some(host) = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
        else {
            return false;
        };

        self.denied_hosts.iter().any(|denied| {
            host == *denied
                || host
                    .strip_suffix(denied.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heavy_resource_kinds_are_aborted() {
        let policy = BlockPolicy::default();
        let url = "https://shop.example.com/hero.jpg";
        assert_eq!(policy.decide(ResourceKind::Image, url), RequestDecision::Abort);
        assert_eq!(policy.decide(ResourceKind::Media, url), RequestDecision::Abort);
        assert_eq!(
            policy.decide(ResourceKind::Document, "https://shop.example.com/"),
            RequestDecision::Continue
        );
        assert_eq!(
            policy.decide(ResourceKind::Script, "https://shop.example.com/app.js"),
            RequestDecision::Continue
        );
    }

    #[test]
    fn test_tracking_hosts_match_by_suffix() {
        let policy = BlockPolicy::default();
        assert_eq!(
            policy.decide(
                ResourceKind::Script,
                "https://www.googletagmanager.com/gtm.js?id=GTM-XXXX"
            ),
            RequestDecision::Abort
        );
        assert_eq!(
            policy.decide(ResourceKind::Xhr, "https://stats.g.doubleclick.net/collect"),
            RequestDecision::Abort
        );
        // Suffix must fall on a label boundary.
        assert_eq!(
            policy.decide(ResourceKind::Script, "https://notdoubleclick.net/app.js"),
            RequestDecision::Continue
        );
    }

    #[test]
    fn test_unparsable_urls_continue() {
        let policy = BlockPolicy::default();
        assert_eq!(
            policy.decide(ResourceKind::Other, "data:text/plain,hello"),
            RequestDecision::Continue
        );
    }

    #[test]
    fn test_scripts_and_documents_continue() {
        let policy = BlockPolicy::default();
        for kind in [ResourceKind::Document, ResourceKind::Script, ResourceKind::Xhr] {
            assert_eq!(
                policy.decide(kind, "https://shop.example.com/app.js"),
                RequestDecision::Continue
            );
        }
    }
}
