//! Image Search Aggregator
//!
//! Walks an ordered provider chain, normalizes and merges what comes back,
//! and absorbs every provider failure. Image search is best-effort
//! enrichment: the caller always receives a well-formed response.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::model::{ImageResult, SearchOutcome, SourceLink};
use crate::provider::ImageProvider;

/// Merged result cap
const MAX_RESULTS: usize = 24;

/// Per-provider request timeout
const PROVIDER_TIMEOUT: Duration = Duration::from_secs(4);

/// Deadline for the whole chain; sequential fallback must not stack
/// provider timeouts unbounded
const OVERALL_DEADLINE: Duration = Duration::from_secs(10);

/// Ordered fallback chain over independent image providers
pub struct ImageSearchAggregator {
    providers: Vec<Arc<dyn ImageProvider>>,
    max_results: usize,
    provider_timeout: Duration,
    overall_deadline: Duration,
}

impl ImageSearchAggregator {
    pub fn new(providers: Vec<Arc<dyn ImageProvider>>) -> Self {
        Self {
            providers,
            max_results: MAX_RESULTS,
            provider_timeout: PROVIDER_TIMEOUT,
            overall_deadline: OVERALL_DEADLINE,
        }
    }

    /// Override the merged result cap
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Override the per-provider timeout
    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    /// Override the whole-chain deadline
    pub fn with_overall_deadline(mut self, deadline: Duration) -> Self {
        self.overall_deadline = deadline;
        self
    }

    /// Search the provider chain
    ///
    /// Never fails: provider errors, timeouts, and empty result sets fall
    /// through to the next provider; a fully dry run still returns the
    /// static source links.
    pub async fn search(&self, query: &str) -> SearchOutcome {
        let images = self.collect(query).await;

        tracing::debug!(query, images = images.len(), "image search finished");

        SearchOutcome {
            sources: static_sources(query),
            images,
        }
    }

    async fn collect(&self, query: &str) -> Vec<ImageResult> {
        let deadline = Instant::now() + self.overall_deadline;
        let mut seen: HashSet<String> = HashSet::new();
        let mut images: Vec<ImageResult> = Vec::new();

        for provider in &self.providers {
            if images.len() >= self.max_results {
                break;
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                tracing::warn!(query, "search deadline exhausted, stopping chain");
                break;
            }

            let window = remaining.min(self.provider_timeout);
            let wanted = self.max_results - images.len();

            match tokio::time::timeout(window, provider.search(query, wanted)).await {
                Ok(Ok(results)) if results.is_empty() => {
                    tracing::debug!(provider = provider.name(), "empty result, falling back");
                }
                Ok(Ok(results)) => {
                    let before = images.len();
                    for result in results {
                        if seen.insert(result.url.clone()) {
                            images.push(result);
                            if images.len() >= self.max_results {
                                break;
                            }
                        }
                    }
                    tracing::debug!(
                        provider = provider.name(),
                        contributed = images.len() - before,
                        "provider contributed"
                    );
                }
                Ok(Err(e)) => {
                    tracing::warn!(
                        provider = provider.name(),
                        error = %e,
                        "provider failed, falling back"
                    );
                }
                Err(_) => {
                    tracing::warn!(
                        provider = provider.name(),
                        timeout_ms = window.as_millis() as u64,
                        "provider timed out, falling back"
                    );
                }
            }
        }

        images
    }
}

/// Static human-browsable search links, returned with every response
pub fn static_sources(query: &str) -> Vec<SourceLink> {
    let links = [
        (
            "Google Images",
            "https://www.google.com/search",
            vec![("tbm", "isch"), ("q", query)],
        ),
        (
            "Bing Images",
            "https://www.bing.com/images/search",
            vec![("q", query)],
        ),
        (
            "DuckDuckGo",
            "https://duckduckgo.com/",
            vec![("ia", "images"), ("iax", "images"), ("q", query)],
        ),
        (
            "Yandex Images",
            "https://yandex.com/images/search",
            vec![("text", query)],
        ),
    ];

    links
        .into_iter()
        .filter_map(|(title, base, params)| {
            reqwest::Url::parse_with_params(base, params)
                .ok()
                .map(|url| SourceLink {
                    title: title.into(),
                    url: url.to_string(),
                })
        })
        .collect()
}
