//! LoremFlickr Provider
//!
//! Tertiary randomized-image fallback. Builds keyword URLs locally — no
//! request, no key, cannot fail — so the chain always has a last resort.

use async_trait::async_trait;

use super::ImageProvider;
use crate::error::Result;
use crate::model::ImageResult;

/// How many distinct lock slots to hand out per query
const DEFAULT_COUNT: usize = 8;

pub struct LoremFlickrProvider {
    width: u32,
    height: u32,
}

impl Default for LoremFlickrProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl LoremFlickrProvider {
    pub fn new() -> Self {
        Self {
            width: 640,
            height: 480,
        }
    }

    /// LoremFlickr keyword slug: comma-separated lowercase words
    fn slug(query: &str) -> String {
        let words: Vec<String> = query
            .split_whitespace()
            .map(|w| {
                w.chars()
                    .filter(char::is_ascii_alphanumeric)
                    .collect::<String>()
                    .to_lowercase()
            })
            .filter(|w| !w.is_empty())
            .collect();

        if words.is_empty() {
            "random".into()
        } else {
            words.join(",")
        }
    }
}

#[async_trait]
impl ImageProvider for LoremFlickrProvider {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ImageResult>> {
        let slug = Self::slug(query);
        let count = limit.min(DEFAULT_COUNT);

        // The lock parameter pins one random image per slot, keeping URLs
        // distinct and dedup-stable across providers.
        Ok((0..count)
            .map(|lock| ImageResult {
                url: format!(
                    "https://loremflickr.com/{}/{}/{slug}?lock={lock}",
                    self.width, self.height
                ),
                page_url: format!("https://loremflickr.com/{}/{}/{slug}", self.width, self.height),
                title: query.to_string(),
                source_label: "LoremFlickr".into(),
            })
            .collect())
    }

    fn name(&self) -> &str {
        "loremflickr"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[tokio::test]
    async fn test_urls_are_distinct_and_capped() {
        let provider = LoremFlickrProvider::new();
        let results = provider.search("brown bear", 24).await.unwrap();

        assert_eq!(results.len(), DEFAULT_COUNT);
        let urls: HashSet<_> = results.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(urls.len(), results.len());
        assert!(results[0].url.contains("brown,bear"));
    }

    #[test]
    fn test_slug_sanitizes_query() {
        assert_eq!(LoremFlickrProvider::slug("Brown Bear!"), "brown,bear");
        assert_eq!(LoremFlickrProvider::slug("  "), "random");
    }
}
