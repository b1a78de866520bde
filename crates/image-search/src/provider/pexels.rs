//! Pexels Provider
//!
//! Primary structured-API provider. Requires an API key, sent as the
//! `Authorization` header.

use async_trait::async_trait;
use serde::Deserialize;

use super::ImageProvider;
use crate::error::{Result, SearchError};
use crate::model::ImageResult;

const SEARCH_URL: &str = "https://api.pexels.com/v1/search";

/// Pexels caps `per_page` at 80
const MAX_PER_PAGE: usize = 80;

pub struct PexelsProvider {
    client: reqwest::Client,
    api_key: String,
}

impl PexelsProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
        }
    }

    /// Create from the `PEXELS_API_KEY` environment variable
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("PEXELS_API_KEY")
            .map_err(|_| SearchError::Config("PEXELS_API_KEY not set".into()))?;
        Ok(Self::new(api_key))
    }
}

#[derive(Debug, Deserialize)]
struct PexelsResponse {
    #[serde(default)]
    photos: Vec<PexelsPhoto>,
}

#[derive(Debug, Deserialize)]
struct PexelsPhoto {
    /// Page URL on pexels.com
    url: String,
    #[serde(default)]
    alt: String,
    #[serde(default)]
    photographer: String,
    src: PexelsSrc,
}

#[derive(Debug, Deserialize)]
struct PexelsSrc {
    large: String,
}

impl PexelsPhoto {
    fn into_result(self) -> ImageResult {
        let title = if self.alt.trim().is_empty() {
            format!("Photo by {}", self.photographer)
        } else {
            self.alt
        };

        ImageResult {
            url: self.src.large,
            page_url: self.url,
            title,
            source_label: "Pexels".into(),
        }
    }
}

#[async_trait]
impl ImageProvider for PexelsProvider {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ImageResult>> {
        let per_page = limit.clamp(1, MAX_PER_PAGE);

        let response = self
            .client
            .get(SEARCH_URL)
            .header(reqwest::header::AUTHORIZATION, &self.api_key)
            .query(&[("query", query), ("per_page", &per_page.to_string())])
            .send()
            .await?
            .error_for_status()?
            .json::<PexelsResponse>()
            .await?;

        Ok(response
            .photos
            .into_iter()
            .map(PexelsPhoto::into_result)
            .collect())
    }

    fn name(&self) -> &str {
        "pexels"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_decoding() {
        let body = serde_json::json!({
            "page": 1,
            "per_page": 2,
            "photos": [
                {
                    "url": "https://www.pexels.com/photo/123/",
                    "alt": "A brown bear",
                    "photographer": "Jane",
                    "src": { "large": "https://images.pexels.com/123/large.jpg" }
                },
                {
                    "url": "https://www.pexels.com/photo/456/",
                    "alt": "",
                    "photographer": "John",
                    "src": { "large": "https://images.pexels.com/456/large.jpg" }
                }
            ]
        });

        let parsed: PexelsResponse = serde_json::from_value(body).unwrap();
        let results: Vec<ImageResult> = parsed
            .photos
            .into_iter()
            .map(PexelsPhoto::into_result)
            .collect();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].url, "https://images.pexels.com/123/large.jpg");
        assert_eq!(results[0].title, "A brown bear");
        assert_eq!(results[1].title, "Photo by John");
        assert_eq!(results[1].source_label, "Pexels");
    }

    #[test]
    fn test_missing_photos_field_is_empty() {
        let parsed: PexelsResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(parsed.photos.is_empty());
    }
}
