//! Pixabay Provider
//!
//! Secondary provider; key travels in the query string, hits carry
//! ready-made thumbnails.

use async_trait::async_trait;
use serde::Deserialize;

use super::ImageProvider;
use crate::error::{Result, SearchError};
use crate::model::ImageResult;

const SEARCH_URL: &str = "https://pixabay.com/api/";

/// Pixabay caps `per_page` at 200; 3 is the minimum it accepts
const MAX_PER_PAGE: usize = 200;

pub struct PixabayProvider {
    client: reqwest::Client,
    api_key: String,
}

impl PixabayProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
        }
    }

    /// Create from the `PIXABAY_API_KEY` environment variable
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("PIXABAY_API_KEY")
            .map_err(|_| SearchError::Config("PIXABAY_API_KEY not set".into()))?;
        Ok(Self::new(api_key))
    }
}

#[derive(Debug, Deserialize)]
struct PixabayResponse {
    #[serde(default)]
    hits: Vec<PixabayHit>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PixabayHit {
    webformat_url: String,
    page_url: String,
    #[serde(default)]
    tags: String,
}

impl PixabayHit {
    fn into_result(self) -> ImageResult {
        ImageResult {
            url: self.webformat_url,
            page_url: self.page_url,
            title: self.tags,
            source_label: "Pixabay".into(),
        }
    }
}

#[async_trait]
impl ImageProvider for PixabayProvider {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ImageResult>> {
        let per_page = limit.clamp(3, MAX_PER_PAGE);

        let response = self
            .client
            .get(SEARCH_URL)
            .query(&[
                ("key", self.api_key.as_str()),
                ("q", query),
                ("image_type", "photo"),
                ("safesearch", "true"),
                ("per_page", &per_page.to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<PixabayResponse>()
            .await?;

        Ok(response
            .hits
            .into_iter()
            .take(limit)
            .map(PixabayHit::into_result)
            .collect())
    }

    fn name(&self) -> &str {
        "pixabay"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_decoding() {
        let body = serde_json::json!({
            "total": 1,
            "hits": [
                {
                    "webformatURL": "https://cdn.pixabay.com/photo/1_640.jpg",
                    "previewURL": "https://cdn.pixabay.com/photo/1_150.jpg",
                    "pageURL": "https://pixabay.com/photos/bear-1/",
                    "tags": "bear, forest, wildlife"
                }
            ]
        });

        let parsed: PixabayResponse = serde_json::from_value(body).unwrap();
        let result = parsed.hits.into_iter().next().unwrap().into_result();

        assert_eq!(result.url, "https://cdn.pixabay.com/photo/1_640.jpg");
        assert_eq!(result.page_url, "https://pixabay.com/photos/bear-1/");
        assert_eq!(result.title, "bear, forest, wildlife");
        assert_eq!(result.source_label, "Pixabay");
    }
}
