//! Image Providers
//!
//! Adapters for free public image APIs, behind one strategy trait.

mod loremflickr;
mod pexels;
mod pixabay;

pub use loremflickr::LoremFlickrProvider;
pub use pexels::PexelsProvider;
pub use pixabay::PixabayProvider;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::ImageResult;

/// Image provider trait (Strategy pattern)
///
/// Implement this per provider. A provider reports its own failures and
/// empty result sets as-is; the aggregator decides what falling back means.
#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Search for up to `limit` images matching `query`
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<ImageResult>>;

    /// Provider name (for logs and `source_label`)
    fn name(&self) -> &str;
}
