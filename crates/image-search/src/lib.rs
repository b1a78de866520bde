//! # image-search
//!
//! Best-effort image search over an ordered chain of free public
//! providers. Each provider adapter normalizes its native response into a
//! common shape; the aggregator walks the chain with bounded timeouts,
//! deduplicates by image URL, and caps the merged list.
//!
//! Failures never leave this crate: a provider that errors, times out, or
//! comes back empty is logged and skipped, and a fully dry run still
//! returns a well-formed response with static search links.

pub mod aggregator;
pub mod error;
pub mod model;
pub mod provider;

pub use aggregator::{ImageSearchAggregator, static_sources};
pub use error::{Result, SearchError};
pub use model::{ImageResult, SearchOutcome, SourceLink};
pub use provider::{ImageProvider, LoremFlickrProvider, PexelsProvider, PixabayProvider};
