//! Search Result Model

use serde::{Deserialize, Serialize};

/// One normalized image, whatever provider it came from
///
/// `url` is the identity used for deduplication.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageResult {
    /// Direct image URL
    pub url: String,

    /// Human-browsable page the image lives on
    pub page_url: String,

    /// Short caption or alt text
    pub title: String,

    /// Provider the result came from
    pub source_label: String,
}

/// A human-browsable search link
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLink {
    pub title: String,
    pub url: String,
}

/// Aggregated search response
///
/// Always well-formed: a run where every provider fails still yields an
/// empty `images` list and the static `sources` links.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub images: Vec<ImageResult>,
    pub sources: Vec<SourceLink>,
}
