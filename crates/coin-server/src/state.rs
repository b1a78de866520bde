//! Application State

use std::sync::Arc;

use coin_ledger::{JsonEntitlementStore, StripeClient, WebhookHandler};
use image_search::ImageSearchAggregator;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Entitlement store; every read goes through here, every write
    /// through the webhook handler's applier
    pub store: Arc<JsonEntitlementStore>,

    /// Verify-then-apply webhook pipeline
    pub webhook: Arc<WebhookHandler>,

    /// Stripe client (None if not configured - checkout disabled)
    pub stripe: Option<Arc<StripeClient>>,

    /// Image provider fallback chain
    pub images: Arc<ImageSearchAggregator>,
}
