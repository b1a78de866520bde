//! HTTP Handlers

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};

use coin_ledger::{
    CheckoutRequest as LedgerCheckoutRequest, EntitlementStore, LedgerError, Plan, PlanLimits,
};
use image_search::SearchOutcome;

use crate::state::AppState;

/// Webhook signature header
const SIGNATURE_HEADER: &str = "stripe-signature";

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub stripe_configured: bool,
    pub store_path: String,
}

#[derive(Serialize)]
pub struct AckResponse {
    pub received: bool,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct UserKeyRequest {
    #[serde(default)]
    pub user_key: String,
}

#[derive(Serialize)]
pub struct EntitlementResponse {
    pub paid: bool,
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub coins: u64,
    pub plan: Plan,
    pub paid: bool,
    pub limits: PlanLimits,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutRequest {
    pub user_key: String,
    pub plan: String,
    pub success_url: String,
    pub cancel_url: String,
}

#[derive(Serialize)]
pub struct CheckoutResponse {
    pub url: String,
    pub session_id: String,
}

#[derive(Debug, Deserialize)]
pub struct IntentRequest {
    pub prompt: String,
}

#[derive(Serialize)]
pub struct IntentResponse {
    pub markdown: String,
    pub cards: Vec<ImageCard>,
    pub suggestions: Vec<String>,
}

#[derive(Serialize)]
pub struct ImageCard {
    pub kind: &'static str,
    pub url: String,
    pub page_url: String,
    pub title: String,
    pub source: String,
}

type HandlerError = (StatusCode, Json<ErrorResponse>);

fn error_body(status: StatusCode, code: &str, error: impl Into<String>) -> HandlerError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
        }),
    )
}

/// Map ledger errors onto the 4xx/5xx split: verification and applier
/// errors are the sender's problem, store errors ask for redelivery.
fn ledger_error(err: &LedgerError) -> HandlerError {
    let (status, code) = match err {
        LedgerError::InvalidSignature(_) => (StatusCode::BAD_REQUEST, "INVALID_SIGNATURE"),
        LedgerError::MalformedPayload(_) => (StatusCode::BAD_REQUEST, "MALFORMED_PAYLOAD"),
        LedgerError::MissingUserKey => (StatusCode::BAD_REQUEST, "MISSING_USER_KEY"),
        LedgerError::UnknownPlan(_) => (StatusCode::BAD_REQUEST, "UNKNOWN_PLAN"),
        LedgerError::StoreUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "STORE_UNAVAILABLE"),
        LedgerError::CorruptRecord { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "CORRUPT_RECORD"),
        LedgerError::CorruptStore(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CORRUPT_STORE"),
        LedgerError::Stripe(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STRIPE_ERROR"),
        LedgerError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
    };
    error_body(status, code, err.to_string())
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        stripe_configured: state.stripe.is_some(),
        store_path: state.store.path().display().to_string(),
    })
}

/// Payment webhook endpoint
///
/// Body stays raw bytes: the signature covers the exact payload the
/// provider sent.
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<AckResponse>, HandlerError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            error_body(
                StatusCode::BAD_REQUEST,
                "MISSING_SIGNATURE",
                "Missing signature header",
            )
        })?;

    match state.webhook.handle(&body, signature).await {
        Ok(_) => Ok(Json(AckResponse { received: true })),
        Err(e) => {
            if e.is_retryable() {
                tracing::error!(error = %e, "webhook processing failed, asking for redelivery");
            } else {
                tracing::warn!(error = %e, "webhook rejected");
            }
            Err(ledger_error(&e))
        }
    }
}

/// Entitlement query endpoint
pub async fn entitlement_status(
    State(state): State<AppState>,
    Json(payload): Json<UserKeyRequest>,
) -> Result<Json<EntitlementResponse>, HandlerError> {
    if payload.user_key.trim().is_empty() {
        return Err(error_body(
            StatusCode::BAD_REQUEST,
            "MISSING_USER_KEY",
            "user_key is required",
        ));
    }

    let record = state
        .store
        .get(&payload.user_key)
        .await
        .map_err(|e| ledger_error(&e))?;

    Ok(Json(EntitlementResponse {
        paid: record.is_some_and(|r| r.paid),
    }))
}

/// Usage stats endpoint: entitlement summary plus the plan's limits
pub async fn user_stats(
    State(state): State<AppState>,
    Json(payload): Json<UserKeyRequest>,
) -> Result<Json<StatsResponse>, HandlerError> {
    if payload.user_key.trim().is_empty() {
        return Err(error_body(
            StatusCode::BAD_REQUEST,
            "MISSING_USER_KEY",
            "user_key is required",
        ));
    }

    let record = state
        .store
        .get(&payload.user_key)
        .await
        .map_err(|e| ledger_error(&e))?;

    let (coins, plan, paid) = record
        .map(|r| (r.coins, r.plan, r.paid))
        .unwrap_or((0, Plan::None, false));

    Ok(Json(StatsResponse {
        coins,
        plan,
        paid,
        limits: plan.limits(),
    }))
}

/// Create a hosted checkout session
pub async fn create_checkout(
    State(state): State<AppState>,
    Json(payload): Json<CheckoutRequest>,
) -> Result<Json<CheckoutResponse>, HandlerError> {
    let stripe = state.stripe.as_ref().ok_or_else(|| {
        error_body(
            StatusCode::SERVICE_UNAVAILABLE,
            "PAYMENTS_DISABLED",
            "Payments not configured",
        )
    })?;

    if payload.user_key.trim().is_empty() {
        return Err(error_body(
            StatusCode::BAD_REQUEST,
            "MISSING_USER_KEY",
            "user_key is required",
        ));
    }

    let plan = Plan::parse_strict(&payload.plan).map_err(|e| ledger_error(&e))?;

    let request = LedgerCheckoutRequest {
        plan,
        user_key: payload.user_key,
        success_url: payload.success_url,
        cancel_url: payload.cancel_url,
    };

    let session = stripe.create_checkout_session(request).await.map_err(|e| {
        tracing::error!(error = %e, "checkout session creation failed");
        ledger_error(&e)
    })?;

    Ok(Json(CheckoutResponse {
        url: session.checkout_url,
        session_id: session.id,
    }))
}

/// Generic intent endpoint
///
/// Image-intent prompts run the provider chain; everything else gets a
/// plain help envelope. Search failures never surface here - the
/// aggregator already absorbed them.
pub async fn intent(
    State(state): State<AppState>,
    Json(payload): Json<IntentRequest>,
) -> Json<IntentResponse> {
    let Some(query) = extract_image_query(&payload.prompt) else {
        return Json(IntentResponse {
            markdown: "I can search for images. Try: `images: brown bear` \
                       or \"show me photos of mountains\"."
                .into(),
            cards: Vec::new(),
            suggestions: vec![
                "images: sunset".into(),
                "show me photos of mountains".into(),
                "nature wallpapers".into(),
            ],
        });
    };

    let outcome = state.images.search(&query).await;
    let markdown = render_markdown(&query, &outcome);

    let cards = outcome
        .images
        .into_iter()
        .map(|image| ImageCard {
            kind: "image",
            url: image.url,
            page_url: image.page_url,
            title: image.title,
            source: image.source_label,
        })
        .collect();

    Json(IntentResponse {
        markdown,
        cards,
        suggestions: vec![
            format!("more {query} images"),
            format!("{query} wallpapers"),
        ],
    })
}

fn render_markdown(query: &str, outcome: &SearchOutcome) -> String {
    let mut markdown = if outcome.images.is_empty() {
        format!("No images found for \"{query}\" - try the sources below.\n\n")
    } else {
        format!("Found {} images for \"{query}\".\n\n", outcome.images.len())
    };

    markdown.push_str("Sources:\n");
    for source in &outcome.sources {
        markdown.push_str(&format!("- [{}]({})\n", source.title, source.url));
    }
    markdown
}

/// Pull the search query out of an image-intent prompt
///
/// Accepts an explicit `images: <query>` prefix or a prompt containing an
/// image trigger word; returns None when there is nothing to search for.
fn extract_image_query(prompt: &str) -> Option<String> {
    const TRIGGERS: &[&str] = &[
        "image", "images", "photo", "photos", "picture", "pictures", "pic", "pics", "wallpaper",
        "wallpapers",
    ];
    const FILLERS: &[&str] = &[
        "show", "me", "find", "get", "search", "for", "of", "some", "a", "an", "the", "please",
    ];

    let prompt = prompt.trim();
    let lowered = prompt.to_lowercase();

    for prefix in ["images:", "image:"] {
        if lowered.starts_with(prefix) {
            let query = prompt[prefix.len()..].trim();
            return (!query.is_empty()).then(|| query.to_string());
        }
    }

    let words: Vec<&str> = lowered.split_whitespace().collect();
    if !words.iter().any(|w| TRIGGERS.contains(w)) {
        return None;
    }

    let query: Vec<&str> = words
        .iter()
        .filter(|w| !TRIGGERS.contains(*w) && !FILLERS.contains(*w))
        .copied()
        .collect();

    (!query.is_empty()).then(|| query.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_image_query_prefix() {
        assert_eq!(
            extract_image_query("images: Brown Bear"),
            Some("Brown Bear".into())
        );
        assert_eq!(extract_image_query("images:   "), None);
    }

    #[test]
    fn test_extract_image_query_trigger_words() {
        assert_eq!(
            extract_image_query("show me photos of mountains"),
            Some("mountains".into())
        );
        assert_eq!(extract_image_query("what time is it"), None);
        assert_eq!(extract_image_query("images"), None);
    }
}
