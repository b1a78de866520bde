//! coin-backend HTTP Server
//!
//! Axum-based server exposing the payment webhook, checkout, entitlement
//! query, stats, and intent endpoints. All entitlement mutation flows
//! through the ledger's atomic store; image search degrades through the
//! provider fallback chain.

mod handlers;
mod state;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use coin_ledger::{
    EntitlementApplier, EventVerifier, JsonEntitlementStore, PlanTable, StripeClient,
    WebhookHandler,
};
use image_search::{
    ImageProvider, ImageSearchAggregator, LoremFlickrProvider, PexelsProvider, PixabayProvider,
};

use crate::handlers::{
    create_checkout, entitlement_status, health_check, intent, payment_webhook, user_stats,
};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    // Open the entitlement store
    let users_file = std::env::var("USERS_FILE").unwrap_or_else(|_| "users.json".into());
    let store = Arc::new(JsonEntitlementStore::open(&users_file).await?);

    // Plan -> coin table
    let plan_table = match PlanTable::from_env() {
        Ok(table) => table,
        Err(e) => {
            tracing::warn!("⚠ Bad COIN_TABLE ({e}) - using defaults");
            PlanTable::default()
        }
    };

    // Webhook verification
    let webhook_secret = std::env::var("WEBHOOK_SECRET")
        .or_else(|_| std::env::var("STRIPE_WEBHOOK_SECRET"))
        .unwrap_or_default();
    if webhook_secret.is_empty() {
        tracing::warn!("⚠ No webhook secret configured - all events will be rejected");
        tracing::warn!("  Set WEBHOOK_SECRET or STRIPE_WEBHOOK_SECRET in .env");
    }

    let webhook = Arc::new(WebhookHandler::new(
        EventVerifier::new(webhook_secret),
        EntitlementApplier::new(store.clone(), plan_table),
    ));

    // Stripe checkout
    let stripe = StripeClient::from_env().ok().map(Arc::new);
    if stripe.is_some() {
        tracing::info!("✓ Stripe configured");
    } else {
        tracing::warn!("⚠ Stripe not configured - checkout disabled");
        tracing::warn!("  Set STRIPE_SECRET_KEY and STRIPE_WEBHOOK_SECRET in .env");
    }

    // Image provider fallback chain, in priority order
    let mut providers: Vec<Arc<dyn ImageProvider>> = Vec::new();
    match PexelsProvider::from_env() {
        Ok(provider) => {
            tracing::info!("✓ Pexels configured");
            providers.push(Arc::new(provider));
        }
        Err(_) => tracing::warn!("⚠ Pexels not configured - skipping (set PEXELS_API_KEY)"),
    }
    match PixabayProvider::from_env() {
        Ok(provider) => {
            tracing::info!("✓ Pixabay configured");
            providers.push(Arc::new(provider));
        }
        Err(_) => tracing::warn!("⚠ Pixabay not configured - skipping (set PIXABAY_API_KEY)"),
    }
    providers.push(Arc::new(LoremFlickrProvider::new()));

    let images = Arc::new(ImageSearchAggregator::new(providers));

    // Build application state
    let state = AppState {
        store,
        webhook,
        stripe,
        images,
    };

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build router
    let app = Router::new()
        .route("/health", get(health_check))
        .route("/webhook/stripe", post(payment_webhook))
        .route("/api/entitlement", post(entitlement_status))
        .route("/api/stats", post(user_stats))
        .route("/api/checkout", post(create_checkout))
        .route("/api/intent", post(intent))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("🚀 coin-server running on http://{}", addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health           - Health check");
    tracing::info!("  POST /webhook/stripe   - Payment webhook");
    tracing::info!("  POST /api/entitlement  - Paid-status query");
    tracing::info!("  POST /api/stats        - Usage stats");
    tracing::info!("  POST /api/checkout     - Create checkout session");
    tracing::info!("  POST /api/intent       - Intent envelope (image search)");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
