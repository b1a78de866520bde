//! Stripe Checkout Integration
//!
//! Hosted checkout sessions for one-time coin-pack purchases. Stateless
//! pass-through: the credit itself lands later via the webhook.

use serde::{Deserialize, Serialize};
use stripe::{
    CheckoutSession as StripeCheckoutSession, CheckoutSessionMode, Client,
    CreateCheckoutSession, CreateCheckoutSessionLineItems,
    CreateCheckoutSessionLineItemsPriceData,
    CreateCheckoutSessionLineItemsPriceDataProductData, Currency,
};

use crate::entitlement::Plan;
use crate::error::{LedgerError, Result};

/// Stripe client wrapper
pub struct StripeClient {
    client: Client,
    webhook_secret: String,
}

impl StripeClient {
    pub fn new(secret_key: &str, webhook_secret: &str) -> Self {
        Self {
            client: Client::new(secret_key),
            webhook_secret: webhook_secret.to_string(),
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let secret_key = std::env::var("STRIPE_SECRET_KEY")
            .map_err(|_| LedgerError::Config("STRIPE_SECRET_KEY not set".into()))?;
        let webhook_secret = std::env::var("STRIPE_WEBHOOK_SECRET")
            .map_err(|_| LedgerError::Config("STRIPE_WEBHOOK_SECRET not set".into()))?;

        Ok(Self::new(&secret_key, &webhook_secret))
    }

    /// Shared secret for webhook verification
    pub fn webhook_secret(&self) -> &str {
        &self.webhook_secret
    }

    /// Create a hosted checkout session
    ///
    /// Returns a URL to redirect the user to Stripe's checkout page. The
    /// user key and plan ride along in the session metadata so the webhook
    /// can key the credit.
    pub async fn create_checkout_session(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession> {
        let pricing = request.plan.pricing();

        let mut params = CreateCheckoutSession::new();
        params.client_reference_id = Some(&request.user_key);
        params.success_url = Some(&request.success_url);
        params.cancel_url = Some(&request.cancel_url);
        params.mode = Some(CheckoutSessionMode::Payment);

        let mut metadata = std::collections::HashMap::new();
        metadata.insert("plan".to_string(), request.plan.as_str().to_string());
        metadata.insert("user_key".to_string(), request.user_key.clone());
        params.metadata = Some(metadata);

        params.line_items = Some(vec![CreateCheckoutSessionLineItems {
            quantity: Some(1),
            price_data: Some(CreateCheckoutSessionLineItemsPriceData {
                currency: Currency::USD,
                unit_amount: Some(pricing.cents),
                product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                    name: pricing.name.clone(),
                    description: Some(pricing.description.clone()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }]);

        let session = StripeCheckoutSession::create(&self.client, params)
            .await
            .map_err(|e| LedgerError::Stripe(e.to_string()))?;

        let checkout_url = session
            .url
            .ok_or_else(|| LedgerError::Stripe("No checkout URL returned".into()))?;

        Ok(CheckoutSession {
            id: session.id.to_string(),
            checkout_url,
            plan: request.plan,
        })
    }

    /// Get the underlying Stripe client
    pub fn inner(&self) -> &Client {
        &self.client
    }
}

/// Request to create a checkout session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutRequest {
    /// Plan (coin pack) to purchase
    pub plan: Plan,

    /// User the purchase belongs to
    pub user_key: String,

    /// URL to redirect after successful payment
    pub success_url: String,

    /// URL to redirect if checkout is cancelled
    pub cancel_url: String,
}

/// Result of creating a checkout session
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CheckoutSession {
    /// Stripe session id
    pub id: String,

    /// URL to redirect user to
    pub checkout_url: String,

    /// Plan being purchased
    pub plan: Plan,
}

/// Pricing information for a coin pack
#[derive(Clone, Debug)]
pub struct PlanPricing {
    pub name: String,
    pub description: String,
    pub cents: i64,
}

impl Plan {
    /// Pricing for this plan's coin pack
    pub fn pricing(&self) -> PlanPricing {
        match self {
            Plan::None => PlanPricing {
                name: "Free".into(),
                description: "No coin pack".into(),
                cents: 0,
            },
            Plan::Starter => PlanPricing {
                name: "Starter Pack".into(),
                description: "50 coins".into(),
                cents: 499,
            },
            Plan::Pro => PlanPricing {
                name: "Pro Pack".into(),
                description: "150 coins, priority rendering".into(),
                cents: 1499,
            },
            Plan::Business => PlanPricing {
                name: "Business Pack".into(),
                description: "500 coins, priority rendering, team sharing".into(),
                cents: 4999,
            },
        }
    }
}
