//! # coin-ledger
//!
//! Idempotent entitlement ledger for coin-backend: verified payment events
//! credit coins, a plan tier, and a paid flag to per-user records, exactly
//! once, under concurrent and retried webhook delivery.
//!
//! ## Data flow
//!
//! ```text
//! ┌──────────────┐   ┌────────────────────┐   ┌──────────────────┐
//! │ EventVerifier│──▶│ EntitlementApplier │──▶│ EntitlementStore │
//! │ (HMAC check) │   │ (plan → coin delta)│   │ (atomic update)  │
//! └──────────────┘   └────────────────────┘   └──────────────────┘
//! ```
//!
//! The store is the only shared mutable resource. Its `atomic_update`
//! contract serializes per-key access, short-circuits already-applied
//! event ids, and persists before returning — the three properties the
//! webhook path depends on.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use coin_ledger::{
//!     EntitlementApplier, EventVerifier, JsonEntitlementStore, PlanTable,
//!     WebhookHandler,
//! };
//!
//! let store = Arc::new(JsonEntitlementStore::open("users.json").await?);
//! let handler = WebhookHandler::new(
//!     EventVerifier::new(secret),
//!     EntitlementApplier::new(store, PlanTable::from_env()?),
//! );
//!
//! let record = handler.handle(&body, &signature_header).await?;
//! ```

mod applier;
mod checkout;
mod entitlement;
mod error;
mod store;
mod verifier;

pub use applier::{EntitlementApplier, WebhookHandler};
pub use checkout::{CheckoutRequest, CheckoutSession, PlanPricing, StripeClient};
pub use entitlement::{Plan, PlanLimits, PlanTable, UserEntitlement};
pub use error::{LedgerError, Result};
pub use store::{EntitlementStore, JsonEntitlementStore, MemoryEntitlementStore, UpdateFn};
pub use verifier::{EventVerifier, PaymentEvent};
