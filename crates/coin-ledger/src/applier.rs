//! Entitlement Application
//!
//! Maps a verified payment event to a credit and applies it through the
//! store's atomic-update contract.

use std::sync::Arc;

use chrono::Utc;

use crate::entitlement::{Plan, PlanTable, UserEntitlement};
use crate::error::{LedgerError, Result};
use crate::store::EntitlementStore;
use crate::verifier::{EventVerifier, PaymentEvent};

/// Applies verified events to the entitlement store
///
/// The plan table is injected; an event whose plan name is unknown credits
/// 0 coins but still marks the user paid and records the event id, so a
/// mis-labelled paid event is neither dropped nor double-applied later.
pub struct EntitlementApplier {
    store: Arc<dyn EntitlementStore>,
    plan_table: PlanTable,
}

impl EntitlementApplier {
    pub fn new(store: Arc<dyn EntitlementStore>, plan_table: PlanTable) -> Self {
        Self { store, plan_table }
    }

    /// Credit the event's user; idempotent per event id
    pub async fn apply(&self, event: &PaymentEvent) -> Result<UserEntitlement> {
        if event.user_key.trim().is_empty() {
            return Err(LedgerError::MissingUserKey);
        }

        let plan = Plan::from_str(&event.plan);
        let delta = self.plan_table.coins_for(&event.plan);
        if delta == 0 {
            tracing::warn!(
                event_id = %event.event_id,
                plan = %event.plan,
                "plan not in coin table, crediting 0"
            );
        }

        let event_id = event.event_id.clone();
        let record = self
            .store
            .atomic_update(
                &event.user_key,
                &event.event_id,
                Box::new(move |mut record| {
                    record.coins += delta;
                    record.plan = plan;
                    record.paid = true;
                    record.last_event_id = event_id;
                    record.updated_at = Utc::now();
                    record
                }),
            )
            .await?;

        tracing::info!(
            event_id = %event.event_id,
            user_key = %event.user_key,
            plan = %record.plan,
            coins = record.coins,
            "applied payment event"
        );

        Ok(record)
    }
}

/// Webhook glue: verify, then apply
///
/// Verification failures return before any store access.
pub struct WebhookHandler {
    verifier: EventVerifier,
    applier: EntitlementApplier,
}

impl WebhookHandler {
    pub fn new(verifier: EventVerifier, applier: EntitlementApplier) -> Self {
        Self { verifier, applier }
    }

    /// Process a raw webhook delivery
    pub async fn handle(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<UserEntitlement> {
        let event = self.verifier.verify(payload, signature_header)?;
        self.applier.apply(&event).await
    }
}
