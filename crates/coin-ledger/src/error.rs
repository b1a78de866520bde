//! Ledger Error Types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Entitlement-path errors
#[derive(Error, Debug)]
pub enum LedgerError {
    /// Webhook signature missing, stale, or mismatched
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    /// Webhook payload does not parse into the event shape
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Event carries no user identity
    #[error("Event carries no user key")]
    MissingUserKey,

    /// Plan name is not a purchasable tier
    #[error("Unknown plan: {0}")]
    UnknownPlan(String),

    /// Backing persistence unreachable; the event source should redeliver
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Stored record for one key fails to parse; other keys are unaffected
    #[error("Corrupt record for {user_key}: {reason}")]
    CorruptRecord { user_key: String, reason: String },

    /// Store file is not parseable at all
    #[error("Corrupt store file: {0}")]
    CorruptStore(String),

    /// Stripe API error
    #[error("Stripe error: {0}")]
    Stripe(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl LedgerError {
    /// Whether the event source should retry delivery
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LedgerError::StoreUnavailable(_) | LedgerError::Stripe(_)
        )
    }
}
