//! Entitlement Records and Plans
//!
//! The per-user entitlement record and the plan/coin configuration table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{LedgerError, Result};

/// Plan tiers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    None,
    Starter,
    Pro,
    Business,
}

impl Plan {
    pub fn as_str(&self) -> &str {
        match self {
            Plan::None => "none",
            Plan::Starter => "starter",
            Plan::Pro => "pro",
            Plan::Business => "business",
        }
    }

    /// Parse a plan name; unknown names fall back to `None`
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "starter" => Plan::Starter,
            "pro" => Plan::Pro,
            "business" => Plan::Business,
            _ => Plan::None,
        }
    }

    /// Parse a plan name, rejecting anything that is not a purchasable tier
    pub fn parse_strict(s: &str) -> Result<Self> {
        match Self::from_str(s) {
            Plan::None => Err(LedgerError::UnknownPlan(s.to_string())),
            plan => Ok(plan),
        }
    }

    /// Monthly generation limits for this tier
    pub fn limits(&self) -> PlanLimits {
        match self {
            Plan::None => PlanLimits {
                videos: 0,
                images: 0,
                auto_generates: 0,
            },
            Plan::Starter => PlanLimits {
                videos: 5,
                images: 20,
                auto_generates: 10,
            },
            Plan::Pro => PlanLimits {
                videos: 30,
                images: 120,
                auto_generates: 60,
            },
            Plan::Business => PlanLimits {
                videos: 120,
                images: 500,
                auto_generates: 250,
            },
        }
    }
}

impl Default for Plan {
    fn default() -> Self {
        Plan::None
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Monthly usage limits attached to a plan tier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLimits {
    pub videos: u32,
    pub images: u32,
    pub auto_generates: u32,
}

/// One entitlement record per user identity
///
/// `user_key` is an opaque user id (never an email). `coins` only ever
/// increases through the applier; `last_event_id` makes reapplying an
/// already-seen event a no-op.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserEntitlement {
    /// Canonical user identity
    pub user_key: String,

    /// Coin balance
    pub coins: u64,

    /// Plan tier
    pub plan: Plan,

    /// Whether any payment has been applied
    pub paid: bool,

    /// Event id of the most recent successfully applied event
    #[serde(default)]
    pub last_event_id: String,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last mutation timestamp
    pub updated_at: DateTime<Utc>,
}

impl UserEntitlement {
    /// Zero-value record for a previously unknown user
    pub fn new(user_key: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            user_key: user_key.into(),
            coins: 0,
            plan: Plan::None,
            paid: false,
            last_event_id: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Injected plan → coin-delta mapping
///
/// The single source of truth for how many coins each plan purchase
/// credits. Plans absent from the table resolve to a delta of 0.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlanTable {
    coins: HashMap<Plan, u64>,
}

impl Default for PlanTable {
    fn default() -> Self {
        Self {
            coins: HashMap::from([
                (Plan::Starter, 50),
                (Plan::Pro, 150),
                (Plan::Business, 500),
            ]),
        }
    }
}

impl PlanTable {
    /// Coin delta for a raw plan name; unknown names yield 0
    pub fn coins_for(&self, plan_name: &str) -> u64 {
        self.coins
            .get(&Plan::from_str(plan_name))
            .copied()
            .unwrap_or(0)
    }

    /// Parse a table from its `COIN_TABLE` string form,
    /// e.g. `starter=50,pro=150,business=500`
    pub fn parse(s: &str) -> Result<Self> {
        let mut coins = HashMap::new();
        for entry in s.split(',').filter(|e| !e.trim().is_empty()) {
            let (name, delta) = entry
                .split_once('=')
                .ok_or_else(|| LedgerError::Config(format!("bad coin table entry: {entry}")))?;
            let plan = Plan::parse_strict(name.trim())?;
            let delta: u64 = delta
                .trim()
                .parse()
                .map_err(|_| LedgerError::Config(format!("bad coin delta: {entry}")))?;
            coins.insert(plan, delta);
        }
        Ok(Self { coins })
    }

    /// Read the table from the `COIN_TABLE` environment variable,
    /// falling back to the defaults when unset
    pub fn from_env() -> Result<Self> {
        match std::env::var("COIN_TABLE") {
            Ok(s) => Self::parse(&s),
            Err(_) => Ok(Self::default()),
        }
    }
}
