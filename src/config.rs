//! Service configuration
//!
//! Server and currency naming, storage paths and the giveaway cadence live
//! here and are injected into the services at construction; there is no
//! ambient global state.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EconomyConfig {
    /// Display name of the hosting server, used in replies.
    pub server_name: String,
    /// Currency name, singular form.
    pub currency_name: String,
    /// Currency name, plural form.
    pub currency_plural: String,
    /// Path of the sqlite balance database.
    pub database_path: String,
    /// Path of the append-only transaction log.
    pub audit_log_path: String,
    /// Seconds between giveaway progress announcements.
    pub giveaway_tick_secs: u64,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            server_name: "Impulse".to_string(),
            currency_name: "Pokédollar".to_string(),
            currency_plural: "Pokédollars".to_string(),
            database_path: "./economy.db".to_string(),
            audit_log_path: "./logs/transactions.log".to_string(),
            giveaway_tick_secs: 10,
        }
    }
}

impl EconomyConfig {
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        let mut config = Self::default();

        if let Ok(v) = std::env::var("ECONOMY_SERVER_NAME") {
            config.server_name = v;
        }
        if let Ok(v) = std::env::var("ECONOMY_CURRENCY_NAME") {
            config.currency_name = v;
        }
        if let Ok(v) = std::env::var("ECONOMY_CURRENCY_PLURAL") {
            config.currency_plural = v;
        }
        if let Ok(v) = std::env::var("ECONOMY_DATABASE_PATH") {
            config.database_path = v;
        }
        if let Ok(v) = std::env::var("ECONOMY_AUDIT_LOG_PATH") {
            config.audit_log_path = v;
        }
        if let Ok(v) = std::env::var("ECONOMY_GIVEAWAY_TICK_SECS") {
            if let Ok(secs) = v.parse() {
                config.giveaway_tick_secs = secs;
            }
        }

        config
    }

    /// Pick the grammatically correct currency noun for an amount.
    pub fn currency(&self, amount: i64) -> &str {
        if amount == 1 {
            &self.currency_name
        } else {
            &self.currency_plural
        }
    }
}
