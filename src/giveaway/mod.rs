//! Timed giveaways
//!
//! A giveaway stakes currency from its initiator the moment it starts, runs
//! a countdown with periodic progress announcements, then awards the stake
//! to one randomly drawn member of the eligibility snapshot (the users who
//! were online at start time). Giveaways live only in memory: a process
//! restart abandons them, stake included.

mod scheduler;

use crate::config::EconomyConfig;
use crate::directory::UserDirectory;
use crate::error::{EconomyError, Result};
use crate::ledger::Ledger;
use crate::models::UserId;
use chrono::Utc;
use parking_lot::Mutex;
use scheduler::GiveawayTask;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::info;

pub const MIN_STAKE: i64 = 1;
pub const MAX_STAKE: i64 = 1000;
pub const MIN_DURATION_SECS: u64 = 30;
pub const MAX_DURATION_SECS: u64 = 300;

/// Lifecycle of one giveaway. The stake is withdrawn before the task
/// exists, so a giveaway is `Active` from its first instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GiveawayStatus {
    Active,
    Resolved,
    Canceled,
}

/// How a giveaway task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GiveawayEnd {
    /// Stake credited to the drawn winner.
    Won(UserId),
    /// Nobody from the snapshot was still online. The stake is not
    /// refunded; it leaves circulation.
    NoWinner,
    /// Stopped before resolution (shutdown or an explicit cancel). The
    /// stake stays withdrawn, same as a process restart.
    Abandoned,
}

/// Announcements emitted over the manager's broadcast channel. The host
/// renders these into room messages and mirrors them as tagged JSON on its
/// debug feed; amounts stay structured so it can apply its own currency
/// naming.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GiveawayEvent {
    Started {
        id: String,
        initiator: String,
        amount: i64,
        duration_secs: u64,
    },
    Progress {
        id: String,
        remaining_secs: u64,
    },
    Won {
        id: String,
        initiator: String,
        winner: String,
        amount: i64,
    },
    Canceled {
        id: String,
        amount: i64,
    },
}

pub(crate) enum GiveawayControl {
    /// Run the resolution step immediately instead of at the deadline.
    ResolveNow,
    /// Stop without resolving.
    Cancel,
}

/// Control surface for one running giveaway. Tests and shutdown paths use
/// it to trigger or cancel the resolution step deterministically instead of
/// waiting out the wall clock.
#[derive(Debug)]
pub struct GiveawayHandle {
    pub id: String,
    control: mpsc::Sender<GiveawayControl>,
    task: JoinHandle<GiveawayEnd>,
}

impl GiveawayHandle {
    pub async fn resolve_now(&self) {
        let _ = self.control.send(GiveawayControl::ResolveNow).await;
    }

    pub async fn cancel(&self) {
        let _ = self.control.send(GiveawayControl::Cancel).await;
    }

    /// Wait for the task to finish and report how it ended.
    pub async fn outcome(self) -> GiveawayEnd {
        self.task.await.unwrap_or(GiveawayEnd::Abandoned)
    }
}

/// Owns every running giveaway task and the event channel they announce on.
pub struct GiveawayManager {
    ledger: Ledger,
    directory: Arc<dyn UserDirectory>,
    config: Arc<EconomyConfig>,
    events: broadcast::Sender<GiveawayEvent>,
    shutdown: broadcast::Sender<()>,
    // Seed for the next winner draw; tests set this for deterministic picks.
    rng_seed: Mutex<Option<u64>>,
}

impl GiveawayManager {
    pub fn new(
        ledger: Ledger,
        directory: Arc<dyn UserDirectory>,
        config: Arc<EconomyConfig>,
    ) -> Self {
        let (events, _) = broadcast::channel(256);
        let (shutdown, _) = broadcast::channel(4);
        Self {
            ledger,
            directory,
            config,
            events,
            shutdown,
            rng_seed: Mutex::new(None),
        }
    }

    /// Subscribe to giveaway announcements.
    pub fn subscribe(&self) -> broadcast::Receiver<GiveawayEvent> {
        self.events.subscribe()
    }

    /// Fix the seed used for the next winner draw.
    pub fn set_rng_seed(&self, seed: u64) {
        *self.rng_seed.lock() = Some(seed);
    }

    /// Stop every running giveaway without resolving it.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    /// Start a giveaway: withdraw the stake, snapshot the eligible pool and
    /// spawn the countdown task.
    ///
    /// The snapshot is every online user other than the initiator, guests
    /// excluded (a guest cannot hold the prize). It is fixed here and never
    /// grows; users who disconnect before resolution are skipped by the
    /// presence re-check in the draw.
    pub fn start(
        &self,
        room: &str,
        initiator: &UserId,
        initiator_name: &str,
        amount: i64,
        duration_secs: u64,
    ) -> Result<GiveawayHandle> {
        if !(MIN_STAKE..=MAX_STAKE).contains(&amount) {
            return Err(EconomyError::InvalidAmount);
        }
        if !(MIN_DURATION_SECS..=MAX_DURATION_SECS).contains(&duration_secs) {
            return Err(EconomyError::InvalidAmount);
        }

        let available = self.ledger.balance(initiator)?;
        if available < amount {
            return Err(EconomyError::InsufficientFunds {
                needed: amount,
                available,
            });
        }

        let snapshot: Vec<UserId> = self
            .directory
            .online_users()
            .into_iter()
            .filter(|u| u != initiator && !u.is_guest())
            .collect();
        if snapshot.is_empty() {
            return Err(EconomyError::NoEligibleParticipants);
        }

        // Stake leaves the initiator before the countdown exists; the audit
        // line follows the committed write.
        self.ledger.adjust(initiator, -amount)?;
        self.ledger.record(&format!(
            "{} started a giveaway of {} {}.",
            initiator_name,
            amount,
            self.config.currency(amount)
        ))?;

        let id = format!("giveaway-{}-{}", room, Utc::now().timestamp_millis());
        info!(
            id = %id,
            initiator = %initiator,
            amount,
            duration_secs,
            pool = snapshot.len(),
            "🎁 giveaway started"
        );

        let _ = self.events.send(GiveawayEvent::Started {
            id: id.clone(),
            initiator: initiator_name.to_string(),
            amount,
            duration_secs,
        });

        let task = GiveawayTask {
            id: id.clone(),
            initiator: initiator.clone(),
            initiator_name: initiator_name.to_string(),
            amount,
            snapshot,
            duration: Duration::from_secs(duration_secs),
            tick: Duration::from_secs(self.config.giveaway_tick_secs.max(1)),
            ledger: self.ledger.clone(),
            directory: Arc::clone(&self.directory),
            config: Arc::clone(&self.config),
            events: self.events.clone(),
            seed: self.rng_seed.lock().take(),
        };

        let (control_tx, control_rx) = mpsc::channel(4);
        let shutdown_rx = self.shutdown.subscribe();
        let join = tokio::spawn(task.run(control_rx, shutdown_rx));

        Ok(GiveawayHandle {
            id,
            control: control_tx,
            task: join,
        })
    }
}
