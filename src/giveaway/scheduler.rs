//! Per-giveaway countdown task
//!
//! One `tokio::select!` loop owns the whole lifecycle: progress ticks, the
//! resolution deadline, the handle's control channel and the manager-wide
//! shutdown. Resolution can only be reached from arms that break the loop,
//! so it runs at most once even when a tick lands exactly on the deadline.

use super::{GiveawayControl, GiveawayEnd, GiveawayEvent, GiveawayStatus};
use crate::config::EconomyConfig;
use crate::directory::UserDirectory;
use crate::ledger::Ledger;
use crate::models::UserId;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tracing::{error, info};

pub(crate) struct GiveawayTask {
    pub id: String,
    pub initiator: UserId,
    pub initiator_name: String,
    pub amount: i64,
    pub snapshot: Vec<UserId>,
    pub duration: Duration,
    pub tick: Duration,
    pub ledger: Ledger,
    pub directory: Arc<dyn UserDirectory>,
    pub config: Arc<EconomyConfig>,
    pub events: broadcast::Sender<GiveawayEvent>,
    pub seed: Option<u64>,
}

impl GiveawayTask {
    pub(crate) async fn run(
        self,
        mut control: mpsc::Receiver<GiveawayControl>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> GiveawayEnd {
        let mut status = GiveawayStatus::Active;
        let started = Instant::now();
        let deadline = started + self.duration;

        let mut ticker = interval_at(started + self.tick, self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // A dropped handle closes the control channel; the giveaway keeps
        // running to its deadline in that case.
        let mut control_open = true;

        let end = loop {
            tokio::select! {
                _ = sleep_until(deadline) => {
                    break self.resolve(&mut status);
                }
                _ = ticker.tick() => {
                    let remaining = deadline.saturating_duration_since(Instant::now()).as_secs();
                    // A tick landing at or past the deadline stays silent;
                    // the deadline arm owns that boundary.
                    if remaining > 0 {
                        let _ = self.events.send(GiveawayEvent::Progress {
                            id: self.id.clone(),
                            remaining_secs: remaining,
                        });
                    }
                }
                cmd = control.recv(), if control_open => {
                    match cmd {
                        Some(GiveawayControl::ResolveNow) => break self.resolve(&mut status),
                        Some(GiveawayControl::Cancel) => {
                            info!(id = %self.id, "giveaway abandoned before resolution");
                            break GiveawayEnd::Abandoned;
                        }
                        None => control_open = false,
                    }
                }
                _ = shutdown.recv() => {
                    info!(id = %self.id, "giveaway stopped by shutdown");
                    break GiveawayEnd::Abandoned;
                }
            }
        };

        // An abandoned giveaway never leaves `Active`.
        debug_assert!(status != GiveawayStatus::Active || matches!(end, GiveawayEnd::Abandoned));
        end
    }

    /// The single resolution step: draw a winner from the snapshot members
    /// who are still online, credit them, log the credit, announce.
    ///
    /// When the whole snapshot has gone offline the giveaway cancels and
    /// the stake is NOT returned to the initiator; it leaves circulation.
    fn resolve(&self, status: &mut GiveawayStatus) -> GiveawayEnd {
        let still_online: Vec<&UserId> = self
            .snapshot
            .iter()
            .filter(|u| self.directory.is_online(u))
            .collect();

        if still_online.is_empty() {
            *status = GiveawayStatus::Canceled;
            info!(id = %self.id, amount = self.amount, "giveaway canceled, nobody left online");
            let _ = self.events.send(GiveawayEvent::Canceled {
                id: self.id.clone(),
                amount: self.amount,
            });
            return GiveawayEnd::NoWinner;
        }

        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let winner = still_online[rng.gen_range(0..still_online.len())].clone();
        let winner_name = self
            .directory
            .display_name(&winner)
            .unwrap_or_else(|| winner.to_string());

        if let Err(e) = self.ledger.adjust(&winner, self.amount) {
            // The stake is already withdrawn; all we can do here is log.
            error!(id = %self.id, winner = %winner, error = %e, "failed to credit giveaway winner");
            return GiveawayEnd::Abandoned;
        }
        if let Err(e) = self.ledger.record(&format!(
            "{} won a giveaway of {} {}.",
            winner_name,
            self.amount,
            self.config.currency(self.amount)
        )) {
            error!(id = %self.id, error = %e, "failed to log giveaway credit");
        }

        *status = GiveawayStatus::Resolved;
        info!(id = %self.id, winner = %winner, amount = self.amount, "🎉 giveaway resolved");
        let _ = self.events.send(GiveawayEvent::Won {
            id: self.id.clone(),
            initiator: self.initiator_name.clone(),
            winner: winner_name,
            amount: self.amount,
        });
        GiveawayEnd::Won(winner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::InMemoryDirectory;
    use crate::giveaway::GiveawayManager;
    use crate::store::{AccountStore, AuditLog, MemoryAuditSink, MemoryKv};

    fn fixture() -> (Ledger, Arc<InMemoryDirectory>, GiveawayManager) {
        let accounts = AccountStore::new(Arc::new(MemoryKv::new()));
        let audit = Arc::new(AuditLog::new(Box::new(MemoryAuditSink::new())));
        let ledger = Ledger::new(accounts, audit);
        let directory = Arc::new(InMemoryDirectory::new());
        let manager = GiveawayManager::new(
            ledger.clone(),
            directory.clone(),
            Arc::new(EconomyConfig::default()),
        );
        (ledger, directory, manager)
    }

    fn uid(raw: &str) -> UserId {
        UserId::parse(raw).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_resolution_conserves_currency() {
        let (ledger, directory, manager) = fixture();
        let host = directory.connect("Host").unwrap();
        let a = directory.connect("Alpha").unwrap();
        let b = directory.connect("Beta").unwrap();
        ledger.adjust(&host, 500).unwrap();

        let handle = manager.start("lobby", &host, "Host", 100, 30).unwrap();
        assert_eq!(ledger.balance(&host).unwrap(), 400);

        tokio::time::advance(Duration::from_secs(31)).await;
        let end = handle.outcome().await;

        let GiveawayEnd::Won(winner) = end else {
            panic!("expected a winner, got {:?}", end);
        };
        assert!(winner == a || winner == b);

        let (won, lost) = if winner == a { (a, b) } else { (b, a) };
        assert_eq!(ledger.balance(&won).unwrap(), 100);
        assert_eq!(ledger.balance(&lost).unwrap(), 0);
        // Total across the three accounts is unchanged
        assert_eq!(
            ledger.balance(&host).unwrap() + ledger.balance(&won).unwrap(),
            500
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_ticks_count_down_and_stop_at_deadline() {
        let (ledger, directory, manager) = fixture();
        let host = directory.connect("Host").unwrap();
        directory.connect("Alpha").unwrap();
        ledger.adjust(&host, 100).unwrap();

        let mut events = manager.subscribe();
        let handle = manager.start("lobby", &host, "Host", 50, 30).unwrap();

        // Step the paused clock tick by tick so each announcement sees the
        // remaining time it would under a wall clock.
        for _ in 0..3 {
            tokio::time::advance(Duration::from_secs(10)).await;
        }
        tokio::time::advance(Duration::from_secs(1)).await;
        handle.outcome().await;

        let mut progress = Vec::new();
        let mut saw_terminal = false;
        while let Ok(event) = events.try_recv() {
            match event {
                GiveawayEvent::Progress { remaining_secs, .. } => progress.push(remaining_secs),
                GiveawayEvent::Won { .. } | GiveawayEvent::Canceled { .. } => {
                    assert!(!saw_terminal, "terminal event fired twice");
                    saw_terminal = true;
                }
                GiveawayEvent::Started { .. } => {}
            }
        }

        assert!(saw_terminal);
        // 30s run with 10s cadence: announcements at 20s and 10s remaining,
        // and none at or past the deadline.
        assert_eq!(progress, vec![20, 10]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_offline_cancels_without_refund() {
        let (ledger, directory, manager) = fixture();
        let host = directory.connect("Host").unwrap();
        let a = directory.connect("Alpha").unwrap();
        ledger.adjust(&host, 300).unwrap();

        let mut events = manager.subscribe();
        let handle = manager.start("lobby", &host, "Host", 120, 60).unwrap();
        directory.disconnect(&a);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(handle.outcome().await, GiveawayEnd::NoWinner);

        // The stake is burned: initiator stays debited, nobody was credited.
        assert_eq!(ledger.balance(&host).unwrap(), 180);
        assert_eq!(ledger.balance(&a).unwrap(), 0);

        let mut canceled = false;
        while let Ok(event) = events.try_recv() {
            if matches!(event, GiveawayEvent::Canceled { amount: 120, .. }) {
                canceled = true;
            }
        }
        assert!(canceled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnected_snapshot_member_never_wins() {
        let (ledger, directory, manager) = fixture();
        let host = directory.connect("Host").unwrap();
        let gone = directory.connect("Gone").unwrap();
        let stays = directory.connect("Stays").unwrap();
        ledger.adjust(&host, 100).unwrap();

        let handle = manager.start("lobby", &host, "Host", 100, 30).unwrap();
        directory.disconnect(&gone);

        handle.resolve_now().await;
        let end = handle.outcome().await;

        assert_eq!(end, GiveawayEnd::Won(stays.clone()));
        assert_eq!(ledger.balance(&stays).unwrap(), 100);
        assert_eq!(ledger.balance(&gone).unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resolve_now_is_deterministic_with_seed() {
        let (ledger, directory, manager) = fixture();
        let host = directory.connect("Host").unwrap();
        directory.connect("Alpha").unwrap();
        directory.connect("Beta").unwrap();
        directory.connect("Gamma").unwrap();
        ledger.adjust(&host, 1000).unwrap();

        manager.set_rng_seed(7);
        let first = manager.start("lobby", &host, "Host", 100, 30).unwrap();
        first.resolve_now().await;
        let GiveawayEnd::Won(first_winner) = first.outcome().await else {
            panic!("expected a winner");
        };

        manager.set_rng_seed(7);
        let second = manager.start("lobby", &host, "Host", 100, 30).unwrap();
        second.resolve_now().await;
        let GiveawayEnd::Won(second_winner) = second.outcome().await else {
            panic!("expected a winner");
        };

        assert_eq!(first_winner, second_winner);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_abandons_without_resolving() {
        let (ledger, directory, manager) = fixture();
        let host = directory.connect("Host").unwrap();
        let a = directory.connect("Alpha").unwrap();
        ledger.adjust(&host, 100).unwrap();

        let handle = manager.start("lobby", &host, "Host", 40, 30).unwrap();
        handle.cancel().await;
        assert_eq!(handle.outcome().await, GiveawayEnd::Abandoned);

        // Same as a restart: the stake stays withdrawn, nobody is credited.
        assert_eq!(ledger.balance(&host).unwrap(), 60);
        assert_eq!(ledger.balance(&a).unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_handle_still_runs_to_resolution() {
        let (ledger, directory, manager) = fixture();
        let host = directory.connect("Host").unwrap();
        let a = directory.connect("Alpha").unwrap();
        ledger.adjust(&host, 100).unwrap();

        let handle = manager.start("lobby", &host, "Host", 100, 30).unwrap();
        drop(handle);

        tokio::time::advance(Duration::from_secs(31)).await;
        // Let the detached task finish its resolution step.
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(ledger.balance(&a).unwrap(), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_running_giveaways() {
        let (ledger, directory, manager) = fixture();
        let host = directory.connect("Host").unwrap();
        directory.connect("Alpha").unwrap();
        ledger.adjust(&host, 100).unwrap();

        let handle = manager.start("lobby", &host, "Host", 25, 120).unwrap();
        manager.shutdown();
        assert_eq!(handle.outcome().await, GiveawayEnd::Abandoned);
        assert_eq!(ledger.balance(&host).unwrap(), 75);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_rejections_leave_ledger_untouched() {
        let (ledger, directory, manager) = fixture();
        let host = directory.connect("Host").unwrap();
        ledger.adjust(&host, 500).unwrap();

        // Empty pool: only the initiator is online
        let err = manager.start("lobby", &host, "Host", 100, 30).unwrap_err();
        assert!(matches!(err, crate::error::EconomyError::NoEligibleParticipants));
        assert_eq!(ledger.balance(&host).unwrap(), 500);

        directory.connect("Alpha").unwrap();

        // Insufficient funds
        let err = manager.start("lobby", &host, "Host", 501, 30).unwrap_err();
        assert!(matches!(
            err,
            crate::error::EconomyError::InsufficientFunds { needed: 501, available: 500 }
        ));
        assert_eq!(ledger.balance(&host).unwrap(), 500);

        // Bounds: stake and duration
        assert!(manager.start("lobby", &host, "Host", 0, 30).is_err());
        assert!(manager.start("lobby", &host, "Host", 1001, 30).is_err());
        assert!(manager.start("lobby", &host, "Host", 100, 29).is_err());
        assert!(manager.start("lobby", &host, "Host", 100, 301).is_err());
        assert_eq!(ledger.balance(&host).unwrap(), 500);

        // No audit lines from any rejected start
        assert_eq!(ledger.audit_tail(10).unwrap().len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_guests_are_excluded_from_the_pool() {
        let (ledger, directory, manager) = fixture();
        let host = directory.connect("Host").unwrap();
        directory.connect("Guest 123").unwrap();
        ledger.adjust(&host, 100).unwrap();

        // A guest cannot hold the prize, so the pool is effectively empty.
        let err = manager.start("lobby", &host, "Host", 50, 30).unwrap_err();
        assert!(matches!(err, crate::error::EconomyError::NoEligibleParticipants));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exactly_one_audit_line_per_balance_change() {
        let (ledger, directory, manager) = fixture();
        let host = directory.connect("Host").unwrap();
        directory.connect("Alpha").unwrap();
        ledger.adjust(&host, 200).unwrap();

        let handle = manager.start("lobby", &host, "Host", 80, 30).unwrap();
        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(matches!(handle.outcome().await, GiveawayEnd::Won(_)));

        let tail = ledger.audit_tail(10).unwrap();
        assert_eq!(tail.len(), 2);
        assert!(tail[0].contains("won a giveaway of 80"));
        assert!(tail[1].contains("started a giveaway of 80"));
    }
}
