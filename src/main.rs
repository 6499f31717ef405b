//! Impulse economy host
//!
//! Stand-in for the chat server's command dispatcher: wires the config,
//! stores and services together and feeds stdin lines to the command
//! surface. Input format, one command per line:
//!
//! ```text
//! <name>:<rank> /wallet
//! <name>:<rank> /economy giveaway 100, 60
//! ```
//!
//! where `<rank>` is one of `regular`, `owner`, `mod`, `admin`. Every name
//! seen on stdin is marked online in the in-memory directory, so giveaways
//! started here have a live eligible pool.

use anyhow::{Context, Result};
use impulse_economy::commands::{CommandContext, CommandService, ReplyKind};
use impulse_economy::config::EconomyConfig;
use impulse_economy::directory::{InMemoryDirectory, UserDirectory};
use impulse_economy::giveaway::{GiveawayEvent, GiveawayManager};
use impulse_economy::leaderboard::Leaderboard;
use impulse_economy::ledger::Ledger;
use impulse_economy::models::Rank;
use impulse_economy::store::{AccountStore, AuditLog, FileAuditSink, SqliteKv};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Arc::new(EconomyConfig::from_env());
    info!(
        server = %config.server_name,
        currency = %config.currency_plural,
        db = %config.database_path,
        "starting economy service"
    );

    let kv = Arc::new(
        SqliteKv::open(&config.database_path)
            .with_context(|| format!("opening balance database {}", config.database_path))?,
    );
    let audit = Arc::new(AuditLog::new(Box::new(
        FileAuditSink::open(&config.audit_log_path)
            .with_context(|| format!("opening audit log {}", config.audit_log_path))?,
    )));

    let accounts = AccountStore::new(kv);
    let ledger = Ledger::new(accounts.clone(), audit);
    let leaderboard = Leaderboard::new(accounts);
    let directory = Arc::new(InMemoryDirectory::new());
    let giveaways = Arc::new(GiveawayManager::new(
        ledger.clone(),
        directory.clone(),
        config.clone(),
    ));
    let service = CommandService::new(
        config.clone(),
        ledger,
        leaderboard,
        giveaways.clone(),
    );

    // Render giveaway announcements the way the chat server would post them
    // to a room.
    let mut events = giveaways.subscribe();
    let announcer_config = config.clone();
    let announcer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match serde_json::to_string(&event) {
                Ok(payload) => debug!(%payload, "giveaway event"),
                Err(e) => warn!(error = %e, "failed to serialize giveaway event"),
            }
            match event {
                GiveawayEvent::Started {
                    initiator,
                    amount,
                    duration_secs,
                    ..
                } => println!(
                    "🎁 {initiator} is giving away {amount} {}! Winner chosen in {duration_secs}s.",
                    announcer_config.currency(amount)
                ),
                GiveawayEvent::Progress { remaining_secs, .. } => {
                    println!("🎁 Giveaway ongoing, {remaining_secs}s left. Stay online to win!")
                }
                GiveawayEvent::Won {
                    initiator,
                    winner,
                    amount,
                    ..
                } => println!(
                    "🎉 {winner} won {amount} {} from {initiator}'s giveaway!",
                    announcer_config.currency(amount)
                ),
                GiveawayEvent::Canceled { .. } => {
                    println!("⚠ Giveaway canceled: no eligible users were online.")
                }
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line.context("reading stdin")? {
                    Some(line) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        match parse_line(&directory, line) {
                            Some((ctx, command)) => {
                                let reply = service.dispatch(&ctx, &command);
                                let prefix = match reply.kind {
                                    ReplyKind::Public => "[room]",
                                    ReplyKind::Private => "[pm]",
                                    ReplyKind::Error => "[error]",
                                };
                                println!("{prefix} {}", reply.text);
                            }
                            None => warn!(line, "unparseable input line"),
                        }
                    }
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    info!("shutting down, abandoning in-flight giveaways");
    giveaways.shutdown();
    announcer.abort();
    Ok(())
}

/// `<name>:<rank> <command>` → a command context plus the command text.
/// The caller is marked online as a side effect.
fn parse_line(
    directory: &Arc<InMemoryDirectory>,
    line: &str,
) -> Option<(CommandContext, String)> {
    let (who, command) = line.split_once(' ')?;
    let (name, rank) = who.split_once(':')?;
    let rank = match rank {
        "regular" => Rank::Regular,
        "owner" => Rank::RoomOwner,
        "mod" => Rank::Moderator,
        "admin" => Rank::Administrator,
        _ => return None,
    };
    let caller = directory.connect(name)?;
    let caller_name = directory
        .display_name(&caller)
        .unwrap_or_else(|| name.to_string());
    Some((
        CommandContext {
            caller,
            caller_name,
            rank,
            room: Some("lobby".to_string()),
        },
        command.to_string(),
    ))
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "impulse_economy=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
