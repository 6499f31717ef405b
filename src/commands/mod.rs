//! Outward command surface
//!
//! Thin glue between the host chat server's dispatcher and the economy
//! services: parse the argument string, check the caller's rank, delegate,
//! and render a reply.

use crate::config::EconomyConfig;
use crate::error::EconomyError;
use crate::giveaway::{GiveawayManager, MAX_DURATION_SECS, MIN_DURATION_SECS};
use crate::leaderboard::Leaderboard;
use crate::ledger::Ledger;
use crate::models::{Rank, UserId};
use std::sync::Arc;
use tracing::info;

pub const MIN_AMOUNT: i64 = 1;
pub const MAX_AMOUNT: i64 = 1000;
const DEFAULT_LOG_COUNT: usize = 10;
const DEFAULT_LEADERBOARD_LIMIT: usize = 10;

/// Who is asking, with what privilege, and from where.
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub caller: UserId,
    pub caller_name: String,
    pub rank: Rank,
    /// Room the command was issued in, if any. Giveaways require one.
    pub room: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// Broadcastable to the room.
    Public,
    /// Shown to the caller only.
    Private,
    /// Rejection; shown to the caller only.
    Error,
}

#[derive(Debug, Clone)]
pub struct Reply {
    pub kind: ReplyKind,
    pub text: String,
}

impl Reply {
    fn public(text: impl Into<String>) -> Self {
        Reply {
            kind: ReplyKind::Public,
            text: text.into(),
        }
    }

    fn private(text: impl Into<String>) -> Self {
        Reply {
            kind: ReplyKind::Private,
            text: text.into(),
        }
    }

    fn error(text: impl Into<String>) -> Self {
        Reply {
            kind: ReplyKind::Error,
            text: text.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == ReplyKind::Error
    }
}

pub struct CommandService {
    config: Arc<EconomyConfig>,
    ledger: Ledger,
    leaderboard: Leaderboard,
    giveaways: Arc<GiveawayManager>,
}

impl CommandService {
    pub fn new(
        config: Arc<EconomyConfig>,
        ledger: Ledger,
        leaderboard: Leaderboard,
        giveaways: Arc<GiveawayManager>,
    ) -> Self {
        Self {
            config,
            ledger,
            leaderboard,
            giveaways,
        }
    }

    /// Dispatch one command line, e.g. `wallet Misty` or
    /// `economy give Misty, 100, tournament prize`.
    pub fn dispatch(&self, ctx: &CommandContext, input: &str) -> Reply {
        let input = input.trim().trim_start_matches('/');
        let (head, rest) = split_word(input);

        match head {
            "wallet" => self.wallet(ctx, rest),
            "richest" | "richestuser" => self.richest(rest),
            "economy" => {
                let (sub, target) = split_word(rest);
                match sub {
                    "give" => self.give_or_take(ctx, target, true),
                    "take" => self.give_or_take(ctx, target, false),
                    "transfer" => self.transfer(ctx, target),
                    "reset" => self.reset(ctx, target),
                    "log" => self.log(ctx, target),
                    "giveaway" => self.giveaway(ctx, target),
                    "help" | "" => self.help(ctx),
                    _ => Reply::error("Unknown economy command. Try /economy help."),
                }
            }
            _ => Reply::error("Unknown command. Try /economy help."),
        }
    }

    fn wallet(&self, ctx: &CommandContext, target: &str) -> Reply {
        let name = if target.is_empty() {
            ctx.caller_name.as_str()
        } else {
            target
        };
        let Some(user) = UserId::parse(name) else {
            return Reply::error("Invalid username.");
        };
        match self.ledger.balance(&user) {
            Ok(balance) => Reply::public(format!(
                "{} has {} {}.",
                name,
                balance,
                self.config.currency(balance)
            )),
            Err(e) => self.economy_error(&e),
        }
    }

    fn richest(&self, target: &str) -> Reply {
        let limit = target
            .parse::<usize>()
            .unwrap_or(DEFAULT_LEADERBOARD_LIMIT)
            .clamp(1, 100);
        let ranked = match self.leaderboard.top_accounts(limit) {
            Ok(ranked) => ranked,
            Err(e) => return self.economy_error(&e),
        };
        if ranked.is_empty() {
            return Reply::public(format!(
                "No rich users found on {}.",
                self.config.server_name
            ));
        }
        let mut text = format!("Richest users on {}:", self.config.server_name);
        for (i, account) in ranked.iter().enumerate() {
            text.push_str(&format!(
                "\n{}. {} - {} {}",
                i + 1,
                account.user,
                account.balance,
                self.config.currency(account.balance)
            ));
        }
        Reply::public(text)
    }

    fn give_or_take(&self, ctx: &CommandContext, target: &str, giving: bool) -> Reply {
        if !ctx.rank.can_manage_funds() {
            return self.economy_error(&EconomyError::Unauthorized);
        }
        let verb = if giving { "give" } else { "take" };
        let parts = comma_parts(target);
        let [name, amount_str, reason] = parts.as_slice() else {
            return Reply::error(format!(
                "Usage: /economy {verb} [user], [amount], [reason]"
            ));
        };
        let Some(amount) = parse_amount(amount_str) else {
            return Reply::error("Amount must be a number between 1 and 1000.");
        };
        let Some(user) = UserId::parse(name) else {
            return Reply::error("Invalid username.");
        };
        if user.is_guest() {
            return Reply::error("Invalid username.");
        }

        let delta = if giving { amount } else { -amount };
        if let Err(e) = self.ledger.adjust(&user, delta) {
            return self.economy_error(&e);
        }
        let log_line = if giving {
            format!(
                "{} gave {} {} to {}. Reason: {}",
                ctx.caller_name,
                amount,
                self.config.currency(amount),
                name,
                reason
            )
        } else {
            format!(
                "{} took {} {} from {}. Reason: {}",
                ctx.caller_name,
                amount,
                self.config.currency(amount),
                name,
                reason
            )
        };
        if let Err(e) = self.ledger.record(&log_line) {
            return self.economy_error(&e);
        }

        info!(by = %ctx.caller, target = %user, delta, "staff balance change");
        if giving {
            Reply::private(format!(
                "{} has received {} {}.",
                name,
                amount,
                self.config.currency(amount)
            ))
        } else {
            Reply::private(format!(
                "You removed {} {} from {}.",
                amount,
                self.config.currency(amount),
                name
            ))
        }
    }

    fn transfer(&self, ctx: &CommandContext, target: &str) -> Reply {
        let parts = comma_parts(target);
        let [name, amount_str] = parts.as_slice() else {
            return Reply::error("Usage: /economy transfer [user], [amount]");
        };
        let Some(amount) = parse_amount(amount_str) else {
            return Reply::error("Amount must be a number between 1 and 1000.");
        };
        let Some(to) = UserId::parse(name) else {
            return Reply::error("Invalid username.");
        };

        if let Err(e) = self.ledger.transfer(&ctx.caller, &to, amount) {
            return self.economy_error(&e);
        }
        if let Err(e) = self.ledger.record(&format!(
            "{} transferred {} {} to {}.",
            ctx.caller_name,
            amount,
            self.config.currency(amount),
            name
        )) {
            return self.economy_error(&e);
        }

        Reply::private(format!(
            "You transferred {} {} to {}.",
            amount,
            self.config.currency(amount),
            name
        ))
    }

    fn reset(&self, ctx: &CommandContext, target: &str) -> Reply {
        if !ctx.rank.can_manage_funds() {
            return self.economy_error(&EconomyError::Unauthorized);
        }
        let Some(user) = UserId::parse(target) else {
            return Reply::error("Invalid username.");
        };
        if user.is_guest() {
            return Reply::error("Invalid username.");
        }
        if let Err(e) = self.ledger.reset(&user) {
            return self.economy_error(&e);
        }
        if let Err(e) = self
            .ledger
            .record(&format!("{} reset {}'s balance to 0.", ctx.caller_name, user))
        {
            return self.economy_error(&e);
        }
        Reply::private(format!(
            "{} now has 0 {}.",
            user, self.config.currency_plural
        ))
    }

    fn log(&self, ctx: &CommandContext, target: &str) -> Reply {
        if !ctx.rank.is_staff() {
            return self.economy_error(&EconomyError::Unauthorized);
        }
        // A count of 0 means "no preference", same as leaving it out.
        let count = match target.parse::<usize>() {
            Ok(n) if n > 0 => n,
            _ => DEFAULT_LOG_COUNT,
        };
        match self.ledger.audit_tail(count) {
            Ok(entries) if entries.is_empty() => {
                Reply::private("No transactions logged yet.".to_string())
            }
            Ok(entries) => Reply::private(entries.join("\n")),
            Err(e) => self.economy_error(&e),
        }
    }

    fn giveaway(&self, ctx: &CommandContext, target: &str) -> Reply {
        let Some(room) = ctx.room.as_deref() else {
            return Reply::error("This command can only be used in a room.");
        };
        if !ctx.rank.can_run_giveaway() {
            return self.economy_error(&EconomyError::Unauthorized);
        }
        let parts = comma_parts(target);
        let [amount_str, time_str] = parts.as_slice() else {
            return Reply::error("Usage: /economy giveaway [amount], [time in seconds]");
        };
        let Some(amount) = parse_amount(amount_str) else {
            return Reply::error("Usage: /economy giveaway [amount], [time in seconds]");
        };
        let duration_secs = match time_str.parse::<u64>() {
            Ok(t) if (MIN_DURATION_SECS..=MAX_DURATION_SECS).contains(&t) => t,
            _ => return Reply::error("Time must be between 30 and 300 seconds."),
        };

        match self
            .giveaways
            .start(room, &ctx.caller, &ctx.caller_name, amount, duration_secs)
        {
            Ok(_handle) => Reply::private(format!(
                "You started a giveaway of {} {}.",
                amount,
                self.config.currency(amount)
            )),
            Err(e) => self.economy_error(&e),
        }
    }

    fn help(&self, ctx: &CommandContext) -> Reply {
        let plural = &self.config.currency_plural;
        let mut text = format!(
            "{} Economy System\n\
             /wallet [user] - Check a balance.\n\
             /richest [limit] - View the top users.\n\
             /economy transfer [user], [amount] - Send {plural}.\n\
             /economy giveaway [amount], [time] - Start a giveaway (room staff only).\n\
             /economy help - View this help menu.",
            self.config.server_name
        );
        if ctx.rank.is_staff() {
            text.push_str(&format!(
                "\nStaff commands:\n\
                 /economy give [user], [amount], [reason] - Give {plural}.\n\
                 /economy take [user], [amount], [reason] - Remove {plural}.\n\
                 /economy reset [user] - Reset a user's balance.\n\
                 /economy log [count] - View the transaction log."
            ));
        }
        Reply::public(text)
    }

    fn economy_error(&self, e: &EconomyError) -> Reply {
        let text = match e {
            EconomyError::InvalidAmount => {
                "Amount must be a number between 1 and 1000.".to_string()
            }
            EconomyError::InsufficientFunds { .. } => {
                format!("You don't have enough {}.", self.config.currency_plural)
            }
            EconomyError::InvalidIdentity => "Invalid username.".to_string(),
            EconomyError::NoEligibleParticipants => {
                "At least two users must be online to start a giveaway.".to_string()
            }
            EconomyError::Unauthorized => "Access denied.".to_string(),
            EconomyError::Storage(_) => {
                "The economy storage is currently unavailable. Try again later.".to_string()
            }
        };
        Reply::error(text)
    }
}

fn split_word(input: &str) -> (&str, &str) {
    let input = input.trim();
    match input.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (input, ""),
    }
}

fn comma_parts(input: &str) -> Vec<&str> {
    if input.trim().is_empty() {
        return Vec::new();
    }
    input.split(',').map(str::trim).collect()
}

/// Whole positive amount within the privileged bound, or None.
fn parse_amount(raw: &str) -> Option<i64> {
    let amount = raw.parse::<i64>().ok()?;
    (MIN_AMOUNT..=MAX_AMOUNT).contains(&amount).then_some(amount)
}
