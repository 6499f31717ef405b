//! The ledger: every balance read and write goes through here, paired with
//! its audit trail.
//!
//! Validation split mirrors the command surface: the ledger enforces
//! identity rules and fund sufficiency, while range policy on amounts
//! ([1,1000] for privileged grants and transfers) belongs to the callers.
//! Balances are allowed to go negative when a caller adjusts without a
//! sufficiency pre-check.

use crate::error::{EconomyError, Result};
use crate::models::UserId;
use crate::store::{AccountStore, AuditLog};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct Ledger {
    accounts: AccountStore,
    audit: Arc<AuditLog>,
    // Held across every mutation, and across transfer's debit+credit pair,
    // so a giveaway task's writes cannot interleave with a command's.
    write_lock: Arc<Mutex<()>>,
}

impl Ledger {
    pub fn new(accounts: AccountStore, audit: Arc<AuditLog>) -> Self {
        Self {
            accounts,
            audit,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Current balance. Guest-class ids always read 0.
    pub fn balance(&self, user: &UserId) -> Result<i64> {
        if user.is_guest() {
            return Ok(0);
        }
        self.accounts.balance(user)
    }

    /// Add `delta` to the stored balance (negative deltas debit).
    ///
    /// Silently ignored for guest-class ids: an unauthenticated user is not
    /// an error, just not a bank. The write is durable before this returns.
    pub fn adjust(&self, user: &UserId, delta: i64) -> Result<()> {
        let _guard = self.write_lock.lock();
        self.apply_delta(user, delta)
    }

    /// Set the stored balance back to zero.
    pub fn reset(&self, user: &UserId) -> Result<()> {
        if user.is_guest() {
            return Ok(());
        }
        let _guard = self.write_lock.lock();
        self.accounts.write_balance(user, 0)
    }

    /// Move `amount` from one account to another as a single logical unit.
    ///
    /// Fails without touching either account when funds are short or the
    /// target cannot hold currency. The debit and credit run back to back
    /// with no suspension point between them; if the credit write fails the
    /// debit is compensated before the error is reported, so a debit is
    /// never left visible on its own.
    pub fn transfer(&self, from: &UserId, to: &UserId, amount: i64) -> Result<()> {
        if amount <= 0 {
            return Err(EconomyError::InvalidAmount);
        }
        if to.is_guest() || from.is_guest() {
            return Err(EconomyError::InvalidIdentity);
        }

        let _guard = self.write_lock.lock();

        let available = self.accounts.balance(from)?;
        if available < amount {
            return Err(EconomyError::InsufficientFunds {
                needed: amount,
                available,
            });
        }

        self.apply_delta(from, -amount)?;
        if let Err(e) = self.apply_delta(to, amount) {
            // Put the debit back rather than strand it.
            if let Err(undo) = self.apply_delta(from, amount) {
                warn!(from = %from, amount, error = %undo, "failed to compensate debit");
            }
            return Err(e);
        }
        Ok(())
    }

    fn apply_delta(&self, user: &UserId, delta: i64) -> Result<()> {
        if user.is_guest() {
            debug!(user = %user, delta, "ignoring adjust for guest id");
            return Ok(());
        }
        let current = self.accounts.balance(user)?;
        let updated = current
            .checked_add(delta)
            .ok_or(EconomyError::InvalidAmount)?;
        self.accounts.write_balance(user, updated)?;
        debug!(user = %user, delta, balance = updated, "balance adjusted");
        Ok(())
    }

    /// Append one transaction description to the audit log. Blank messages
    /// are a no-op. Callers log only after the corresponding store write
    /// has committed.
    pub fn record(&self, message: &str) -> Result<()> {
        self.audit.record(message)
    }

    /// Newest-first tail of the audit log.
    pub fn audit_tail(&self, count: usize) -> Result<Vec<String>> {
        self.audit.tail(count)
    }
}
