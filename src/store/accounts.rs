//! Account balance store
//!
//! Thin typed view over the key-value collaborator. Accounts are created
//! implicitly on first write; an absent key reads as 0. This is the only
//! type that writes balances.

use crate::error::Result;
use crate::models::UserId;
use crate::store::kv::KvStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AccountStore {
    kv: Arc<dyn KvStore>,
}

impl AccountStore {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Stored balance, or 0 for an account that has never been written.
    pub fn balance(&self, user: &UserId) -> Result<i64> {
        Ok(self.kv.get(user.as_str())?.unwrap_or(0))
    }

    /// Overwrite the stored balance. Durable once this returns Ok.
    pub fn write_balance(&self, user: &UserId, balance: i64) -> Result<()> {
        self.kv.set(user.as_str(), balance)
    }

    /// Every known account with its balance, in enumeration order.
    pub fn entries(&self) -> Result<Vec<(UserId, i64)>> {
        let mut out = Vec::new();
        for key in self.kv.keys()? {
            let Some(user) = UserId::parse(&key) else {
                continue;
            };
            let balance = self.kv.get(&key)?.unwrap_or(0);
            out.push((user, balance));
        }
        Ok(out)
    }
}
