//! Ranked top-N view over the account store. Pure read; no caching layer in
//! between, so it always reflects the latest committed balances.

use crate::error::Result;
use crate::models::UserId;
use crate::store::AccountStore;
use serde::Serialize;

pub const MAX_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedAccount {
    pub user: UserId,
    pub balance: i64,
}

#[derive(Clone)]
pub struct Leaderboard {
    accounts: AccountStore,
}

impl Leaderboard {
    pub fn new(accounts: AccountStore) -> Self {
        Self { accounts }
    }

    /// Top accounts by balance, descending. Only positive balances qualify;
    /// ties keep enumeration order (the sort is stable). `limit` is clamped
    /// to [1, 100]. An empty Vec means no account qualifies.
    pub fn top_accounts(&self, limit: usize) -> Result<Vec<RankedAccount>> {
        let limit = limit.clamp(1, MAX_LIMIT);
        let mut ranked: Vec<RankedAccount> = self
            .accounts
            .entries()?
            .into_iter()
            .filter(|(_, balance)| *balance > 0)
            .map(|(user, balance)| RankedAccount { user, balance })
            .collect();
        ranked.sort_by_key(|a| std::cmp::Reverse(a.balance));
        ranked.truncate(limit);
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryKv;
    use std::sync::Arc;

    fn board_with(balances: &[(&str, i64)]) -> Leaderboard {
        let accounts = AccountStore::new(Arc::new(MemoryKv::new()));
        for (name, balance) in balances {
            accounts
                .write_balance(&UserId::parse(name).unwrap(), *balance)
                .unwrap();
        }
        Leaderboard::new(accounts)
    }

    #[test]
    fn test_sorted_descending_positive_only() {
        let board = board_with(&[
            ("ash", 300),
            ("misty", 500),
            ("brock", 0),
            ("jessie", -20),
            ("james", 100),
        ]);

        let top = board.top_accounts(10).unwrap();
        let names: Vec<&str> = top.iter().map(|a| a.user.as_str()).collect();
        assert_eq!(names, vec!["misty", "ash", "james"]);
        assert!(top.iter().all(|a| a.balance > 0));
    }

    #[test]
    fn test_limit_truncates_and_clamps() {
        let board = board_with(&[("a1", 1), ("a2", 2), ("a3", 3), ("a4", 4)]);

        assert_eq!(board.top_accounts(2).unwrap().len(), 2);
        // 0 clamps up to 1, absurd limits clamp down to 100
        assert_eq!(board.top_accounts(0).unwrap().len(), 1);
        assert_eq!(board.top_accounts(5000).unwrap().len(), 4);
    }

    #[test]
    fn test_empty_result_when_none_qualify() {
        let board = board_with(&[("broke", 0), ("indebt", -5)]);
        assert!(board.top_accounts(10).unwrap().is_empty());

        let board = board_with(&[]);
        assert!(board.top_accounts(10).unwrap().is_empty());
    }

    #[test]
    fn test_ties_keep_enumeration_order() {
        let board = board_with(&[("first", 50), ("second", 50), ("third", 50)]);
        let top = board.top_accounts(10).unwrap();
        let names: Vec<&str> = top.iter().map(|a| a.user.as_str()).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }
}
