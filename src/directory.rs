//! Presence collaborator
//!
//! The host chat server owns the real user directory; the economy only
//! needs to know who is online (giveaway eligibility and the presence
//! re-check before crediting a winner) and how to render a display name.

use crate::models::UserId;
use parking_lot::RwLock;
use std::collections::HashMap;

pub trait UserDirectory: Send + Sync {
    fn is_online(&self, user: &UserId) -> bool;
    fn online_users(&self) -> Vec<UserId>;
    fn display_name(&self, user: &UserId) -> Option<String>;
}

/// In-memory directory for the host loop and tests.
#[derive(Default)]
pub struct InMemoryDirectory {
    // id -> (display name, connected)
    users: RwLock<HashMap<UserId, (String, bool)>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self, name: &str) -> Option<UserId> {
        let user = UserId::parse(name)?;
        self.users
            .write()
            .insert(user.clone(), (name.trim().to_string(), true));
        Some(user)
    }

    pub fn disconnect(&self, user: &UserId) {
        if let Some(entry) = self.users.write().get_mut(user) {
            entry.1 = false;
        }
    }
}

impl UserDirectory for InMemoryDirectory {
    fn is_online(&self, user: &UserId) -> bool {
        self.users
            .read()
            .get(user)
            .map(|(_, connected)| *connected)
            .unwrap_or(false)
    }

    fn online_users(&self) -> Vec<UserId> {
        let mut online: Vec<UserId> = self
            .users
            .read()
            .iter()
            .filter(|(_, (_, connected))| *connected)
            .map(|(id, _)| id.clone())
            .collect();
        online.sort();
        online
    }

    fn display_name(&self, user: &UserId) -> Option<String> {
        self.users.read().get(user).map(|(name, _)| name.clone())
    }
}
