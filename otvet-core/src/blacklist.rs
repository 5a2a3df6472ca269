//! Immutable username blacklist.
//!
//! A `Blacklist` is never mutated in place. `with_added` and `without` return
//! a new snapshot, so readers holding an older snapshot keep a consistent view
//! while an admin edit is swapped in.

use std::collections::BTreeSet;

/// Errors produced when deriving a new blacklist snapshot.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlacklistError {
    #[error("username is empty")]
    EmptyUsername,

    #[error("@{0} is already blacklisted")]
    AlreadyPresent(String),

    #[error("@{0} is not blacklisted")]
    NotPresent(String),
}

/// Set of usernames whose messages are ignored by the responder.
///
/// Usernames are compared case-insensitively and without a leading `@`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Blacklist {
    usernames: BTreeSet<String>,
}

impl Blacklist {
    pub fn new<I, S>(usernames: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let usernames = usernames
            .into_iter()
            .filter_map(|name| normalize(name.as_ref()))
            .collect();
        Self { usernames }
    }

    pub fn contains(&self, username: &str) -> bool {
        normalize(username).is_some_and(|name| self.usernames.contains(&name))
    }

    /// Return a snapshot that also blocks `username`.
    pub fn with_added(&self, username: &str) -> Result<Self, BlacklistError> {
        let name = normalize(username).ok_or(BlacklistError::EmptyUsername)?;
        if self.usernames.contains(&name) {
            return Err(BlacklistError::AlreadyPresent(name));
        }
        let mut usernames = self.usernames.clone();
        usernames.insert(name);
        Ok(Self { usernames })
    }

    /// Return a snapshot without `username`.
    pub fn without(&self, username: &str) -> Result<Self, BlacklistError> {
        let name = normalize(username).ok_or(BlacklistError::EmptyUsername)?;
        if !self.usernames.contains(&name) {
            return Err(BlacklistError::NotPresent(name));
        }
        let mut usernames = self.usernames.clone();
        usernames.remove(&name);
        Ok(Self { usernames })
    }

    /// Normalized usernames in sorted order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.usernames.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.usernames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.usernames.is_empty()
    }
}

fn normalize(username: &str) -> Option<String> {
    let name = username.trim().trim_start_matches('@').trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_lowercase())
    }
}
