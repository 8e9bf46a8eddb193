use std::collections::{HashMap, VecDeque};
use std::fmt;

use chrono::{DateTime, Local};
use thiserror::Error;

use crate::state::UserId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum HistoryError {
    #[error("requested {requested} entries but only {available} are recorded")]
    Insufficient { requested: usize, available: usize },
}

/// One successfully executed command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRecord {
    pub name: String,
    pub params: Vec<(String, String)>,
    pub at: DateTime<Local>,
}

impl CommandRecord {
    pub fn new(name: impl Into<String>, params: Vec<(String, String)>) -> Self {
        Self {
            name: name.into(),
            params,
            at: Local::now(),
        }
    }
}

impl fmt::Display for CommandRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} /{}", self.at.format("%Y-%m-%d %H:%M:%S"), self.name)?;
        for (key, value) in &self.params {
            write!(f, " {}={}", key, value)?;
        }
        Ok(())
    }
}

/// Bounded per-user audit log. Keeps the newest `capacity` records.
#[derive(Debug)]
pub struct CommandHistory {
    capacity: usize,
    entries: HashMap<UserId, VecDeque<CommandRecord>>,
}

impl CommandHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: HashMap::new(),
        }
    }

    pub fn record(&mut self, user: UserId, record: CommandRecord) {
        let queue = self.entries.entry(user).or_default();
        while queue.len() >= self.capacity {
            queue.pop_front();
        }
        queue.push_back(record);
    }

    pub fn len(&self, user: UserId) -> usize {
        self.entries.get(&user).map_or(0, VecDeque::len)
    }

    /// The `n` newest records, newest first. Never returns a partial list.
    pub fn recent(&self, user: UserId, n: usize) -> Result<Vec<CommandRecord>, HistoryError> {
        let available = self.len(user);
        if n > available {
            return Err(HistoryError::Insufficient {
                requested: n,
                available,
            });
        }
        Ok(self
            .entries
            .get(&user)
            .map(|q| q.iter().rev().take(n).cloned().collect())
            .unwrap_or_default())
    }
}
