//! Domain models for WeChat chat data.
//!
//! These models represent the core entities read from the WeChat backup
//! databases and the rows produced by an export.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Default upper bound on the number of messages fetched per export.
pub const DEFAULT_MAX_ROWS: usize = 50_000;

/// Value of the `msgNum` column; every row stands for one message.
pub const MSG_UNIT: &str = "1";

/// CSV header written before any data row.
pub const EXPORT_HEADER: [&str; 3] = ["timestamp", "msgNum", "username"];

/// A chat participant known to the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    /// Unique identifier (wxid or chatroom id).
    pub user_name: String,
    /// Nickname chosen by the contact, may be empty.
    pub nickname: String,
    /// Local remark set by the account owner, may be empty.
    pub remark: String,
}

impl Identity {
    /// Creates an identity with only a user name and nickname.
    pub fn new(user_name: impl Into<String>, nickname: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            nickname: nickname.into(),
            ..Default::default()
        }
    }

    /// Sets the remark.
    #[cfg(test)]
    #[must_use]
    pub fn with_remark(mut self, remark: impl Into<String>) -> Self {
        self.remark = remark.into();
        self
    }
}

/// Identities loaded from the store, plus the account owner.
#[derive(Debug, Clone, Default)]
pub struct ContactBook {
    /// All contacts in store order.
    pub users: Vec<Identity>,
    /// The local account.
    pub self_identity: Identity,
    index: HashMap<String, usize>,
}

impl ContactBook {
    /// Builds a contact book, indexing contacts by user name.
    ///
    /// When a user name repeats, the first occurrence is indexed.
    pub fn new(users: Vec<Identity>, self_identity: Identity) -> Self {
        let mut index = HashMap::with_capacity(users.len());
        for (i, user) in users.iter().enumerate() {
            index.entry(user.user_name.clone()).or_insert(i);
        }
        Self {
            users,
            self_identity,
            index,
        }
    }

    /// Looks up a contact by its unique user name.
    #[must_use]
    pub fn get(&self, user_name: &str) -> Option<&Identity> {
        self.index.get(user_name).map(|&i| &self.users[i])
    }
}

/// Traversal direction when retrieving a batch of messages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Anchor is a lower bound, oldest first.
    Forward,
    /// Anchor is an upper bound (0 = most recent), newest first.
    #[default]
    Backward,
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "forward" | "fwd" => Ok(Self::Forward),
            "backward" | "back" => Ok(Self::Backward),
            _ => Err(format!("Unknown direction: {s}. Use: forward, backward")),
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Forward => write!(f, "forward"),
            Self::Backward => write!(f, "backward"),
        }
    }
}

/// A single chat message as retrieved from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Creation time in seconds since the Unix epoch.
    pub create_time: i64,
    /// Whether the local account authored the message.
    pub is_sender: bool,
    /// Sender identity when it could be matched to a contact.
    pub sender: Option<Identity>,
    /// Position within the chat.
    pub sequence: i64,
}

/// One output row: `(timestamp, "1", username)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRow {
    pub timestamp: i64,
    pub username: String,
}

impl ExportRow {
    /// The three CSV fields of this row.
    #[must_use]
    pub fn to_record(&self) -> [String; 3] {
        [
            self.timestamp.to_string(),
            MSG_UNIT.to_string(),
            self.username.clone(),
        ]
    }
}

/// Parameters for a single export run.
#[derive(Debug, Clone)]
pub struct ExportRequest {
    /// Nickname of the chat to export.
    pub target_name: String,
    /// Time anchor in seconds; 0 with `Backward` means "latest".
    pub anchor: i64,
    /// Maximum number of messages to retrieve.
    pub max_count: usize,
    pub direction: Direction,
}

impl Default for ExportRequest {
    fn default() -> Self {
        Self {
            target_name: String::new(),
            anchor: 0,
            max_count: DEFAULT_MAX_ROWS,
            direction: Direction::Backward,
        }
    }
}

/// Number of rows attributed to one display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SenderCount {
    pub name: String,
    pub count: usize,
}

/// Result of a completed export.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportSummary {
    /// Nickname the export was requested for.
    pub target_name: String,
    /// Resolved chat identifier.
    pub chat_id: String,
    /// Messages returned by the store.
    pub messages_retrieved: usize,
    /// Data rows written (header excluded).
    pub rows_written: usize,
    /// Earliest timestamp among written rows.
    pub first_timestamp: Option<i64>,
    /// Latest timestamp among written rows.
    pub last_timestamp: Option<i64>,
    /// Rows per display name, most active first.
    pub per_sender: Vec<SenderCount>,
}
