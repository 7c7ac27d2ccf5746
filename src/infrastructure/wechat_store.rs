//! `SQLite` reader for decrypted WeChat desktop backups.
//!
//! Loads the contact list from `MicroMsg.db` and serves message batches from
//! the `MSG<N>.db` shards.

use std::collections::HashSet;
use std::path::Path;

use rusqlite::{params, Connection, OpenFlags};

use crate::application::MessageRetriever;
use crate::domain::{AppError, ContactBook, Direction, Identity, Message, Result};

use super::bytes_extra;
use super::wechat_paths::{last_path_component, user_prefix, WechatPaths};

/// Talker suffix used by group chats.
const CHATROOM_SUFFIX: &str = "@chatroom";
/// Separator between the sender id and the text in group chat content
/// written by older clients.
const CHATROOM_SENDER_SEPARATOR: &str = ":\n";

const CONTACT_QUERY: &str =
    "SELECT UserName, Remark, NickName FROM Contact ORDER BY rowid";

const BACKWARD_QUERY: &str = "SELECT MsgSvrID, IsSender, CreateTime, Sequence, StrContent, BytesExtra
     FROM MSG
     WHERE StrTalker = ?1 AND (?2 = 0 OR CreateTime <= ?2)
     ORDER BY CreateTime DESC, Sequence DESC
     LIMIT ?3";

const FORWARD_QUERY: &str = "SELECT MsgSvrID, IsSender, CreateTime, Sequence, StrContent, BytesExtra
     FROM MSG
     WHERE StrTalker = ?1 AND CreateTime >= ?2
     ORDER BY CreateTime ASC, Sequence ASC
     LIMIT ?3";

/// Raw message row from a shard.
#[derive(Debug)]
struct RawMessage {
    svr_id: i64,
    is_sender: bool,
    create_time: i64,
    sequence: i64,
    content: String,
    extra: Vec<u8>,
}

/// Read-only view over a WeChat user's databases.
pub struct WechatStore {
    contacts: ContactBook,
    shards: Vec<Connection>,
    prefix: String,
}

impl WechatStore {
    /// Opens all databases below `data_root` and loads the contact list.
    ///
    /// # Errors
    /// Returns error if the directory layout is wrong or a database cannot
    /// be opened or read.
    pub fn open(data_root: &Path) -> Result<Self> {
        let paths = WechatPaths::discover(data_root)?;

        let root = paths.root.to_string_lossy();
        let prefix = user_prefix(&root);
        // The account id survives a trailing separator; the prefix does not.
        let self_user_name =
            last_path_component(root.trim_end_matches(&['/', '\\'][..])).to_string();
        tracing::debug!(prefix = %prefix, self_user_name = %self_user_name, "Resolved data root");

        let contact_conn = open_read_only(&paths.contact_db)?;
        let users = load_contacts(&contact_conn)?;
        tracing::info!("Loaded {} contacts", users.len());

        let self_identity = users
            .iter()
            .find(|u| u.user_name == self_user_name)
            .cloned()
            .unwrap_or_else(|| {
                tracing::warn!("Account {} not in contact list", self_user_name);
                Identity::new(self_user_name, "")
            });

        let shards = paths
            .message_shards
            .iter()
            .map(|p| open_read_only(p))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            contacts: ContactBook::new(users, self_identity),
            shards,
            prefix,
        })
    }

    /// Contact list and account owner.
    #[must_use]
    pub const fn contacts(&self) -> &ContactBook {
        &self.contacts
    }

    /// Resource prefix (`\User\<wxid>`) for this account.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Attributes a raw row to an identity.
    fn sender_of(&self, chat_id: &str, raw: &RawMessage) -> Option<Identity> {
        if raw.is_sender {
            return Some(self.contacts.self_identity.clone());
        }

        let sender_id = if chat_id.ends_with(CHATROOM_SUFFIX) {
            bytes_extra::sender_wxid(&raw.extra).or_else(|| chatroom_sender(&raw.content))?
        } else {
            chat_id
        };

        self.contacts.get(sender_id).cloned()
    }

    fn fetch_shard(
        conn: &Connection,
        chat_id: &str,
        anchor: i64,
        limit: i64,
        direction: Direction,
    ) -> Result<Vec<RawMessage>> {
        let sql = match direction {
            Direction::Forward => FORWARD_QUERY,
            Direction::Backward => BACKWARD_QUERY,
        };

        let mut stmt = conn.prepare(sql).map_err(AppError::database)?;
        let rows = stmt
            .query_map(params![chat_id, anchor, limit], |row| {
                Ok(RawMessage {
                    svr_id: row.get::<_, Option<i64>>(0)?.unwrap_or_default(),
                    is_sender: row.get::<_, Option<i64>>(1)?.unwrap_or_default() == 1,
                    create_time: row.get::<_, Option<i64>>(2)?.unwrap_or_default(),
                    sequence: row.get::<_, Option<i64>>(3)?.unwrap_or_default(),
                    content: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                    extra: row.get::<_, Option<Vec<u8>>>(5)?.unwrap_or_default(),
                })
            })
            .map_err(AppError::database)?;

        let mut messages = Vec::new();
        for row in rows {
            match row {
                Ok(raw) => messages.push(raw),
                Err(e) => {
                    tracing::warn!("Failed to read message row: {}", e);
                }
            }
        }

        Ok(messages)
    }
}

impl MessageRetriever for WechatStore {
    fn retrieve(
        &self,
        chat_id: &str,
        anchor: i64,
        max_count: usize,
        direction: Direction,
    ) -> Result<Vec<Message>> {
        if max_count == 0 {
            return Ok(Vec::new());
        }
        let limit = i64::try_from(max_count).unwrap_or(i64::MAX);

        let mut raws = Vec::new();
        for conn in &self.shards {
            raws.extend(Self::fetch_shard(conn, chat_id, anchor, limit, direction)?);
        }

        let fetched = raws.len();
        let mut seen = HashSet::new();
        raws.retain(|m| m.svr_id == 0 || seen.insert(m.svr_id));

        raws.sort_by(|a, b| {
            let ord = (a.create_time, a.sequence).cmp(&(b.create_time, b.sequence));
            match direction {
                Direction::Forward => ord,
                Direction::Backward => ord.reverse(),
            }
        });
        raws.truncate(max_count);

        tracing::debug!(
            shards = self.shards.len(),
            fetched,
            kept = raws.len(),
            "Merged message shards"
        );

        Ok(raws
            .iter()
            .map(|raw| Message {
                create_time: raw.create_time,
                is_sender: raw.is_sender,
                sender: self.sender_of(chat_id, raw),
                sequence: raw.sequence,
            })
            .collect())
    }
}

/// Opens a database in read-only mode.
fn open_read_only(path: &Path) -> Result<Connection> {
    let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;

    let conn = Connection::open_with_flags(path, flags).map_err(AppError::database)?;

    conn.execute_batch(
        "PRAGMA query_only = ON;
         PRAGMA temp_store = MEMORY;",
    )
    .map_err(AppError::database)?;

    Ok(conn)
}

fn load_contacts(conn: &Connection) -> Result<Vec<Identity>> {
    let mut stmt = conn.prepare(CONTACT_QUERY).map_err(AppError::database)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(Identity {
                user_name: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                remark: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                nickname: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            })
        })
        .map_err(AppError::database)?;

    let mut users = Vec::new();
    for row in rows {
        match row {
            Ok(user) if !user.user_name.is_empty() => users.push(user),
            Ok(_) => {}
            Err(e) => {
                tracing::warn!("Failed to read contact row: {}", e);
            }
        }
    }

    Ok(users)
}

/// Sender wxid from group chat content (`wxid_xxx:\nhello`), for rows
/// without a sender entry in `BytesExtra`.
fn chatroom_sender(content: &str) -> Option<&str> {
    let (sender, _) = content.split_once(CHATROOM_SENDER_SEPARATOR)?;
    (!sender.is_empty() && !sender.contains(char::is_whitespace)).then_some(sender)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::{tempdir, TempDir};

    use crate::infrastructure::bytes_extra::tests::encode;

    const SELF_ID: &str = "wxid_me";

    /// (MsgSvrID, IsSender, CreateTime, Sequence, StrTalker, StrContent,
    /// group sender stored in BytesExtra)
    type Row<'a> = (i64, i64, i64, i64, &'a str, &'a str, Option<&'a str>);

    fn create_contacts(path: &Path) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE Contact (UserName TEXT, Alias TEXT, Remark TEXT, NickName TEXT);
             INSERT INTO Contact VALUES ('wxid_me', '', '', 'Me');
             INSERT INTO Contact VALUES ('u1', 'alice01', '', 'Alice');
             INSERT INTO Contact VALUES ('u2', NULL, 'Bobby', 'Bob');
             INSERT INTO Contact VALUES ('room1@chatroom', '', '', 'Team');",
        )
        .unwrap();
    }

    fn create_shard(path: &Path, rows: &[Row<'_>]) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE MSG (
                localId INTEGER PRIMARY KEY AUTOINCREMENT,
                MsgSvrID INTEGER,
                Type INTEGER,
                IsSender INTEGER,
                CreateTime INTEGER,
                Sequence INTEGER,
                StrTalker TEXT,
                StrContent TEXT,
                BytesExtra BLOB
            );",
        )
        .unwrap();
        for (svr_id, is_sender, time, seq, talker, content, sender) in rows {
            let extra = encode(&sender.map(|s| vec![(1, s)]).unwrap_or_default());
            conn.execute(
                "INSERT INTO MSG (MsgSvrID, Type, IsSender, CreateTime, Sequence, StrTalker, StrContent, BytesExtra)
                 VALUES (?1, 1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![svr_id, is_sender, time, seq, talker, content, extra],
            )
            .unwrap();
        }
    }

    fn fixture(shards: &[&[Row<'_>]]) -> (TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let root = dir.path().join("User").join(SELF_ID);
        let multi = root.join("Msg").join("Multi");
        std::fs::create_dir_all(&multi).unwrap();
        create_contacts(&root.join("Msg").join("MicroMsg.db"));
        for (i, rows) in shards.iter().enumerate() {
            create_shard(&multi.join(format!("MSG{i}.db")), rows);
        }
        (dir, root)
    }

    fn times(messages: &[Message]) -> Vec<i64> {
        messages.iter().map(|m| m.create_time).collect()
    }

    #[test]
    fn test_open_loads_contacts_in_order() {
        let (_dir, root) = fixture(&[&[]]);
        let store = WechatStore::open(&root).unwrap();

        let names: Vec<&str> = store
            .contacts()
            .users
            .iter()
            .map(|u| u.user_name.as_str())
            .collect();
        assert_eq!(names, vec!["wxid_me", "u1", "u2", "room1@chatroom"]);
        assert_eq!(store.contacts().self_identity.nickname, "Me");
        assert_eq!(store.contacts().users[2].remark, "Bobby");
        assert_eq!(store.prefix(), r"\User\wxid_me");
    }

    #[test]
    fn test_backward_from_latest() {
        let (_dir, root) = fixture(&[&[
            (1, 0, 100, 1, "u1", "hi", None),
            (2, 1, 200, 2, "u1", "hey", None),
            (3, 0, 300, 3, "u1", "yo", None),
            (4, 0, 250, 1, "u2", "other chat", None),
        ]]);
        let store = WechatStore::open(&root).unwrap();

        let messages = store.retrieve("u1", 0, 50_000, Direction::Backward).unwrap();
        assert_eq!(times(&messages), vec![300, 200, 100]);
        assert!(messages[1].is_sender);
        assert_eq!(messages[0].sender.as_ref().unwrap().nickname, "Alice");
        assert_eq!(messages[1].sender.as_ref().unwrap().user_name, SELF_ID);
    }

    #[test]
    fn test_backward_with_anchor_and_limit() {
        let (_dir, root) = fixture(&[&[
            (1, 0, 100, 1, "u1", "a", None),
            (2, 0, 200, 2, "u1", "b", None),
            (3, 0, 300, 3, "u1", "c", None),
            (4, 0, 400, 4, "u1", "d", None),
        ]]);
        let store = WechatStore::open(&root).unwrap();

        let messages = store.retrieve("u1", 300, 2, Direction::Backward).unwrap();
        assert_eq!(times(&messages), vec![300, 200]);
    }

    #[test]
    fn test_forward_with_anchor() {
        let (_dir, root) = fixture(&[&[
            (1, 0, 100, 1, "u1", "a", None),
            (2, 0, 200, 2, "u1", "b", None),
            (3, 0, 300, 3, "u1", "c", None),
        ]]);
        let store = WechatStore::open(&root).unwrap();

        let messages = store.retrieve("u1", 200, 10, Direction::Forward).unwrap();
        assert_eq!(times(&messages), vec![200, 300]);

        let all = store.retrieve("u1", 0, 10, Direction::Forward).unwrap();
        assert_eq!(times(&all), vec![100, 200, 300]);
    }

    #[test]
    fn test_shards_are_merged_and_deduplicated() {
        let (_dir, root) = fixture(&[
            &[(1, 0, 100, 1, "u2", "a", None), (2, 0, 300, 3, "u2", "c", None)],
            &[
                (2, 0, 300, 3, "u2", "c", None),
                (5, 0, 200, 2, "u2", "b", None),
                (0, 0, 400, 4, "u2", "no server id", None),
            ],
        ]);
        let store = WechatStore::open(&root).unwrap();

        let messages = store.retrieve("u2", 0, 50_000, Direction::Backward).unwrap();
        assert_eq!(times(&messages), vec![400, 300, 200, 100]);

        let limited = store.retrieve("u2", 0, 2, Direction::Forward).unwrap();
        assert_eq!(times(&limited), vec![100, 200]);
    }

    #[test]
    fn test_chatroom_sender_from_bytes_extra() {
        let (_dir, root) = fixture(&[&[
            (1, 0, 100, 1, "room1@chatroom", "hello", Some("u1")),
            (2, 0, 200, 2, "room1@chatroom", "hi all", Some("u2")),
            (3, 0, 300, 3, "room1@chatroom", "who am i", Some("stranger")),
            (4, 0, 400, 4, "room1@chatroom", "system notice", None),
            (5, 1, 500, 5, "room1@chatroom", "my own message", None),
            (6, 0, 600, 6, "room1@chatroom", "u1:\nfrom an older client", None),
        ]]);
        let store = WechatStore::open(&root).unwrap();

        let messages = store
            .retrieve("room1@chatroom", 0, 100, Direction::Forward)
            .unwrap();
        let senders: Vec<Option<&str>> = messages
            .iter()
            .map(|m| m.sender.as_ref().map(|s| s.user_name.as_str()))
            .collect();
        assert_eq!(
            senders,
            vec![Some("u1"), Some("u2"), None, None, Some(SELF_ID), Some("u1")]
        );
    }

    #[test]
    fn test_chatroom_rows_without_extra_column_value() {
        let (_dir, root) = fixture(&[&[]]);
        let shard = root.join("Msg").join("Multi").join("MSG0.db");
        Connection::open(&shard)
            .unwrap()
            .execute(
                "INSERT INTO MSG (MsgSvrID, Type, IsSender, CreateTime, Sequence, StrTalker, StrContent, BytesExtra)
                 VALUES (9, 1, 0, 100, 1, 'room1@chatroom', 'plain', NULL)",
                [],
            )
            .unwrap();
        let store = WechatStore::open(&root).unwrap();

        let messages = store
            .retrieve("room1@chatroom", 0, 10, Direction::Backward)
            .unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].sender.is_none());
    }

    #[test]
    fn test_trailing_separator_keeps_self_identity() {
        let (_dir, root) = fixture(&[&[(1, 1, 100, 1, "u1", "hi", None)]]);
        let with_slash = PathBuf::from(format!("{}/", root.display()));
        let store = WechatStore::open(&with_slash).unwrap();

        assert_eq!(store.prefix(), r"\User\");
        assert_eq!(store.contacts().self_identity.user_name, SELF_ID);
        let messages = store.retrieve("u1", 0, 10, Direction::Backward).unwrap();
        assert_eq!(messages[0].sender.as_ref().unwrap().nickname, "Me");
    }

    #[test]
    fn test_zero_max_count_is_empty() {
        let (_dir, root) = fixture(&[&[(1, 0, 100, 1, "u1", "a", None)]]);
        let store = WechatStore::open(&root).unwrap();

        assert!(store.retrieve("u1", 0, 0, Direction::Backward).unwrap().is_empty());
    }

    #[test]
    fn test_missing_self_contact_gets_empty_identity() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("wxid_nobody");
        std::fs::create_dir_all(root.join("Msg")).unwrap();
        create_contacts(&root.join("Msg").join("MicroMsg.db"));

        let store = WechatStore::open(&root).unwrap();
        assert_eq!(store.contacts().self_identity.user_name, "wxid_nobody");
        assert!(store.contacts().self_identity.nickname.is_empty());
        assert!(store.retrieve("u1", 0, 10, Direction::Backward).unwrap().is_empty());
    }

    #[test]
    fn test_corrupt_shard_is_an_error() {
        let (_dir, root) = fixture(&[]);
        let multi = root.join("Msg").join("Multi");
        Connection::open(multi.join("MSG0.db"))
            .unwrap()
            .execute_batch("CREATE TABLE Other (x INTEGER);")
            .unwrap();

        let store = WechatStore::open(&root).unwrap();
        assert!(matches!(
            store.retrieve("u1", 0, 10, Direction::Backward),
            Err(AppError::Database { .. })
        ));
    }

    #[test]
    fn test_chatroom_sender_parse() {
        assert_eq!(chatroom_sender("wxid_a:\nhello"), Some("wxid_a"));
        assert_eq!(chatroom_sender("plain text"), None);
        assert_eq!(chatroom_sender(":\nempty id"), None);
        assert_eq!(chatroom_sender("two words:\nnope"), None);
    }
}
