//! WeChat backup path discovery.
//!
//! Handles locating the contact and message databases below a user's data
//! directory (e.g. `.../User/wxid_xxx`).

use std::path::{Path, PathBuf};

use crate::domain::{AppError, Result};

/// Subdirectory holding the databases.
const MSG_DIR: &str = "Msg";
/// Contact database name.
const CONTACT_DB_NAME: &str = "MicroMsg.db";
/// Subdirectory holding the message shards.
const MULTI_DIR: &str = "Multi";
const SHARD_PREFIX: &str = "MSG";
const SHARD_SUFFIX: &str = ".db";

/// Returns the final segment of `path`, accepting both `/` and `\`.
///
/// An empty path or one ending in a separator yields an empty string.
pub fn last_path_component(path: &str) -> &str {
    path.rsplit(&['/', '\\'][..]).next().unwrap_or("")
}

/// Resource prefix for a data root, e.g. `\User\wxid_xxx`.
pub fn user_prefix(path: &str) -> String {
    format!("\\User\\{}", last_path_component(path))
}

/// Locations of the databases below a data root.
#[derive(Debug, Clone)]
pub struct WechatPaths {
    pub root: PathBuf,
    pub contact_db: PathBuf,
    pub message_shards: Vec<PathBuf>,
}

impl WechatPaths {
    /// Discovers the contact database and all message shards.
    ///
    /// # Errors
    /// Returns error if the data root or contact database does not exist.
    pub fn discover(root: &Path) -> Result<Self> {
        if !root.is_dir() {
            return Err(AppError::DataRootNotFound {
                path: root.to_path_buf(),
            });
        }

        let msg_dir = root.join(MSG_DIR);
        let contact_db = msg_dir.join(CONTACT_DB_NAME);
        if !contact_db.is_file() {
            return Err(AppError::DatabaseNotFound { path: contact_db });
        }
        tracing::debug!("Found contact DB: {}", contact_db.display());

        let message_shards = find_message_shards(&msg_dir.join(MULTI_DIR))?;
        if message_shards.is_empty() {
            tracing::warn!("No message shards found under {}", msg_dir.display());
        }

        Ok(Self {
            root: root.to_path_buf(),
            contact_db,
            message_shards,
        })
    }
}

/// Lists `MSG<N>.db` files in numeric order.
fn find_message_shards(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let entries = std::fs::read_dir(dir)
        .map_err(|e| AppError::io(format!("Failed to read {}", dir.display()), e))?;

    let mut shards: Vec<(u32, PathBuf)> = entries
        .filter_map(std::result::Result::ok)
        .filter_map(|entry| {
            let name = entry.file_name();
            let index = shard_index(name.to_str()?)?;
            Some((index, entry.path()))
        })
        .collect();
    shards.sort_by_key(|(index, _)| *index);

    for (_, path) in &shards {
        tracing::debug!("Found message shard: {}", path.display());
    }

    Ok(shards.into_iter().map(|(_, path)| path).collect())
}

/// Parses the shard number out of `MSG<N>.db`.
fn shard_index(file_name: &str) -> Option<u32> {
    file_name
        .strip_prefix(SHARD_PREFIX)?
        .strip_suffix(SHARD_SUFFIX)?
        .parse()
        .ok()
}
