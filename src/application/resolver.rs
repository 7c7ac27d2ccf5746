//! Chat lookup and sender name resolution.

use crate::domain::{Identity, Message};

/// Returns the user name of the first identity whose nickname equals
/// `target` exactly.
pub fn find_chat_id<'a>(target: &str, users: &'a [Identity]) -> Option<&'a str> {
    users
        .iter()
        .find(|u| u.nickname == target)
        .map(|u| u.user_name.as_str())
}

/// Resolves the display name for a message.
///
/// Remark beats nickname. Messages sent by the local account are always
/// attributed to `self_identity.nickname`. Returns `None` when no
/// non-empty name is available; such messages are skipped by the export.
pub fn resolve_display_name(message: &Message, self_identity: &Identity) -> Option<String> {
    let name = if message.is_sender {
        self_identity.nickname.as_str()
    } else {
        message.sender.as_ref().map_or("", |sender| {
            if sender.remark.is_empty() {
                sender.nickname.as_str()
            } else {
                sender.remark.as_str()
            }
        })
    };

    (!name.is_empty()).then(|| name.to_string())
}
