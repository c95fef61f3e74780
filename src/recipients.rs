//! Recipient resolution: group expansion, validation, dedup and
//! header partitioning.

use std::collections::HashSet;

use log::warn;

use duetrack_smtp::types::is_valid_address;

use crate::sources::Directory;
use crate::types::{DeliveryMode, RecipientConfig};

/// Recipients partitioned into header groups, ready for the message
/// builder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedRecipients {
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
}

impl ResolvedRecipients {
    pub fn is_empty(&self) -> bool {
        self.to.is_empty() && self.cc.is_empty() && self.bcc.is_empty()
    }

    /// Total addresses on the envelope.
    pub fn total(&self) -> usize {
        self.to.len() + self.cc.len() + self.bcc.len()
    }

    /// All envelope addresses in send order (To, then Cc, then Bcc).
    pub fn envelope(&self) -> Vec<&str> {
        self.to
            .iter()
            .chain(self.cc.iter())
            .chain(self.bcc.iter())
            .map(String::as_str)
            .collect()
    }
}

/// Resolves the configured references into envelope recipients.
///
/// Group references expand first, direct user references follow. A
/// failed group lookup is logged and skipped, never fatal. Addresses
/// are trimmed, validated, and deduplicated case-insensitively with
/// the first-seen casing kept.
///
/// In Bcc mode the sender address stands in as the visible To
/// recipient so the message has a non-empty To header.
pub async fn resolve(
    config: &RecipientConfig,
    directory: &dyn Directory,
    sender: &str,
) -> ResolvedRecipients {
    let mut collected: Vec<String> = Vec::new();
    for group in &config.group_refs {
        match directory.group_members(group).await {
            Ok(members) => collected.extend(members),
            Err(e) => warn!("[reminder] group {:?} lookup failed: {}", group, e),
        }
    }
    collected.extend(config.user_refs.iter().cloned());

    let mut seen: HashSet<String> = HashSet::new();
    let mut addresses: Vec<String> = Vec::new();
    for raw in collected {
        let addr = raw.trim();
        if !is_valid_address(addr) {
            if !addr.is_empty() {
                warn!("[reminder] dropping invalid recipient {:?}", addr);
            }
            continue;
        }
        if seen.insert(addr.to_lowercase()) {
            addresses.push(addr.to_string());
        }
    }

    match config.delivery_mode {
        DeliveryMode::To => ResolvedRecipients {
            to: addresses,
            ..ResolvedRecipients::default()
        },
        DeliveryMode::Cc => ResolvedRecipients {
            cc: addresses,
            ..ResolvedRecipients::default()
        },
        DeliveryMode::Bcc => {
            if addresses.is_empty() {
                ResolvedRecipients::default()
            } else {
                ResolvedRecipients {
                    to: vec![sender.to_string()],
                    bcc: addresses,
                    ..ResolvedRecipients::default()
                }
            }
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
