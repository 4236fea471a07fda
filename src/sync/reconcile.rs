//! Diff a desired VIP set against a server's live listing and issue the
//! minimal add/delete sequence.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

use crate::error::Result;
use crate::rcon::commands::{entry_identifier, parse_vip_entry, VipConsole};
use crate::records::VipEntry;

/// What to do with VIPs already on the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReplacePolicy {
    /// Only add what is missing.
    #[default]
    Additive,
    /// Delete every live VIP first, then add the whole desired set.
    ReplaceAll,
}

/// How a desired identifier is judged "already present" in the live listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    /// Any live entry's raw text contains the identifier. Matches the
    /// historical behavior, including its false positives on ids that are
    /// substrings of other ids or of display names.
    #[default]
    Substring,
    /// The identifier parsed from a live entry equals the desired one.
    Exact,
}

impl MatchMode {
    pub fn is_present(self, live: &[String], identifier: &str) -> bool {
        match self {
            MatchMode::Substring => live.iter().any(|raw| raw.contains(identifier)),
            MatchMode::Exact => live.iter().any(|raw| entry_identifier(raw) == identifier),
        }
    }
}

/// The VIPs the operator wants on every server.
///
/// Identifiers are de-duplicated case-insensitively (first occurrence wins)
/// and kept sorted case-insensitively, so every pass adds in the same order.
/// The original casing is what gets sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredVipSet {
    entries: Vec<VipEntry>,
}

impl DesiredVipSet {
    pub fn new(entries: impl IntoIterator<Item = VipEntry>) -> Self {
        Self {
            entries: dedup_sorted(entries),
        }
    }

    pub fn entries(&self) -> &[VipEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, VipEntry> {
        self.entries.iter()
    }
}

impl FromIterator<VipEntry> for DesiredVipSet {
    fn from_iter<I: IntoIterator<Item = VipEntry>>(iter: I) -> Self {
        Self::new(iter)
    }
}

fn dedup_sorted(entries: impl IntoIterator<Item = VipEntry>) -> Vec<VipEntry> {
    let mut seen = HashSet::new();
    let mut unique: Vec<VipEntry> = entries
        .into_iter()
        .filter(|e| seen.insert(e.identifier.to_lowercase()))
        .collect();
    unique.sort_by(|a, b| {
        a.identifier
            .to_lowercase()
            .cmp(&b.identifier.to_lowercase())
            .then_with(|| a.identifier.cmp(&b.identifier))
    });
    unique
}

/// Merge raw listing entries from several servers into records: blank
/// entries dropped, parsed on the first space, de-duplicated
/// case-insensitively on identifier and sorted by identifier.
pub fn merge_exported<I, S>(raw_entries: I) -> Vec<VipEntry>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    dedup_sorted(
        raw_entries
            .into_iter()
            .filter(|raw| !raw.as_ref().trim().is_empty())
            .map(|raw| parse_vip_entry(raw.as_ref())),
    )
}

/// What one reconciliation pass did to one server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub deleted: usize,
    pub added: usize,
    pub skipped: usize,
}

/// Bring one server in line with `desired`.
///
/// `live` is the server's listing as returned by `list_vips`. Commands are
/// issued one at a time, each awaited before the next. A command whose reply
/// is lost is not retried: the server may or may not have applied it.
pub async fn reconcile<C>(
    console: &mut C,
    live: Vec<String>,
    desired: &DesiredVipSet,
    policy: ReplacePolicy,
    match_mode: MatchMode,
) -> Result<ReconcileStats>
where
    C: VipConsole + ?Sized,
{
    let mut stats = ReconcileStats::default();

    let live = match policy {
        ReplacePolicy::Additive => live,
        ReplacePolicy::ReplaceAll => {
            for raw in &live {
                info!(entry = %raw, "deleting VIP");
                console.delete_vip(raw).await?;
                stats.deleted += 1;
            }
            Vec::new()
        }
    };

    for entry in desired.iter() {
        if match_mode.is_present(&live, &entry.identifier) {
            debug!(identifier = %entry.identifier, name = %entry.display_name, "skipping VIP");
            stats.skipped += 1;
            continue;
        }
        info!(identifier = %entry.identifier, name = %entry.display_name, "adding VIP");
        console
            .add_vip(&entry.identifier, &entry.display_name)
            .await?;
        stats.added += 1;
    }

    Ok(stats)
}
