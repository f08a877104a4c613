//! Core data model for crosstie.
//!
//! Wire-facing types mirror the primary tracker's REST field names via
//! serde renames; everything else is named for what it means here.

use std::fmt;

use serde::Deserialize;

/// A bug record in the primary tracker.
///
/// Deserialized from the tracker's bug envelope. Fields the server
/// omits (e.g. under `include_fields`) default to empty.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Bug {
    pub id: u32,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub assigned_to: String,
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub severity: String,
    /// Internal team notes; carries the backport target as
    /// `backport-to: <version>`.
    #[serde(default, rename = "cf_internal_whiteboard")]
    pub internal_whiteboard: String,
    #[serde(default)]
    pub target_release: Vec<String>,
}

impl Bug {
    /// The backport target recorded in the internal whiteboard
    /// (`backport-to: 4.5`), if any.
    pub fn backport_target(&self) -> Option<&str> {
        let (_, target) = self.internal_whiteboard.split_once(':')?;
        let target = target.trim();
        (!target.is_empty()).then_some(target)
    }
}

/// One link recorded on a bug, pointing at an artifact in another
/// system (a pull request, or an issue in another tracker).
///
/// Created by deserializing the tracker's response and discarded after
/// one correlation pass — never mutated, never cached.
#[derive(Debug, Clone, Deserialize)]
pub struct ExternalBug {
    /// Which external system the link points into.
    #[serde(rename = "type")]
    pub tracker: TrackerType,

    /// The bug this link belongs to. The tracker can report links for
    /// sibling bugs in the same response, so callers filter on this.
    pub bug_id: u32,

    /// The identifier within the external system: a Jira issue key, or
    /// `<org>/<repo>/pull/<number>` for a pull request.
    #[serde(rename = "ext_bz_bug_id")]
    pub external_id: String,
}

/// Metadata for the external system a link points into.
#[derive(Debug, Clone, Deserialize)]
pub struct TrackerType {
    pub url: String,
    #[serde(default)]
    pub description: String,
}

/// A pull request on the source host, parsed out of a link identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRef {
    pub org: String,
    pub repo: String,
    pub number: u64,
}

impl fmt::Display for PullRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.org, self.repo, self.number)
    }
}

/// A link already known to denote an issue in the foreign tracker.
///
/// Carries the raw link so downstream lookups keep the full context.
#[derive(Debug, Clone)]
pub struct JiraRef {
    pub link: ExternalBug,
}

impl JiraRef {
    /// The issue key used for lookups in the foreign tracker.
    pub fn key(&self) -> &str {
        &self.link.external_id
    }
}

/// A foreign-tracker issue, flattened for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub key: String,
    pub summary: String,
    /// Issue type name (bug, story, ...).
    pub kind: String,
    pub priority: Option<String>,
    pub status: Option<String>,
}
