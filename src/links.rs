//! Classification and selection of a bug's external tracker links.
//!
//! The primary tracker records links to many systems against a bug.
//! These functions pick out the ones that matter — GitHub pull
//! requests and foreign-tracker issues — and parse them into typed
//! references. Everything here is pure: no I/O, no shared state, safe
//! to fan out across many bugs concurrently.

use crate::model::{ExternalBug, JiraRef, PullRef};

/// A link identifier that should have named a pull request but doesn't
/// parse as one. Collected per batch and reported; a malformed
/// identifier means the tracker data is wrong upstream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed pull identifier {identifier:?}: {reason}")]
pub struct MalformedIdentifier {
    pub identifier: String,
    pub reason: String,
}

/// Why an identifier failed to classify as a pull request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClassifyError {
    /// The identifier names something other than a pull request (an
    /// issue link, usually). Expected — callers filter these out
    /// rather than fail.
    #[error("identifier {0:?} is not for a pull request")]
    NotAPull(String),

    #[error(transparent)]
    Malformed(#[from] MalformedIdentifier),
}

/// Parse a link identifier of the form `<org>/<repo>/pull/<number>`
/// into a [`PullRef`].
///
/// Anything with the wrong number of segments or a non-numeric tail is
/// malformed; a four-segment identifier whose third segment isn't
/// `pull` is a well-formed link to something else.
pub fn pull_from_identifier(identifier: &str) -> Result<PullRef, ClassifyError> {
    let parts: Vec<&str> = identifier.split('/').collect();
    if parts.len() != 4 {
        return Err(MalformedIdentifier {
            identifier: identifier.to_string(),
            reason: format!("{} segments, want 4", parts.len()),
        }
        .into());
    }
    if parts[2] != "pull" {
        return Err(ClassifyError::NotAPull(identifier.to_string()));
    }
    let number = parts[3].parse::<u64>().map_err(|e| MalformedIdentifier {
        identifier: identifier.to_string(),
        reason: format!("could not parse {:?} as a number: {e}", parts[3]),
    })?;

    Ok(PullRef {
        org: parts[0].to_string(),
        repo: parts[1].to_string(),
        number,
    })
}

/// Pull requests selected from one bug's link list, plus any
/// identifiers that should have parsed but didn't.
#[derive(Debug, Default)]
pub struct PullRequestLinks {
    /// Parsed pull references, in the order the tracker reported them.
    pub pulls: Vec<PullRef>,
    /// Identifiers on matching links that failed to parse. The pass
    /// continues past these; they are reported, not fatal.
    pub malformed: Vec<MalformedIdentifier>,
}

/// Select the GitHub pull requests linked to `bug_id`.
///
/// Links belonging to other bugs (the tracker can aggregate a
/// duplicate's links into the response) and links into systems other
/// than the configured hosts are skipped. Plain issue links are
/// silently dropped; malformed identifiers are collected without
/// aborting the pass. Output order follows input order.
pub fn github_pulls(bug_id: u32, links: &[ExternalBug], hosts: &[String]) -> PullRequestLinks {
    let mut found = PullRequestLinks::default();
    for link in links {
        if link.bug_id != bug_id || !hosts.contains(&link.tracker.url) {
            continue;
        }
        match pull_from_identifier(&link.external_id) {
            Ok(pull) => found.pulls.push(pull),
            Err(ClassifyError::NotAPull(_)) => {}
            Err(ClassifyError::Malformed(err)) => found.malformed.push(err),
        }
    }
    found
}

/// Select the foreign-tracker issues linked to `bug_id`.
///
/// Same bug-id and tracker-URL filters as [`github_pulls`]; the
/// identifier is an opaque issue key, so no further parsing happens.
pub fn jira_issues(bug_id: u32, links: &[ExternalBug], trackers: &[String]) -> Vec<JiraRef> {
    links
        .iter()
        .filter(|link| link.bug_id == bug_id && trackers.contains(&link.tracker.url))
        .map(|link| JiraRef { link: link.clone() })
        .collect()
}
