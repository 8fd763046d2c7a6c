//! engine::model
//!
//! Plain data returned by, or passed into, the engine.
//!
//! Everything here is an owned value. The engine hands these out and keeps
//! no link back to them; derived annotations (which references point at a
//! commit) live in side tables owned by the state controller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::types::{Oid, RefName};

/// Repository operation state, in libgit2's `git_repository_state_t` order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RepositoryState {
    #[default]
    None,
    Merge,
    Revert,
    RevertSequence,
    CherryPick,
    CherryPickSequence,
    Bisect,
    Rebase,
    RebaseInteractive,
    RebaseMerge,
    ApplyMailbox,
    ApplyMailboxOrRebase,
}

impl RepositoryState {
    /// Decode a raw engine state code. Returns `None` for unknown codes.
    ///
    /// # Example
    ///
    /// ```
    /// use repoview::engine::RepositoryState;
    ///
    /// assert_eq!(RepositoryState::from_raw(1), Some(RepositoryState::Merge));
    /// assert_eq!(RepositoryState::from_raw(42), None);
    /// ```
    pub fn from_raw(code: i32) -> Option<Self> {
        Some(match code {
            0 => Self::None,
            1 => Self::Merge,
            2 => Self::Revert,
            3 => Self::RevertSequence,
            4 => Self::CherryPick,
            5 => Self::CherryPickSequence,
            6 => Self::Bisect,
            7 => Self::Rebase,
            8 => Self::RebaseInteractive,
            9 => Self::RebaseMerge,
            10 => Self::ApplyMailbox,
            11 => Self::ApplyMailboxOrRebase,
            _ => return None,
        })
    }

    /// The raw code for this state.
    pub fn as_raw(self) -> i32 {
        self as i32
    }

    /// Check if any operation is in progress.
    pub fn is_in_progress(self) -> bool {
        self != Self::None
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::None => "clean",
            Self::Merge => "merge",
            Self::Revert => "revert",
            Self::RevertSequence => "revert-sequence",
            Self::CherryPick => "cherry-pick",
            Self::CherryPickSequence => "cherry-pick-sequence",
            Self::Bisect => "bisect",
            Self::Rebase => "rebase",
            Self::RebaseInteractive => "rebase-interactive",
            Self::RebaseMerge => "rebase-merge",
            Self::ApplyMailbox => "apply-mailbox",
            Self::ApplyMailboxOrRebase => "apply-mailbox-or-rebase",
        }
    }
}

impl std::fmt::Display for RepositoryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.description())
    }
}

/// Merge analysis classification, using libgit2's `git_merge_analysis_t` bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MergeAnalysis {
    /// No merge is possible
    #[default]
    None,
    /// Both sides diverged from their common ancestor
    Normal,
    /// All inputs are reachable from HEAD
    UpToDate,
    /// The input is a fast-forward from HEAD
    FastForward,
    /// HEAD is unborn
    Unborn,
}

impl MergeAnalysis {
    /// Decode a raw analysis value. Only single-bit values are recognized.
    ///
    /// # Example
    ///
    /// ```
    /// use repoview::engine::MergeAnalysis;
    ///
    /// assert_eq!(MergeAnalysis::from_raw(4), Some(MergeAnalysis::FastForward));
    /// assert_eq!(MergeAnalysis::from_raw(5), None);
    /// ```
    pub fn from_raw(raw: i32) -> Option<Self> {
        Some(match raw {
            0 => Self::None,
            1 => Self::Normal,
            2 => Self::UpToDate,
            4 => Self::FastForward,
            8 => Self::Unborn,
            _ => return None,
        })
    }

    pub fn as_raw(self) -> i32 {
        match self {
            Self::None => 0,
            Self::Normal => 1,
            Self::UpToDate => 2,
            Self::FastForward => 4,
            Self::Unborn => 8,
        }
    }
}

/// Kind of change recorded in a diff delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeKind {
    Unmodified,
    Added,
    Deleted,
    Modified,
    Renamed,
    Copied,
    Ignored,
    Untracked,
    TypeChange,
    Unreadable,
    Conflicted,
}

/// One line inside a hunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffLine {
    /// `'+'` added, `'-'` removed, `' '` context (other origins pass through)
    pub origin: char,
    pub text: String,
}

impl DiffLine {
    /// The text without its trailing newline.
    pub fn text_trimmed(&self) -> &str {
        self.text.trim_end_matches(['\n', '\r'])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffHunk {
    pub header: String,
    pub lines: Vec<DiffLine>,
}

/// A single file change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffDelta {
    pub kind: ChangeKind,
    /// Base side path; absent when the file was added
    pub old_path: Option<String>,
    /// Target side path; absent when the file was deleted
    pub new_path: Option<String>,
    pub hunks: Vec<DiffHunk>,
}

impl DiffDelta {
    /// Path for display: the old path when present, else the new path.
    pub fn path(&self) -> &str {
        self.old_path
            .as_deref()
            .or(self.new_path.as_deref())
            .unwrap_or_default()
    }
}

/// An ordered set of file changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diff {
    pub deltas: Vec<DiffDelta>,
}

impl Diff {
    pub fn is_empty(&self) -> bool {
        self.deltas.is_empty()
    }

    pub fn len(&self) -> usize {
        self.deltas.len()
    }

    /// Display paths of every delta, in order.
    pub fn paths(&self) -> Vec<&str> {
        self.deltas.iter().map(DiffDelta::path).collect()
    }
}

/// Raw status as reported by the engine.
///
/// The operation state is a raw code; the controller decodes it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusReport {
    pub current_branch: String,
    pub staged: Diff,
    pub unstaged: Diff,
    pub state_code: i32,
}

/// Author or committer identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub email: String,
}

/// One commit as returned by `log`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRecord {
    pub id: Oid,
    /// First parent first
    pub parents: Vec<Oid>,
    pub summary: String,
    pub message: String,
    pub author: Signature,
    pub time: DateTime<Utc>,
}

/// Namespace a reference lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReferenceKind {
    Branch,
    Remote,
    Tag,
    Other,
}

impl ReferenceKind {
    /// Classify a full reference name.
    pub fn of(name: &RefName) -> Self {
        if name.is_branch_ref() {
            Self::Branch
        } else if name.is_remote_ref() {
            Self::Remote
        } else if name.is_tag_ref() {
            Self::Tag
        } else {
            Self::Other
        }
    }
}

/// A reference as reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceInfo {
    /// Full name, the reference's identity
    pub name: RefName,
    /// Short form such as `main` or `origin/main`
    pub shorthand: String,
    /// Commit the reference resolves to, if any
    pub target: Option<Oid>,
    pub kind: ReferenceKind,
    pub symbolic: bool,
}

/// A configured remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remote {
    pub name: String,
    pub url: String,
}

/// A reference update the remote agreed to during push negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushUpdate {
    pub src_refname: String,
    pub dst_refname: String,
    pub src: Oid,
    pub dst: Oid,
}

/// Download counters reported during fetch and clone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferProgress {
    pub total_objects: u32,
    pub indexed_objects: u32,
    pub received_objects: u32,
    pub local_objects: u32,
    pub total_deltas: u32,
    pub indexed_deltas: u32,
    pub received_bytes: usize,
}

/// Checkout filesystem counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckoutPerf {
    pub mkdir_calls: usize,
    pub stat_calls: usize,
    pub chmod_calls: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repository_state_roundtrips_raw() {
        for code in 0..=11 {
            let state = RepositoryState::from_raw(code).unwrap();
            assert_eq!(state.as_raw(), code);
        }
        assert_eq!(RepositoryState::from_raw(12), None);
        assert_eq!(RepositoryState::from_raw(-1), None);
    }

    #[test]
    fn merge_analysis_rejects_combined_bits() {
        assert_eq!(MergeAnalysis::from_raw(0), Some(MergeAnalysis::None));
        assert_eq!(MergeAnalysis::from_raw(8), Some(MergeAnalysis::Unborn));
        assert_eq!(MergeAnalysis::from_raw(3), None);
        assert_eq!(MergeAnalysis::FastForward.as_raw(), 4);
    }

    #[test]
    fn delta_path_prefers_old() {
        let delta = DiffDelta {
            kind: ChangeKind::Renamed,
            old_path: Some("a.txt".into()),
            new_path: Some("b.txt".into()),
            hunks: vec![],
        };
        assert_eq!(delta.path(), "a.txt");

        let added = DiffDelta {
            kind: ChangeKind::Added,
            old_path: None,
            new_path: Some("new.txt".into()),
            hunks: vec![],
        };
        assert_eq!(added.path(), "new.txt");
    }

    #[test]
    fn line_trim() {
        let line = DiffLine {
            origin: '+',
            text: "hello\r\n".into(),
        };
        assert_eq!(line.text_trimmed(), "hello");
    }

    #[test]
    fn reference_kind_classification() {
        let kind = |n: &str| ReferenceKind::of(&RefName::new(n).unwrap());
        assert_eq!(kind("refs/heads/main"), ReferenceKind::Branch);
        assert_eq!(kind("refs/remotes/origin/main"), ReferenceKind::Remote);
        assert_eq!(kind("refs/tags/v1"), ReferenceKind::Tag);
        assert_eq!(kind("HEAD"), ReferenceKind::Other);
    }
}
