//! state::derived
//!
//! Derived state cached for presentation: status, commit graph, references.
//!
//! Each value is replaced wholesale on refresh, never patched in place, so a
//! reader never sees a half-updated view.

use std::collections::HashMap;

use crate::core::types::{Oid, RefName};
use crate::engine::{CommitRecord, Diff, ReferenceInfo, RepositoryState};

/// Working tree and index status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Status {
    pub current_branch: String,
    pub staged: Diff,
    pub unstaged: Diff,
    pub state: RepositoryState,
}

impl Status {
    /// Whether there is nothing staged and nothing modified.
    pub fn is_clean(&self) -> bool {
        self.staged.is_empty() && self.unstaged.is_empty()
    }
}

/// Commit history with a deferred reload flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitGraph {
    commits: Vec<CommitRecord>,
    index: HashMap<Oid, usize>,
    needs_reload: bool,
}

impl Default for CommitGraph {
    fn default() -> Self {
        // Never loaded: the first read fetches the log
        Self {
            commits: Vec::new(),
            index: HashMap::new(),
            needs_reload: true,
        }
    }
}

impl CommitGraph {
    pub(crate) fn replace(&mut self, commits: Vec<CommitRecord>) {
        self.index = commits
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id.clone(), i))
            .collect();
        self.commits = commits;
        self.needs_reload = false;
    }

    pub(crate) fn mark_stale(&mut self) {
        self.needs_reload = true;
    }

    pub fn needs_reload(&self) -> bool {
        self.needs_reload
    }

    /// Commits ordered by topology then time.
    pub fn commits(&self) -> &[CommitRecord] {
        &self.commits
    }

    pub fn get(&self, id: &Oid) -> Option<&CommitRecord> {
        self.index.get(id).map(|&i| &self.commits[i])
    }

    /// Parent records of `id` that are part of the graph, first parent first.
    pub fn parents(&self, id: &Oid) -> Vec<&CommitRecord> {
        self.get(id)
            .map(|c| c.parents.iter().filter_map(|p| self.get(p)).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.commits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commits.is_empty()
    }
}

/// Side table of the references pointing at each commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceAnnotations {
    by_commit: HashMap<Oid, Vec<RefName>>,
}

impl ReferenceAnnotations {
    /// Rebuild from the reference list, preserving list order per commit.
    pub fn from_references(references: &[ReferenceInfo]) -> Self {
        let mut by_commit: HashMap<Oid, Vec<RefName>> = HashMap::new();
        for reference in references {
            if let Some(target) = &reference.target {
                by_commit
                    .entry(target.clone())
                    .or_default()
                    .push(reference.name.clone());
            }
        }
        Self { by_commit }
    }

    /// Drop every annotation for a reference `keep` rejects.
    pub fn retain(&mut self, mut keep: impl FnMut(&RefName) -> bool) {
        self.by_commit.retain(|_, names| {
            names.retain(|n| keep(n));
            !names.is_empty()
        });
    }

    /// Annotate `commit` with `name` unless already present.
    pub fn insert(&mut self, commit: Oid, name: RefName) {
        let names = self.by_commit.entry(commit).or_default();
        if !names.contains(&name) {
            names.push(name);
        }
    }

    pub fn of(&self, commit: &Oid) -> &[RefName] {
        self.by_commit.get(commit).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Per-view counters, each bumped once per applied refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateVersions {
    pub existence: u64,
    pub status: u64,
    pub commit_graph: u64,
    pub reference_list: u64,
    pub reference_targets: u64,
}

impl StateVersions {
    pub(crate) fn bump(&mut self, change: StateChange) {
        let counter = match change {
            StateChange::Existence => &mut self.existence,
            StateChange::Status => &mut self.status,
            StateChange::CommitGraph => &mut self.commit_graph,
            StateChange::ReferenceList => &mut self.reference_list,
            StateChange::ReferenceTargets => &mut self.reference_targets,
        };
        *counter += 1;
    }
}

/// Which derived view changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateChange {
    Existence,
    Status,
    /// The graph was flagged stale; the next read reloads it
    CommitGraph,
    ReferenceList,
    ReferenceTargets,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{ReferenceKind, Signature};
    use chrono::Utc;

    fn oid(n: u8) -> Oid {
        Oid::new(format!("{:040x}", n)).unwrap()
    }

    fn commit(n: u8, parents: &[u8]) -> CommitRecord {
        CommitRecord {
            id: oid(n),
            parents: parents.iter().map(|&p| oid(p)).collect(),
            summary: format!("commit {}", n),
            message: format!("commit {}\n", n),
            author: Signature {
                name: "a".into(),
                email: "a@example.com".into(),
            },
            time: Utc::now(),
        }
    }

    fn reference(name: &str, target: u8) -> ReferenceInfo {
        let name = RefName::new(name).unwrap();
        ReferenceInfo {
            kind: ReferenceKind::of(&name),
            shorthand: name.as_str().rsplit('/').next().unwrap().to_string(),
            name,
            target: Some(oid(target)),
            symbolic: false,
        }
    }

    #[test]
    fn graph_starts_stale() {
        assert!(CommitGraph::default().needs_reload());
    }

    #[test]
    fn graph_lookup_and_parents() {
        let mut graph = CommitGraph::default();
        graph.replace(vec![commit(3, &[2, 1]), commit(2, &[1]), commit(1, &[])]);

        assert!(!graph.needs_reload());
        assert_eq!(graph.get(&oid(2)).unwrap().summary, "commit 2");
        let parents: Vec<_> = graph.parents(&oid(3)).iter().map(|c| c.id.clone()).collect();
        assert_eq!(parents, vec![oid(2), oid(1)]);

        graph.mark_stale();
        assert!(graph.needs_reload());
        assert_eq!(graph.len(), 3);
    }

    #[test]
    fn annotations_group_by_target() {
        let refs = vec![
            reference("refs/heads/main", 1),
            reference("refs/tags/v1", 1),
            reference("refs/heads/dev", 2),
        ];
        let annotations = ReferenceAnnotations::from_references(&refs);

        let names: Vec<_> = annotations.of(&oid(1)).iter().map(|n| n.as_str()).collect();
        assert_eq!(names, vec!["refs/heads/main", "refs/tags/v1"]);
        assert!(annotations.of(&oid(9)).is_empty());
    }

    #[test]
    fn annotations_retain_prunes_empty_commits() {
        let refs = vec![reference("refs/heads/main", 1), reference("refs/heads/dev", 2)];
        let mut annotations = ReferenceAnnotations::from_references(&refs);

        annotations.retain(|n| n.as_str() != "refs/heads/dev");
        assert!(annotations.of(&oid(2)).is_empty());
        assert_eq!(annotations.of(&oid(1)).len(), 1);
    }

    #[test]
    fn versions_bump_one_counter() {
        let mut versions = StateVersions::default();
        versions.bump(StateChange::ReferenceTargets);
        assert_eq!(
            versions,
            StateVersions {
                reference_targets: 1,
                ..StateVersions::default()
            }
        );
    }
}
