//! state::invalidation
//!
//! Which derived state each mutating command invalidates.
//!
//! | Command | Existence | Status | Graph | Ref list | Ref targets |
//! |---|---|---|---|---|---|
//! | open, create | x | | | | |
//! | stage, unstage | | x | | | |
//! | commit | | x | x | | |
//! | create branch / tracking branch / tag | | | | x | x |
//! | remove reference | | | | x | |
//! | reset | | | | | x |
//! | checkout, merge | | | | | |
//! | clone | x | | | x | x |
//! | push, fetch | | | | x | x |
//! | add remote | | | | | |
//! | remove remote | | | | x | |
//!
//! The graph is only flagged for reload; the reload itself happens on the
//! next read.

/// A command that can mutate repository state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Open,
    Create,
    Stage,
    Unstage,
    Commit,
    CreateBranch,
    CreateLocalTrackingBranch,
    CreateLightweightTag,
    RemoveReference,
    Reset,
    Checkout,
    Merge,
    Clone,
    Push,
    Fetch,
    AddRemote,
    RemoveRemote,
}

/// Set of derived views to recompute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Invalidation {
    pub existence: bool,
    pub status: bool,
    pub commit_graph: bool,
    pub reference_list: bool,
    pub reference_targets: bool,
}

impl Invalidation {
    pub const NONE: Self = Self {
        existence: false,
        status: false,
        commit_graph: false,
        reference_list: false,
        reference_targets: false,
    };

    /// Every view; used for the initial load.
    pub const ALL: Self = Self {
        existence: true,
        status: true,
        commit_graph: true,
        reference_list: true,
        reference_targets: true,
    };

    pub fn is_empty(&self) -> bool {
        *self == Self::NONE
    }
}

impl Command {
    /// The fixed invalidation row of this command.
    pub const fn invalidation(self) -> Invalidation {
        let none = Invalidation::NONE;
        match self {
            Self::Open | Self::Create => Invalidation {
                existence: true,
                ..none
            },
            Self::Stage | Self::Unstage => Invalidation {
                status: true,
                ..none
            },
            Self::Commit => Invalidation {
                status: true,
                commit_graph: true,
                ..none
            },
            Self::CreateBranch | Self::CreateLocalTrackingBranch | Self::CreateLightweightTag => {
                Invalidation {
                    reference_list: true,
                    reference_targets: true,
                    ..none
                }
            }
            Self::RemoveReference | Self::RemoveRemote => Invalidation {
                reference_list: true,
                ..none
            },
            Self::Reset => Invalidation {
                reference_targets: true,
                ..none
            },
            Self::Checkout | Self::Merge | Self::AddRemote => none,
            Self::Clone => Invalidation {
                existence: true,
                reference_list: true,
                reference_targets: true,
                ..none
            },
            Self::Push | Self::Fetch => Invalidation {
                reference_list: true,
                reference_targets: true,
                ..none
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_always_flags_graph() {
        let row = Command::Commit.invalidation();
        assert!(row.commit_graph);
        assert!(row.status);
        assert!(!row.reference_list);
    }

    #[test]
    fn checkout_merge_and_add_remote_invalidate_nothing() {
        for command in [Command::Checkout, Command::Merge, Command::AddRemote] {
            assert!(command.invalidation().is_empty(), "{:?}", command);
        }
    }

    #[test]
    fn only_commit_reloads_graph() {
        let all = [
            Command::Open,
            Command::Create,
            Command::Stage,
            Command::Unstage,
            Command::Commit,
            Command::CreateBranch,
            Command::CreateLocalTrackingBranch,
            Command::CreateLightweightTag,
            Command::RemoveReference,
            Command::Reset,
            Command::Checkout,
            Command::Merge,
            Command::Clone,
            Command::Push,
            Command::Fetch,
            Command::AddRemote,
            Command::RemoveRemote,
        ];
        let reloading: Vec<_> = all
            .into_iter()
            .filter(|c| c.invalidation().commit_graph)
            .collect();
        assert_eq!(reloading, vec![Command::Commit]);
    }

    #[test]
    fn network_rows() {
        let clone = Command::Clone.invalidation();
        assert!(clone.existence && clone.reference_list && clone.reference_targets);
        assert!(!clone.status);

        let fetch = Command::Fetch.invalidation();
        assert_eq!(fetch, Command::Push.invalidation());
        assert!(!fetch.existence);
    }
}
