//! repoview - state coordination between a git engine and a presentation layer
//!
//! repoview sits between a version-control engine (libgit2 through `git2`)
//! and whatever renders repository state. It keeps derived views (status,
//! commit graph, references and their annotations) consistent with the
//! repository after every command, tracks progress and errors of local and
//! network operations, and resolves stored credentials for remotes.
//!
//! # Architecture
//!
//! - [`core`] - Strong types and configuration
//! - [`engine`] - The engine contract, its data model, and a scriptable mock
//! - [`git`] - The libgit2 engine; the only module that imports `git2`
//! - [`credentials`] - Credential records, lookup and persistence
//! - [`progress`] - Error slots and local/remote operation coordinators
//! - [`state`] - The repository controller and its invalidation matrix
//! - [`telemetry`] - Tracing subscriber setup
//!
//! # Invariants
//!
//! 1. Every mutating command refreshes exactly the views its invalidation row names
//! 2. Each view's version only increases, and only when the view was recomputed
//! 3. The first error reported for an operation is the one kept
//! 4. A network operation delivers its completion exactly once
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use repoview::core::config::Config;
//! use repoview::git::Git2Engine;
//! use repoview::state::Repository;
//!
//! let config = Config::load()?;
//! repoview::telemetry::init(&config);
//!
//! let mut repo = Repository::from_config(Arc::new(Git2Engine::new(".")), &config)?;
//! repo.open()?;
//! for reference in repo.references() {
//!     println!("{}", reference.shorthand);
//! }
//! ```

pub mod core;
pub mod credentials;
pub mod engine;
pub mod git;
pub mod progress;
pub mod state;
pub mod telemetry;
