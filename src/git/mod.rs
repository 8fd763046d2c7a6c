//! git
//!
//! The libgit2-backed [`Engine`](crate::engine::Engine).
//!
//! # Architecture
//!
//! This module is the **only** place that imports `git2`. Everything above it
//! talks to the engine trait and sees strong types (Oid, RefName) and the
//! plain records in [`crate::engine::model`].
//!
//! # Transports
//!
//! libgit2 is built without its HTTPS and SSH transports by default, so only
//! local paths and `file://` URLs can be cloned, fetched and pushed. Enable
//! the `network-transports` feature for the rest.
//!
//! # Example
//!
//! ```ignore
//! use repoview::engine::Engine;
//! use repoview::git::Git2Engine;
//!
//! let engine = Git2Engine::new("/path/to/repo");
//! engine.open()?;
//! let status = engine.status()?;
//! println!("on {}", status.current_branch);
//! ```

mod interface;

pub use interface::Git2Engine;
