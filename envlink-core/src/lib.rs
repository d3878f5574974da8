// envlink-core/src/lib.rs
//! Links unpacked packages into environment prefixes: file materialization,
//! placeholder relocation, lifecycle scripts, manifests and removal.

pub mod check;
pub mod env;
pub mod fs;
pub mod info;
pub mod link;
pub mod meta;
pub mod relocate;
pub mod script;
pub mod uninstall;

// Re-export the primary entry points
pub use check::{verify_dist, VerifyReport};
pub use env::{link_envs, post_extract, remove_duplicates, warn_on_special_chars, ProvisionReport};
pub use link::{link, LinkReport};
pub use meta::linked;
pub use uninstall::{duplicates_to_remove, remove_dists, unlink_dist};
