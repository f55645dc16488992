//! dashguard - role-based access control for admin dashboards
//!
//! Flat `(module, action)` permissions granted to roles, a three-level
//! role-scoped navigation menu, and the lifecycle guards that keep both
//! consistent. Storage is pluggable through [`Store`]: [`LmdbStore`] persists
//! to LMDB, [`MemoryStore`] keeps everything in process.
//!
//! ```no_run
//! use dashguard::{auth::Argon2Hasher, bootstrap, visibility, LmdbStore, Store};
//!
//! let store = LmdbStore::open("./data/dashguard.lmdb")?;
//! bootstrap::seed(&store, &Argon2Hasher::default(), "admin@example.com", "Admin123")?;
//! let tree = visibility::visible_menu_tree_for(&store, Some("admin"))?;
//! assert_eq!(tree.len(), 4);
//! # Ok::<(), dashguard::DashError>(())
//! ```

pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod constants;
pub mod context;
mod db;
pub mod error;
pub mod evaluator;
pub mod guards;
pub mod icons;
pub mod logging;
mod memory;
pub mod menu;
pub mod model;
pub mod patch;
pub mod protected;
mod read;
pub mod role_set;
pub mod store;
mod tx;
pub mod validate;
pub mod visibility;

#[cfg(feature = "server")]
pub mod server;

pub use config::Config;
pub use context::{AuthContext, Session};
pub use db::LmdbStore;
pub use error::{DashError, Result};
pub use evaluator::{has_all_permissions, has_any_permission, has_permission, is_admin, PermissionSet};
pub use memory::MemoryStore;
pub use model::Id;
pub use patch::Patch;
pub use role_set::RoleSet;
pub use store::Store;
pub use visibility::{visible_menu_tree, MenuNode};
