//! Permission evaluation
//!
//! Every decision re-reads the store; nothing is cached between calls.
//! The admin bypass lives in [`is_admin`] and nowhere else.

use std::collections::{BTreeMap, BTreeSet};

use crate::constants::ADMIN_ROLE;
use crate::error::Result;
use crate::model::Permission;
use crate::store::Store;

/// The one place the admin bypass is decided
#[inline]
pub fn is_admin(role: &str) -> bool {
    role == ADMIN_ROLE
}

/// Stored grant check, without the admin bypass. An unknown role has no
/// permissions.
pub fn has_stored_permission(store: &dyn Store, role: &str, module: &str, action: &str) -> Result<bool> {
    let Some(r) = store.find_role_by_name(role)? else {
        tracing::debug!(role, "permission check for unknown role");
        return Ok(false);
    };
    Ok(store
        .find_permissions_for_role(r.id)?
        .iter()
        .any(|p| p.module == module && p.action == action))
}

/// Does `role` hold `(module, action)`? A missing role fails closed.
pub fn has_permission(store: &dyn Store, role: Option<&str>, module: &str, action: &str) -> Result<bool> {
    match role {
        None => Ok(false),
        Some(r) if is_admin(r) => Ok(true),
        Some(r) => has_stored_permission(store, r, module, action),
    }
}

/// True on the first granted pair
pub fn has_any_permission(store: &dyn Store, role: Option<&str>, pairs: &[(&str, &str)]) -> Result<bool> {
    for (module, action) in pairs {
        if has_permission(store, role, module, action)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// False on the first missing pair. An empty list is vacuously granted.
pub fn has_all_permissions(store: &dyn Store, role: Option<&str>, pairs: &[(&str, &str)]) -> Result<bool> {
    for (module, action) in pairs {
        if !has_permission(store, role, module, action)? {
            return Ok(false);
        }
    }
    Ok(true)
}

/// A role's grants loaded once, for evaluating many checks against the same
/// snapshot (menu rendering).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSet {
    admin: bool,
    /// module -> granted actions
    pairs: BTreeMap<String, BTreeSet<String>>,
}

impl PermissionSet {
    pub fn load(store: &dyn Store, role: Option<&str>) -> Result<Self> {
        let Some(role) = role else { return Ok(Self::default()) };
        let mut set = PermissionSet { admin: is_admin(role), pairs: BTreeMap::new() };
        if let Some(r) = store.find_role_by_name(role)? {
            set.extend(store.find_permissions_for_role(r.id)?.iter());
        }
        Ok(set)
    }

    /// Set holding exactly `pairs`, no bypass
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut set = PermissionSet::default();
        for (m, a) in pairs {
            set.grant(m, a);
        }
        set
    }

    /// Everything granted
    pub fn admin() -> Self {
        PermissionSet { admin: true, pairs: BTreeMap::new() }
    }

    fn grant(&mut self, module: &str, action: &str) {
        self.pairs.entry(module.to_string()).or_default().insert(action.to_string());
    }

    fn extend<'a>(&mut self, perms: impl Iterator<Item = &'a Permission>) {
        for p in perms {
            self.grant(&p.module, &p.action);
        }
    }

    pub fn allows(&self, module: &str, action: &str) -> bool {
        self.admin || self.pairs.get(module).is_some_and(|actions| actions.contains(action))
    }

    pub fn is_admin(&self) -> bool {
        self.admin
    }

    /// Number of granted (module, action) pairs
    pub fn len(&self) -> usize {
        self.pairs.values().map(BTreeSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
