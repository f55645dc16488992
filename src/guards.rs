//! Entity lifecycle guards
//!
//! Checks that run before a delete or update is attempted. The store
//! repeats the uniqueness and reference checks inside its own write, so
//! these only turn the common case into a clear error early.

use crate::context::AuthContext;
use crate::error::{DashError, Result};
use crate::model::{Id, Permission, Role};
use crate::store::{
    email_taken, icon_taken, permission_in_use, permission_name_taken, permission_pair_taken,
    role_in_use, role_taken, Store,
};

/// `InUse` while any user holds the role
pub fn ensure_role_deletable(store: &dyn Store, role: &Role) -> Result<()> {
    let users = store.count_users_with_role(role.id)?;
    if users > 0 {
        tracing::debug!(role = %role.name, users, "role delete blocked");
        return Err(role_in_use(&role.name, users));
    }
    Ok(())
}

/// `InUse` while any role is granted the permission
pub fn ensure_permission_deletable(store: &dyn Store, permission: &Permission) -> Result<()> {
    let roles = store.count_roles_with_permission(permission.id)?;
    if roles > 0 {
        tracing::debug!(permission = %permission.name, roles, "permission delete blocked");
        return Err(permission_in_use(&permission.name, roles));
    }
    Ok(())
}

/// `Conflict` if a role other than `except` already has `name`
pub fn ensure_role_name_free(store: &dyn Store, name: &str, except: Option<Id>) -> Result<()> {
    match store.find_role_by_name(name)? {
        Some(r) if Some(r.id) != except => Err(role_taken(name)),
        _ => Ok(()),
    }
}

/// Name and (module, action) must both be unused by other permissions
pub fn ensure_permission_free(store: &dyn Store, name: &str, module: &str, action: &str, except: Option<Id>) -> Result<()> {
    if let Some(p) = store.find_permission_by_name(name)? {
        if Some(p.id) != except {
            return Err(permission_name_taken(name));
        }
    }
    if let Some(p) = store.find_permission_by_pair(module, action)? {
        if Some(p.id) != except {
            return Err(permission_pair_taken(module, action));
        }
    }
    Ok(())
}

pub fn ensure_email_free(store: &dyn Store, email: &str, except: Option<Id>) -> Result<()> {
    match store.find_user_by_email(email)? {
        Some(u) if Some(u.id) != except => Err(email_taken(email)),
        _ => Ok(()),
    }
}

pub fn ensure_icon_name_free(store: &dyn Store, name: &str, except: Option<Id>) -> Result<()> {
    match store.find_icon_by_name(name)? {
        Some(i) if Some(i.id) != except => Err(icon_taken(name)),
        _ => Ok(()),
    }
}

/// Callers may not delete their own account
pub fn ensure_not_self_delete(ctx: &AuthContext, target: Id) -> Result<()> {
    if ctx.user_id() == target {
        tracing::debug!(user = target, "self delete rejected");
        return Err(DashError::SelfAction("you cannot delete your own account".into()));
    }
    Ok(())
}

/// Callers may not move themselves to a different role
pub fn ensure_not_self_role_change(ctx: &AuthContext, target: Id, current: Option<Id>, requested: Option<Id>) -> Result<()> {
    if ctx.user_id() == target && requested.is_some() && requested != current {
        tracing::debug!(user = target, "self role change rejected");
        return Err(DashError::SelfAction("you cannot change your own role".into()));
    }
    Ok(())
}
