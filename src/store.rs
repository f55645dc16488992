//! Storage collaborator
//!
//! Every backend enforces the uniqueness and referential constraints
//! itself, inside its own write critical section, so a duplicate that races
//! past an application-level pre-check still fails here.
//!
//! Insert methods ignore the incoming `id`, `created_at` and `updated_at`
//! and return the stored record. Update methods keep `created_at` and
//! refresh `updated_at`.
//!
//! Listing order:
//! - roles by name
//! - permissions by (module, action)
//! - users newest first
//! - menus by (order, id), so equal orders keep creation order
//! - icons by (category, name)

use crate::constants::MAX_MENU_DEPTH;
use crate::error::{DashError, Result};
use crate::model::{Icon, Id, Menu, Permission, Role, SessionRecord, User};

pub trait Store: Send + Sync {
    // Roles
    fn find_role(&self, id: Id) -> Result<Option<Role>>;
    fn find_role_by_name(&self, name: &str) -> Result<Option<Role>>;
    fn list_roles(&self) -> Result<Vec<Role>>;
    /// `Conflict` on duplicate name
    fn insert_role(&self, role: Role) -> Result<Role> {
        self.insert_role_with_permissions(role, None)
    }
    /// Insert the role and, when given, replace its permission set in the
    /// same write. An unknown permission id stores nothing.
    fn insert_role_with_permissions(&self, role: Role, permission_ids: Option<&[Id]>) -> Result<Role>;
    /// `NotFound` if missing, `Conflict` if another role has the name
    fn update_role(&self, role: Role) -> Result<Role> {
        self.update_role_with_permissions(role, None)
    }
    /// Update the role and, when given, replace its permission set in the
    /// same write. Either both land or neither does.
    fn update_role_with_permissions(&self, role: Role, permission_ids: Option<&[Id]>) -> Result<Role>;
    /// `InUse` while any user references the role. Drops its permission links.
    fn delete_role(&self, id: Id) -> Result<bool>;
    /// Replace the role's permission set. `NotFound` for the role or any id.
    fn set_role_permissions(&self, role_id: Id, permission_ids: &[Id]) -> Result<()>;
    fn find_permissions_for_role(&self, role_id: Id) -> Result<Vec<Permission>>;
    fn count_users_with_role(&self, role_id: Id) -> Result<usize>;

    // Permissions
    fn find_permission(&self, id: Id) -> Result<Option<Permission>>;
    fn find_permission_by_name(&self, name: &str) -> Result<Option<Permission>>;
    fn find_permission_by_pair(&self, module: &str, action: &str) -> Result<Option<Permission>>;
    fn list_permissions(&self) -> Result<Vec<Permission>>;
    /// `Conflict` on duplicate name or duplicate (module, action)
    fn insert_permission(&self, permission: Permission) -> Result<Permission>;
    fn update_permission(&self, permission: Permission) -> Result<Permission>;
    /// `InUse` while any role references the permission
    fn delete_permission(&self, id: Id) -> Result<bool>;
    fn count_roles_with_permission(&self, permission_id: Id) -> Result<usize>;

    // Users
    fn find_user(&self, id: Id) -> Result<Option<User>>;
    fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;
    fn list_users(&self) -> Result<Vec<User>>;
    /// `Conflict` on duplicate email, `NotFound` for an unknown role id
    fn insert_user(&self, user: User) -> Result<User>;
    fn update_user(&self, user: User) -> Result<User>;
    fn delete_user(&self, id: Id) -> Result<bool>;

    // Menus
    fn find_menu_by_id(&self, id: Id) -> Result<Option<Menu>>;
    /// Direct children of `parent` (`None` = roots), in sibling order
    fn find_menus_by_parent(&self, parent: Option<Id>) -> Result<Vec<Menu>>;
    fn list_menus(&self) -> Result<Vec<Menu>>;
    /// `NotFound` when the parent does not exist, `DepthExceeded` when the
    /// parent already sits at the last level
    fn insert_menu(&self, menu: Menu) -> Result<Menu>;
    /// `NotFound` when the menu or new parent is missing, `SelfParent` on a
    /// self-loop, `DepthExceeded` when the moved subtree would pass the cap
    fn update_menu(&self, menu: Menu) -> Result<Menu>;
    /// `HasChildren` while any menu points at it
    fn delete_menu(&self, id: Id) -> Result<bool>;

    fn find_all_active_menus(&self) -> Result<Vec<Menu>> {
        Ok(self.list_menus()?.into_iter().filter(|m| m.is_active).collect())
    }

    // Icons
    fn find_icon(&self, id: Id) -> Result<Option<Icon>>;
    fn find_icon_by_name(&self, name: &str) -> Result<Option<Icon>>;
    fn list_icons(&self) -> Result<Vec<Icon>>;
    /// `Conflict` on duplicate name
    fn insert_icon(&self, icon: Icon) -> Result<Icon>;
    fn update_icon(&self, icon: Icon) -> Result<Icon>;
    fn delete_icon(&self, id: Id) -> Result<bool>;

    // Sessions, keyed by token hash
    fn insert_session(&self, token_hash: &str, session: SessionRecord) -> Result<()>;
    fn find_session(&self, token_hash: &str) -> Result<Option<SessionRecord>>;
    fn delete_session(&self, token_hash: &str) -> Result<bool>;
}

// Shared messages so both backends report identical conflicts.
pub(crate) fn role_taken(name: &str) -> DashError {
    DashError::Conflict(format!("role '{}' already exists", name))
}

pub(crate) fn permission_name_taken(name: &str) -> DashError {
    DashError::Conflict(format!("permission '{}' already exists", name))
}

pub(crate) fn permission_pair_taken(module: &str, action: &str) -> DashError {
    DashError::Conflict(format!("permission {}:{} already exists", module, action))
}

pub(crate) fn email_taken(email: &str) -> DashError {
    DashError::Conflict(format!("email '{}' already in use", email))
}

pub(crate) fn icon_taken(name: &str) -> DashError {
    DashError::Conflict(format!("icon '{}' already exists", name))
}

pub(crate) fn menu_order(a: &Menu, b: &Menu) -> std::cmp::Ordering {
    (a.order, a.id).cmp(&(b.order, b.id))
}

/// Reject a subtree `height` levels tall placed under a parent at
/// `parent_depth` (`None` = root placement).
pub(crate) fn check_menu_placement(parent_depth: Option<usize>, height: usize) -> Result<()> {
    let d = parent_depth.map_or(1, |p| p + 1);
    if d + height.max(1) - 1 > MAX_MENU_DEPTH {
        return Err(DashError::DepthExceeded { max: MAX_MENU_DEPTH });
    }
    Ok(())
}

pub(crate) fn role_in_use(name: &str, users: usize) -> DashError {
    DashError::InUse { entity: format!("role '{}'", name), referrer: "user(s)".into(), count: users }
}

pub(crate) fn permission_in_use(name: &str, roles: usize) -> DashError {
    DashError::InUse { entity: format!("permission '{}'", name), referrer: "role(s)".into(), count: roles }
}
