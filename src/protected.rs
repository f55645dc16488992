//! Protected administrative API
//!
//! Every operation authorizes the caller through its [`AuthContext`] before
//! touching the store.

use crate::auth::CredentialHasher;
use crate::constants::{CREATE, DEFAULT_ROLE, DELETE, ICONS, MENUS, PERMISSIONS, READ, ROLES, UPDATE, USERS};
use crate::context::AuthContext;
use crate::error::{DashError, Result};
use crate::icons::{self, IconPage, IconQuery};
use crate::model::{
    Icon, IconPatch, Id, Menu, MenuDetail, MenuPatch, NewIcon, NewMenu, NewPermission, NewRole, NewUser,
    Permission, PermissionPatch, Role, RoleDetail, RolePatch, User, UserPatch, UserView,
};
use crate::patch::Patch;
use crate::store::Store;
use crate::visibility::{self, MenuNode};
use crate::{guards, menu, validate};

fn missing(what: &str, id: Id) -> DashError {
    DashError::not_found(format!("{} {}", what, id))
}

// ============================================================================
// Users
// ============================================================================

fn user_view(store: &dyn Store, user: &User) -> Result<UserView> {
    let role = match user.role_id {
        Some(rid) => store.find_role(rid)?,
        None => None,
    };
    Ok(UserView::new(user, role.as_ref()))
}

/// Role reference from an explicit id or a name. Unknown ones are `NotFound`.
fn resolve_role(store: &dyn Store, role_id: Option<Id>, role: Option<&str>) -> Result<Option<Id>> {
    if let Some(rid) = role_id {
        return store.find_role(rid)?.map(|r| Some(r.id)).ok_or_else(|| missing("role", rid));
    }
    match role.map(str::trim).filter(|r| !r.is_empty()) {
        Some(name) => store
            .find_role_by_name(name)?
            .map(|r| Some(r.id))
            .ok_or_else(|| DashError::not_found(format!("role '{}'", name))),
        None => Ok(None),
    }
}

pub fn list_users(ctx: &AuthContext) -> Result<Vec<UserView>> {
    ctx.require(USERS, READ)?;
    ctx.store.list_users()?.iter().map(|u| user_view(ctx.store, u)).collect()
}

pub fn get_user(ctx: &AuthContext, id: Id) -> Result<UserView> {
    ctx.require(USERS, READ)?;
    let user = ctx.store.find_user(id)?.ok_or_else(|| missing("user", id))?;
    user_view(ctx.store, &user)
}

/// New users without an explicit role get the default role's id
pub fn create_user(ctx: &AuthContext, hasher: &dyn CredentialHasher, input: NewUser) -> Result<UserView> {
    ctx.require(USERS, CREATE)?;
    let store = ctx.store;
    let email = validate::email(&input.email)?;
    validate::password(&input.password)?;
    let name = validate::user_name(input.name)?;
    guards::ensure_email_free(store, &email, None)?;
    let role_id = match resolve_role(store, input.role_id, input.role.as_deref())? {
        Some(rid) => rid,
        None => store
            .find_role_by_name(DEFAULT_ROLE)?
            .map(|r| r.id)
            .ok_or_else(|| DashError::not_found(format!("role '{}'", DEFAULT_ROLE)))?,
    };
    let user = store.insert_user(User {
        id: 0,
        email,
        name,
        password_hash: hasher.hash(&input.password)?,
        role_id: Some(role_id),
        created_at: 0,
        updated_at: 0,
    })?;
    tracing::info!(by = ctx.user_id(), user = user.id, "user created");
    user_view(store, &user)
}

pub fn update_user(ctx: &AuthContext, hasher: &dyn CredentialHasher, id: Id, patch: UserPatch) -> Result<UserView> {
    ctx.require(USERS, UPDATE)?;
    let store = ctx.store;
    let mut user = store.find_user(id)?.ok_or_else(|| missing("user", id))?;
    let requested = resolve_role(store, patch.role_id, patch.role.as_deref())?;
    guards::ensure_not_self_role_change(ctx, id, user.role_id, requested)?;
    if let Some(email) = patch.email {
        let email = validate::email(&email)?;
        if email != user.email {
            guards::ensure_email_free(store, &email, Some(id))?;
            user.email = email;
        }
    }
    match patch.name {
        Patch::Absent => {}
        Patch::Null => user.name = None,
        Patch::Value(name) => user.name = validate::user_name(Some(name))?,
    }
    if let Some(rid) = requested {
        user.role_id = Some(rid);
    }
    if let Some(password) = patch.password.filter(|p| !p.is_empty()) {
        validate::password(&password)?;
        user.password_hash = hasher.hash(&password)?;
    }
    let user = store.update_user(user)?;
    tracing::info!(by = ctx.user_id(), user = id, "user updated");
    user_view(store, &user)
}

pub fn delete_user(ctx: &AuthContext, id: Id) -> Result<()> {
    ctx.require(USERS, DELETE)?;
    guards::ensure_not_self_delete(ctx, id)?;
    if !ctx.store.delete_user(id)? {
        return Err(missing("user", id));
    }
    tracing::info!(by = ctx.user_id(), user = id, "user deleted");
    Ok(())
}

// ============================================================================
// Roles
// ============================================================================

fn role_detail(store: &dyn Store, role: Role) -> Result<RoleDetail> {
    Ok(RoleDetail {
        permissions: store.find_permissions_for_role(role.id)?,
        user_count: store.count_users_with_role(role.id)?,
        role,
    })
}

fn check_permission_ids(store: &dyn Store, ids: &[Id]) -> Result<()> {
    for &pid in ids {
        if store.find_permission(pid)?.is_none() {
            return Err(missing("permission", pid));
        }
    }
    Ok(())
}

pub fn list_roles(ctx: &AuthContext) -> Result<Vec<RoleDetail>> {
    ctx.require(ROLES, READ)?;
    ctx.store.list_roles()?.into_iter().map(|r| role_detail(ctx.store, r)).collect()
}

pub fn get_role(ctx: &AuthContext, id: Id) -> Result<RoleDetail> {
    ctx.require(ROLES, READ)?;
    let role = ctx.store.find_role(id)?.ok_or_else(|| missing("role", id))?;
    role_detail(ctx.store, role)
}

pub fn create_role(ctx: &AuthContext, input: NewRole) -> Result<RoleDetail> {
    ctx.require(ROLES, CREATE)?;
    let store = ctx.store;
    let name = validate::role_name(&input.name)?;
    guards::ensure_role_name_free(store, &name, None)?;
    if let Some(ids) = &input.permission_ids {
        check_permission_ids(store, ids)?;
    }
    let role = Role {
        id: 0,
        name,
        description: validate::description(input.description),
        is_active: input.is_active,
        created_at: 0,
        updated_at: 0,
    };
    let role = store.insert_role_with_permissions(role, input.permission_ids.as_deref())?;
    tracing::info!(by = ctx.user_id(), role = %role.name, "role created");
    role_detail(store, role)
}

pub fn update_role(ctx: &AuthContext, id: Id, patch: RolePatch) -> Result<RoleDetail> {
    ctx.require(ROLES, UPDATE)?;
    let store = ctx.store;
    let mut role = store.find_role(id)?.ok_or_else(|| missing("role", id))?;
    if let Some(name) = patch.name {
        role.name = validate::role_name(&name)?;
        guards::ensure_role_name_free(store, &role.name, Some(id))?;
    }
    match patch.description {
        Patch::Absent => {}
        Patch::Null => role.description = None,
        Patch::Value(d) => role.description = validate::description(Some(d)),
    }
    if let Some(active) = patch.is_active {
        role.is_active = active;
    }
    if let Some(ids) = &patch.permission_ids {
        check_permission_ids(store, ids)?;
    }
    let role = store.update_role_with_permissions(role, patch.permission_ids.as_deref())?;
    tracing::info!(by = ctx.user_id(), role = %role.name, "role updated");
    role_detail(store, role)
}

pub fn delete_role(ctx: &AuthContext, id: Id) -> Result<()> {
    ctx.require(ROLES, DELETE)?;
    let role = ctx.store.find_role(id)?.ok_or_else(|| missing("role", id))?;
    guards::ensure_role_deletable(ctx.store, &role)?;
    ctx.store.delete_role(id)?;
    tracing::info!(by = ctx.user_id(), role = %role.name, "role deleted");
    Ok(())
}

// ============================================================================
// Permissions
// ============================================================================

pub fn list_permissions(ctx: &AuthContext) -> Result<Vec<Permission>> {
    ctx.require(PERMISSIONS, READ)?;
    ctx.store.list_permissions()
}

pub fn get_permission(ctx: &AuthContext, id: Id) -> Result<Permission> {
    ctx.require(PERMISSIONS, READ)?;
    ctx.store.find_permission(id)?.ok_or_else(|| missing("permission", id))
}

pub fn create_permission(ctx: &AuthContext, input: NewPermission) -> Result<Permission> {
    ctx.require(PERMISSIONS, CREATE)?;
    let name = validate::permission_name(&input.name)?;
    let module = validate::module(&input.module)?;
    let action = validate::action(&input.action)?;
    guards::ensure_permission_free(ctx.store, &name, &module, &action, None)?;
    let p = ctx.store.insert_permission(Permission {
        id: 0,
        name,
        description: validate::description(input.description),
        module,
        action,
        created_at: 0,
        updated_at: 0,
    })?;
    tracing::info!(by = ctx.user_id(), permission = %p.name, module = %p.module, action = %p.action, "permission created");
    Ok(p)
}

/// Uniqueness is checked on the merged record against every other row
pub fn update_permission(ctx: &AuthContext, id: Id, patch: PermissionPatch) -> Result<Permission> {
    ctx.require(PERMISSIONS, UPDATE)?;
    let mut p = ctx.store.find_permission(id)?.ok_or_else(|| missing("permission", id))?;
    if let Some(name) = patch.name {
        p.name = validate::permission_name(&name)?;
    }
    if let Some(module) = patch.module {
        p.module = validate::module(&module)?;
    }
    if let Some(action) = patch.action {
        p.action = validate::action(&action)?;
    }
    match patch.description {
        Patch::Absent => {}
        Patch::Null => p.description = None,
        Patch::Value(d) => p.description = validate::description(Some(d)),
    }
    guards::ensure_permission_free(ctx.store, &p.name, &p.module, &p.action, Some(id))?;
    let p = ctx.store.update_permission(p)?;
    tracing::info!(by = ctx.user_id(), permission = %p.name, "permission updated");
    Ok(p)
}

pub fn delete_permission(ctx: &AuthContext, id: Id) -> Result<()> {
    ctx.require(PERMISSIONS, DELETE)?;
    let p = ctx.store.find_permission(id)?.ok_or_else(|| missing("permission", id))?;
    guards::ensure_permission_deletable(ctx.store, &p)?;
    ctx.store.delete_permission(id)?;
    tracing::info!(by = ctx.user_id(), permission = %p.name, "permission deleted");
    Ok(())
}

// ============================================================================
// Menus
// ============================================================================

/// The caller's navigation. Any valid session may read it.
pub fn navigation(ctx: &AuthContext) -> Result<Vec<MenuNode>> {
    visibility::visible_menu_tree_for(ctx.store, ctx.role())
}

pub fn list_menus(ctx: &AuthContext) -> Result<Vec<MenuDetail>> {
    ctx.require(MENUS, READ)?;
    menu::list_details(ctx.store)
}

pub fn get_menu(ctx: &AuthContext, id: Id) -> Result<MenuDetail> {
    ctx.require(MENUS, READ)?;
    menu::detail(ctx.store, id)
}

pub fn create_menu(ctx: &AuthContext, input: NewMenu) -> Result<Menu> {
    ctx.require(MENUS, CREATE)?;
    menu::create(ctx.store, input)
}

pub fn update_menu(ctx: &AuthContext, id: Id, patch: MenuPatch) -> Result<Menu> {
    ctx.require(MENUS, UPDATE)?;
    menu::update(ctx.store, id, patch)
}

pub fn delete_menu(ctx: &AuthContext, id: Id) -> Result<()> {
    ctx.require(MENUS, DELETE)?;
    menu::delete(ctx.store, id)
}

// ============================================================================
// Icons
// ============================================================================

/// Icon picker listing. Any valid session may search.
pub fn search_icons(ctx: &AuthContext, query: &IconQuery) -> Result<IconPage> {
    icons::search(ctx.store, query)
}

pub fn create_icon(ctx: &AuthContext, input: NewIcon) -> Result<Icon> {
    ctx.require(ICONS, CREATE)?;
    icons::create(ctx.store, input)
}

pub fn update_icon(ctx: &AuthContext, id: Id, patch: IconPatch) -> Result<Icon> {
    ctx.require(ICONS, UPDATE)?;
    icons::update(ctx.store, id, patch)
}

pub fn delete_icon(ctx: &AuthContext, id: Id) -> Result<()> {
    ctx.require(ICONS, DELETE)?;
    icons::delete(ctx.store, id)
}
