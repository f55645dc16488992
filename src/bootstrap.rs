//! Bootstrap and system initialization

use crate::auth::CredentialHasher;
use crate::constants::{ACTIONS, ADMIN_ROLE, CREATE, DEFAULT_ROLE, DELETE, MENUS, MODULES, PERMISSIONS, READ, ROLES, UPDATE, USERS};
use crate::error::{DashError, Result};
use crate::model::{Icon, Id, Menu, Permission, Role, User};
use crate::role_set::RoleSet;
use crate::store::Store;
use crate::validate;

/// Management menus: (title, url, icon)
const MANAGEMENT_MENUS: &[(&str, &str, &str)] = &[
    ("User Management", "/dashboard/users", "Users"),
    ("Role Management", "/dashboard/roles", "Shield"),
    ("Permission Management", "/dashboard/permissions", "Key"),
    ("Menu Management", "/dashboard/menus", "Menu"),
];

/// Starter icon registry: (name, category)
const ICONS: &[(&str, &str)] = &[
    ("LayoutDashboard", "navigation"),
    ("Home", "navigation"),
    ("Menu", "navigation"),
    ("Folder", "navigation"),
    ("Users", "general"),
    ("User", "general"),
    ("Shield", "general"),
    ("Key", "general"),
    ("Settings", "general"),
    ("FileText", "media"),
    ("BarChart3", "business"),
    ("Mail", "social"),
];

#[derive(Debug, Clone)]
pub struct BootstrapResult {
    pub admin_role: Id,
    pub user_role: Id,
    pub admin_user: Id,
    pub permissions: usize,
    pub menus: usize,
}

/// Seeded once the admin role exists
pub fn is_bootstrapped(store: &dyn Store) -> Result<bool> {
    Ok(store.find_role_by_name(ADMIN_ROLE)?.is_some())
}

fn verb(action: &str) -> &'static str {
    match action {
        CREATE => "Create",
        READ => "View",
        UPDATE => "Edit",
        DELETE => "Delete",
        _ => "Manage",
    }
}

fn noun(module: &str) -> &'static str {
    match module {
        USERS => "Users",
        ROLES => "Roles",
        PERMISSIONS => "Permissions",
        MENUS => "Menus",
        _ => "Icons",
    }
}

/// Seed permissions, the admin and default roles, the admin account, the
/// management menus and a starter icon set.
pub fn seed(store: &dyn Store, hasher: &dyn CredentialHasher, admin_email: &str, admin_password: &str) -> Result<BootstrapResult> {
    if is_bootstrapped(store)? {
        return Err(DashError::Conflict("already bootstrapped".into()));
    }
    let email = validate::email(admin_email)?;
    validate::password(admin_password)?;

    let mut permission_ids = Vec::with_capacity(MODULES.len() * ACTIONS.len());
    for module in MODULES {
        for action in ACTIONS {
            let p = store.insert_permission(Permission {
                id: 0,
                name: format!("{} {}", verb(action), noun(module)),
                description: None,
                module: module.to_string(),
                action: action.to_string(),
                created_at: 0,
                updated_at: 0,
            })?;
            permission_ids.push(p.id);
        }
    }

    let admin = Role {
        id: 0,
        name: ADMIN_ROLE.into(),
        description: Some("Administrator with full access".into()),
        is_active: true,
        created_at: 0,
        updated_at: 0,
    };
    let admin = store.insert_role_with_permissions(admin, Some(permission_ids.as_slice()))?;
    let user = store.insert_role(Role {
        id: 0,
        name: DEFAULT_ROLE.into(),
        description: Some("Regular user with limited access".into()),
        is_active: true,
        created_at: 0,
        updated_at: 0,
    })?;

    let account = store.insert_user(User {
        id: 0,
        email,
        name: Some("Admin".into()),
        password_hash: hasher.hash(admin_password)?,
        role_id: Some(admin.id),
        created_at: 0,
        updated_at: 0,
    })?;

    let admin_only = RoleSet::parse(ADMIN_ROLE)?;
    for (i, (title, url, icon)) in MANAGEMENT_MENUS.iter().enumerate() {
        store.insert_menu(Menu {
            id: 0,
            title: title.to_string(),
            url: Some(url.to_string()),
            icon: Some(icon.to_string()),
            order: i as i32 + 1,
            parent_id: None,
            roles: admin_only.clone(),
            is_active: true,
            created_at: 0,
            updated_at: 0,
        })?;
    }

    for (name, category) in ICONS {
        store.insert_icon(Icon {
            id: 0,
            name: name.to_string(),
            category: category.to_string(),
            is_active: true,
            created_at: 0,
            updated_at: 0,
        })?;
    }

    tracing::info!(admin = %account.email, permissions = permission_ids.len(), "bootstrapped");
    Ok(BootstrapResult {
        admin_role: admin.id,
        user_role: user.id,
        admin_user: account.id,
        permissions: permission_ids.len(),
        menus: MANAGEMENT_MENUS.len(),
    })
}
