//! Permission vocabulary, reserved role names and field limits

// Reserved roles
pub const ADMIN_ROLE: &str = "admin";
pub const DEFAULT_ROLE: &str = "user";

// Actions
pub const CREATE: &str = "create";
pub const READ: &str = "read";
pub const UPDATE: &str = "update";
pub const DELETE: &str = "delete";

// Modules
pub const USERS: &str = "users";
pub const ROLES: &str = "roles";
pub const PERMISSIONS: &str = "permissions";
pub const MENUS: &str = "menus";
pub const ICONS: &str = "icons";

pub const ACTIONS: &[&str] = &[CREATE, READ, UPDATE, DELETE];
pub const MODULES: &[&str] = &[USERS, ROLES, PERMISSIONS, MENUS, ICONS];

/// Maximum menu depth (root = 1)
pub const MAX_MENU_DEPTH: usize = 3;

/// Menu titles that additionally require `read` on a permission module
/// before they are shown. Titles not listed here are permission-exempt.
const MENU_MODULES: &[(&str, &str)] = &[
    ("User Management", USERS),
    ("Role Management", ROLES),
    ("Permission Management", PERMISSIONS),
    ("Menu Management", MENUS),
    ("Icon Management", ICONS),
];

/// Look up the permission module guarding a menu title
pub fn required_module(title: &str) -> Option<&'static str> {
    MENU_MODULES.iter().find(|(t, _)| *t == title).map(|(_, m)| *m)
}

// Field limits
pub const MENU_TITLE_LEN: (usize, usize) = (2, 50);
pub const MENU_URL_MAX: usize = 200;
pub const ICON_NAME_LEN: (usize, usize) = (2, 50);
pub const ICON_CATEGORY_LEN: (usize, usize) = (2, 30);
pub const MENU_ORDER_RANGE: (i32, i32) = (0, 999);
pub const ROLE_NAME_LEN: (usize, usize) = (2, 50);
pub const PERMISSION_NAME_LEN: (usize, usize) = (2, 100);
pub const MODULE_LEN: (usize, usize) = (2, 50);
pub const USER_NAME_LEN: (usize, usize) = (2, 100);
pub const PASSWORD_LEN: (usize, usize) = (6, 100);

pub const DEFAULT_ICON_CATEGORY: &str = "general";
pub const DEFAULT_MENU_ROLES: &str = "user,admin";
pub const ICON_PAGE_LIMIT: usize = 100;
pub const ICON_PAGE_MAX: usize = 200;
