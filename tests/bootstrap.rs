//! Bootstrap seeding tests

use dashguard::auth::Argon2Hasher;
use dashguard::bootstrap;
use dashguard::visibility::visible_menu_tree_for;
use dashguard::{has_permission, DashError, LmdbStore, MemoryStore, Store};
use tempfile::TempDir;

fn hasher() -> Argon2Hasher {
    Argon2Hasher::with_cost(8, 1, 1).unwrap()
}

#[test]
fn seeds_roles_permissions_and_admin() {
    let s = MemoryStore::new();
    assert!(!bootstrap::is_bootstrapped(&s).unwrap());
    let r = bootstrap::seed(&s, &hasher(), "admin@example.com", "Admin123").unwrap();
    assert!(bootstrap::is_bootstrapped(&s).unwrap());

    assert_eq!(r.permissions, 20);
    assert_eq!(s.list_permissions().unwrap().len(), 20);
    assert_eq!(s.find_permissions_for_role(r.admin_role).unwrap().len(), 20);
    assert!(s.find_permissions_for_role(r.user_role).unwrap().is_empty());

    let admin = s.find_user(r.admin_user).unwrap().unwrap();
    assert_eq!(admin.role_id, Some(r.admin_role));
    assert_eq!(admin.name.as_deref(), Some("Admin"));
    assert_eq!(s.find_permission_by_pair("menus", "update").unwrap().unwrap().name, "Edit Menus");
}

#[test]
fn management_menus_are_admin_only() {
    let s = MemoryStore::new();
    let r = bootstrap::seed(&s, &hasher(), "admin@example.com", "Admin123").unwrap();
    assert_eq!(r.menus, 4);

    let tree = visible_menu_tree_for(&s, Some("admin")).unwrap();
    let titles: Vec<_> = tree.iter().map(|n| n.title.as_str()).collect();
    assert_eq!(titles, vec!["User Management", "Role Management", "Permission Management", "Menu Management"]);
    assert_eq!(tree[0].url.as_deref(), Some("/dashboard/users"));
    assert_eq!(tree[1].icon.as_deref(), Some("Shield"));

    assert!(visible_menu_tree_for(&s, Some("user")).unwrap().is_empty());
    assert!(!has_permission(&s, Some("user"), "users", "read").unwrap());
}

#[test]
fn seeds_starter_icons() {
    let s = MemoryStore::new();
    bootstrap::seed(&s, &hasher(), "admin@example.com", "Admin123").unwrap();
    let icons = s.list_icons().unwrap();
    assert_eq!(icons.len(), 12);
    assert!(icons.iter().all(|i| i.is_active));
    assert!(s.find_icon_by_name("LayoutDashboard").unwrap().is_some());
}

#[test]
fn second_seed_conflicts() {
    let s = MemoryStore::new();
    bootstrap::seed(&s, &hasher(), "admin@example.com", "Admin123").unwrap();
    let err = bootstrap::seed(&s, &hasher(), "other@example.com", "Admin123").unwrap_err();
    assert!(matches!(err, DashError::Conflict(_)));
    assert_eq!(s.list_users().unwrap().len(), 1);
}

#[test]
fn bad_credentials_seed_nothing() {
    let s = MemoryStore::new();
    assert!(matches!(bootstrap::seed(&s, &hasher(), "admin", "Admin123"), Err(DashError::Validation { .. })));
    assert!(matches!(bootstrap::seed(&s, &hasher(), "admin@example.com", "short"), Err(DashError::Validation { .. })));
    assert!(s.list_permissions().unwrap().is_empty());
    assert!(!bootstrap::is_bootstrapped(&s).unwrap());
}

#[test]
fn seeds_lmdb_store() {
    let dir = TempDir::new().unwrap();
    let s = LmdbStore::open(dir.path().join("db")).unwrap();
    bootstrap::seed(&s, &hasher(), "admin@example.com", "Admin123").unwrap();
    assert_eq!(visible_menu_tree_for(&s, Some("admin")).unwrap().len(), 4);
    assert!(has_permission(&s, Some("admin"), "icons", "delete").unwrap());
}
