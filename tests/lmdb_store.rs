//! LMDB backend tests

use dashguard::model::{Icon, Menu, Permission, Role, SessionRecord, User};
use dashguard::{DashError, LmdbStore, RoleSet, Store};
use tempfile::TempDir;

fn setup() -> (LmdbStore, TempDir) {
    let dir = TempDir::new().unwrap();
    let s = LmdbStore::open(dir.path().join("db")).unwrap();
    (s, dir)
}

fn role(name: &str) -> Role {
    Role { id: 0, name: name.into(), description: None, is_active: true, created_at: 0, updated_at: 0 }
}

fn permission(module: &str, action: &str) -> Permission {
    Permission {
        id: 0,
        name: format!("{} {}", action, module),
        description: None,
        module: module.into(),
        action: action.into(),
        created_at: 0,
        updated_at: 0,
    }
}

fn user(email: &str, role_id: Option<u64>) -> User {
    User { id: 0, email: email.into(), name: None, password_hash: "x".into(), role_id, created_at: 0, updated_at: 0 }
}

fn menu(title: &str, parent: Option<u64>, order: i32) -> Menu {
    Menu {
        id: 0,
        title: title.into(),
        url: None,
        icon: None,
        order,
        parent_id: parent,
        roles: RoleSet::default(),
        is_active: true,
        created_at: 0,
        updated_at: 0,
    }
}

fn icon(name: &str, category: &str) -> Icon {
    Icon { id: 0, name: name.into(), category: category.into(), is_active: true, created_at: 0, updated_at: 0 }
}

// ============================================================================
// Records and ids
// ============================================================================

mod records {
    use super::*;

    #[test]
    fn insert_assigns_ids_and_timestamps() {
        let (s, _d) = setup();
        let a = s.insert_role(role("editor")).unwrap();
        let b = s.insert_permission(permission("users", "read")).unwrap();
        assert!(a.id > 0);
        assert_ne!(a.id, b.id);
        assert!(a.created_at > 0);
        assert_eq!(a.created_at, a.updated_at);
        assert_eq!(s.find_role(a.id).unwrap().unwrap(), a);
    }

    #[test]
    fn update_keeps_created_at() {
        let (s, _d) = setup();
        let a = s.insert_role(role("editor")).unwrap();
        let mut changed = a.clone();
        changed.description = Some("Edits things".into());
        changed.created_at = 1;
        let stored = s.update_role(changed).unwrap();
        assert_eq!(stored.created_at, a.created_at);
        assert!(stored.updated_at >= a.updated_at);
        assert_eq!(stored.description.as_deref(), Some("Edits things"));
    }

    #[test]
    fn update_missing_is_not_found() {
        let (s, _d) = setup();
        let mut ghost = role("ghost");
        ghost.id = 77;
        assert!(matches!(s.update_role(ghost), Err(DashError::NotFound(_))));
        assert!(!s.delete_role(77).unwrap());
    }

    #[test]
    fn persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("db");
        let (rid, mid) = {
            let s = LmdbStore::open(&path).unwrap();
            let r = s.insert_role(role("editor")).unwrap();
            let m = s.insert_menu(menu("Reports", None, 1)).unwrap();
            (r.id, m.id)
        };
        let s = LmdbStore::open(&path).unwrap();
        assert_eq!(s.find_role_by_name("editor").unwrap().unwrap().id, rid);
        assert_eq!(s.find_menu_by_id(mid).unwrap().unwrap().title, "Reports");
        // the id counter survives too
        assert!(s.insert_role(role("viewer")).unwrap().id > mid);
    }

    #[test]
    fn clear_empties_everything() {
        let (s, _d) = setup();
        let r = s.insert_role(role("editor")).unwrap();
        s.insert_user(user("a@example.com", Some(r.id))).unwrap();
        s.insert_icon(icon("Users", "general")).unwrap();
        s.clear().unwrap();
        assert!(s.list_roles().unwrap().is_empty());
        assert!(s.list_users().unwrap().is_empty());
        assert!(s.list_icons().unwrap().is_empty());
        assert!(s.find_role_by_name("editor").unwrap().is_none());
        s.insert_role(role("editor")).unwrap();
    }
}

// ============================================================================
// Unique indexes
// ============================================================================

mod unique {
    use super::*;

    #[test]
    fn duplicates_conflict() {
        let (s, _d) = setup();
        s.insert_role(role("editor")).unwrap();
        assert!(matches!(s.insert_role(role("editor")), Err(DashError::Conflict(_))));

        s.insert_permission(permission("users", "read")).unwrap();
        let mut same_pair = permission("users", "read");
        same_pair.name = "Another".into();
        assert!(matches!(s.insert_permission(same_pair), Err(DashError::Conflict(_))));

        s.insert_user(user("a@example.com", None)).unwrap();
        assert!(matches!(s.insert_user(user("a@example.com", None)), Err(DashError::Conflict(_))));

        s.insert_icon(icon("Users", "general")).unwrap();
        assert!(matches!(s.insert_icon(icon("Users", "media")), Err(DashError::Conflict(_))));
    }

    #[test]
    fn conflict_leaves_no_trace() {
        let (s, _d) = setup();
        let first = s.insert_role(role("editor")).unwrap();
        assert!(matches!(s.insert_role(role("editor")), Err(DashError::Conflict(_))));
        let p = s.insert_permission(permission("users", "read")).unwrap();
        assert_eq!(p.id, first.id + 1);

        let mut taken_name = permission("users", "update");
        taken_name.name = p.name.clone();
        assert_eq!(s.insert_permission(taken_name), Err(DashError::Conflict("permission 'read users' already exists".into())));
        assert!(s.find_permission_by_pair("users", "update").unwrap().is_none());

        let u = s.insert_user(user("a@example.com", None)).unwrap();
        assert_eq!(u.id, p.id + 1);
        assert_eq!(s.insert_user(user("a@example.com", Some(999))), Err(DashError::Conflict("email 'a@example.com' already in use".into())));
    }

    #[test]
    fn rename_moves_index_entry() {
        let (s, _d) = setup();
        let mut r = s.insert_role(role("editor")).unwrap();
        r.name = "author".into();
        s.update_role(r.clone()).unwrap();
        assert!(s.find_role_by_name("editor").unwrap().is_none());
        assert_eq!(s.find_role_by_name("author").unwrap().unwrap().id, r.id);
        // the old name is free again
        s.insert_role(role("editor")).unwrap();
    }

    #[test]
    fn pair_change_moves_index_entry() {
        let (s, _d) = setup();
        let mut p = s.insert_permission(permission("users", "read")).unwrap();
        p.action = "export".into();
        s.update_permission(p.clone()).unwrap();
        assert!(s.find_permission_by_pair("users", "read").unwrap().is_none());
        assert_eq!(s.find_permission_by_pair("users", "export").unwrap().unwrap().id, p.id);
    }

    #[test]
    fn rename_onto_taken_name_conflicts() {
        let (s, _d) = setup();
        s.insert_role(role("editor")).unwrap();
        let mut r = s.insert_role(role("author")).unwrap();
        r.name = "editor".into();
        assert!(matches!(s.update_role(r), Err(DashError::Conflict(_))));
        assert!(s.find_role_by_name("author").unwrap().is_some());
    }
}

// ============================================================================
// References
// ============================================================================

mod references {
    use super::*;

    #[test]
    fn role_in_use_by_users() {
        let (s, _d) = setup();
        let r = s.insert_role(role("editor")).unwrap();
        s.insert_user(user("a@example.com", Some(r.id))).unwrap();
        s.insert_user(user("b@example.com", Some(r.id))).unwrap();
        assert_eq!(s.count_users_with_role(r.id).unwrap(), 2);
        assert!(matches!(s.delete_role(r.id), Err(DashError::InUse { count: 2, .. })));
        assert!(s.find_role(r.id).unwrap().is_some());
    }

    #[test]
    fn user_role_index_follows_updates() {
        let (s, _d) = setup();
        let a = s.insert_role(role("editor")).unwrap();
        let b = s.insert_role(role("viewer")).unwrap();
        let mut u = s.insert_user(user("a@example.com", Some(a.id))).unwrap();
        u.role_id = Some(b.id);
        s.update_user(u.clone()).unwrap();
        assert_eq!(s.count_users_with_role(a.id).unwrap(), 0);
        assert_eq!(s.count_users_with_role(b.id).unwrap(), 1);
        s.delete_role(a.id).unwrap();
        s.delete_user(u.id).unwrap();
        assert_eq!(s.count_users_with_role(b.id).unwrap(), 0);
    }

    #[test]
    fn unknown_role_reference_rejected() {
        let (s, _d) = setup();
        assert!(matches!(s.insert_user(user("a@example.com", Some(42))), Err(DashError::NotFound(_))));
        assert!(s.find_user_by_email("a@example.com").unwrap().is_none());
    }

    #[test]
    fn grants_and_permission_in_use() {
        let (s, _d) = setup();
        let r = s.insert_role(role("editor")).unwrap();
        let p1 = s.insert_permission(permission("users", "read")).unwrap();
        let p2 = s.insert_permission(permission("menus", "read")).unwrap();
        s.set_role_permissions(r.id, &[p1.id, p2.id]).unwrap();
        assert_eq!(s.find_permissions_for_role(r.id).unwrap().len(), 2);
        assert_eq!(s.count_roles_with_permission(p1.id).unwrap(), 1);
        assert!(matches!(s.delete_permission(p1.id), Err(DashError::InUse { count: 1, .. })));

        // replace drops p1
        s.set_role_permissions(r.id, &[p2.id]).unwrap();
        assert_eq!(s.count_roles_with_permission(p1.id).unwrap(), 0);
        assert!(s.delete_permission(p1.id).unwrap());

        // deleting the role drops its grants
        s.delete_role(r.id).unwrap();
        assert_eq!(s.count_roles_with_permission(p2.id).unwrap(), 0);
    }

    #[test]
    fn grant_with_unknown_ids_changes_nothing() {
        let (s, _d) = setup();
        let r = s.insert_role(role("editor")).unwrap();
        let p = s.insert_permission(permission("users", "read")).unwrap();
        s.set_role_permissions(r.id, &[p.id]).unwrap();
        assert!(matches!(s.set_role_permissions(r.id, &[p.id, 999]), Err(DashError::NotFound(_))));
        assert!(matches!(s.set_role_permissions(999, &[p.id]), Err(DashError::NotFound(_))));
        assert_eq!(s.find_permissions_for_role(r.id).unwrap(), vec![p]);
    }
}

// ============================================================================
// Menus
// ============================================================================

mod menus {
    use super::*;

    #[test]
    fn parent_must_exist() {
        let (s, _d) = setup();
        assert!(matches!(s.insert_menu(menu("Orphan", Some(5), 0)), Err(DashError::NotFound(_))));
        let root = s.insert_menu(menu("Root", None, 0)).unwrap();
        let mut m = s.insert_menu(menu("Child", Some(root.id), 0)).unwrap();
        m.parent_id = Some(m.id);
        assert_eq!(s.update_menu(m), Err(DashError::SelfParent));
    }

    #[test]
    fn has_children_blocks_delete() {
        let (s, _d) = setup();
        let root = s.insert_menu(menu("Root", None, 0)).unwrap();
        let child = s.insert_menu(menu("Child", Some(root.id), 0)).unwrap();
        assert_eq!(s.delete_menu(root.id), Err(DashError::HasChildren { count: 1 }));
        assert!(s.delete_menu(child.id).unwrap());
        assert!(s.delete_menu(root.id).unwrap());
    }

    #[test]
    fn siblings_sorted_and_reparent_tracked() {
        let (s, _d) = setup();
        let a = s.insert_menu(menu("A", None, 0)).unwrap();
        let b = s.insert_menu(menu("B", None, 0)).unwrap();
        let c2 = s.insert_menu(menu("C2", Some(a.id), 2)).unwrap();
        let c1 = s.insert_menu(menu("C1", Some(a.id), 1)).unwrap();
        let ids = |p| s.find_menus_by_parent(p).unwrap().iter().map(|m| m.id).collect::<Vec<_>>();
        assert_eq!(ids(None), vec![a.id, b.id]);
        assert_eq!(ids(Some(a.id)), vec![c1.id, c2.id]);

        let mut moved = c2.clone();
        moved.parent_id = Some(b.id);
        s.update_menu(moved).unwrap();
        assert_eq!(ids(Some(a.id)), vec![c1.id]);
        assert_eq!(ids(Some(b.id)), vec![c2.id]);

        let mut to_root = c1.clone();
        to_root.parent_id = None;
        s.update_menu(to_root).unwrap();
        assert_eq!(ids(None), vec![a.id, b.id, c1.id]);
        assert!(s.delete_menu(a.id).unwrap());
    }

    #[test]
    fn depth_capped_on_insert() {
        let (s, _d) = setup();
        let a = s.insert_menu(menu("A", None, 0)).unwrap();
        let b = s.insert_menu(menu("B", Some(a.id), 0)).unwrap();
        let c = s.insert_menu(menu("C", Some(b.id), 0)).unwrap();
        assert_eq!(s.insert_menu(menu("D", Some(c.id), 0)), Err(DashError::DepthExceeded { max: 3 }));
        assert_eq!(s.list_menus().unwrap().len(), 3);
    }

    #[test]
    fn move_counts_whole_subtree() {
        let (s, _d) = setup();
        let x = s.insert_menu(menu("X", None, 0)).unwrap();
        let y = s.insert_menu(menu("Y", Some(x.id), 0)).unwrap();
        let a = s.insert_menu(menu("A", None, 0)).unwrap();
        let b = s.insert_menu(menu("B", Some(a.id), 0)).unwrap();

        let mut moved = a.clone();
        moved.parent_id = Some(y.id);
        assert_eq!(s.update_menu(moved), Err(DashError::DepthExceeded { max: 3 }));
        assert_eq!(s.find_menu_by_id(a.id).unwrap().unwrap().parent_id, None);

        let mut moved = a.clone();
        moved.parent_id = Some(x.id);
        s.update_menu(moved).unwrap();
        assert_eq!(s.find_menus_by_parent(Some(x.id)).unwrap().len(), 2);

        // Under its own child: caught by the height of the moved subtree
        let mut a = s.find_menu_by_id(a.id).unwrap().unwrap();
        a.parent_id = Some(b.id);
        assert_eq!(s.update_menu(a), Err(DashError::DepthExceeded { max: 3 }));
    }

    #[test]
    fn active_filter() {
        let (s, _d) = setup();
        s.insert_menu(menu("On", None, 0)).unwrap();
        let mut off = menu("Off", None, 0);
        off.is_active = false;
        s.insert_menu(off).unwrap();
        assert_eq!(s.list_menus().unwrap().len(), 2);
        let active = s.find_all_active_menus().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].title, "On");
    }
}

// ============================================================================
// Listings and sessions
// ============================================================================

mod listings {
    use super::*;

    #[test]
    fn ordering() {
        let (s, _d) = setup();
        s.insert_role(role("viewer")).unwrap();
        s.insert_role(role("editor")).unwrap();
        assert_eq!(s.list_roles().unwrap().iter().map(|r| r.name.as_str()).collect::<Vec<_>>(), vec!["editor", "viewer"]);

        s.insert_permission(permission("users", "read")).unwrap();
        s.insert_permission(permission("menus", "update")).unwrap();
        s.insert_permission(permission("menus", "create")).unwrap();
        let pairs: Vec<_> = s.list_permissions().unwrap().into_iter().map(|p| format!("{}:{}", p.module, p.action)).collect();
        assert_eq!(pairs, vec!["menus:create", "menus:update", "users:read"]);

        let first = s.insert_user(user("a@example.com", None)).unwrap();
        let second = s.insert_user(user("b@example.com", None)).unwrap();
        assert_eq!(s.list_users().unwrap().iter().map(|u| u.id).collect::<Vec<_>>(), vec![second.id, first.id]);

        s.insert_icon(icon("Mail", "social")).unwrap();
        s.insert_icon(icon("Users", "general")).unwrap();
        s.insert_icon(icon("Home", "general")).unwrap();
        let names: Vec<_> = s.list_icons().unwrap().into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["Home", "Users", "Mail"]);
    }

    #[test]
    fn sessions_round_trip() {
        let (s, _d) = setup();
        let u = s.insert_user(user("a@example.com", None)).unwrap();
        let rec = SessionRecord { user_id: u.id, created_at: 1, expires_at: Some(2) };
        s.insert_session("abc", rec.clone()).unwrap();
        assert_eq!(s.find_session("abc").unwrap(), Some(rec));
        assert!(s.delete_session("abc").unwrap());
        assert!(!s.delete_session("abc").unwrap());
        assert_eq!(s.find_session("abc").unwrap(), None);
    }

    #[test]
    fn deleting_user_drops_sessions() {
        let (s, _d) = setup();
        let u = s.insert_user(user("a@example.com", None)).unwrap();
        s.insert_session("t1", SessionRecord { user_id: u.id, created_at: 1, expires_at: None }).unwrap();
        s.delete_user(u.id).unwrap();
        assert_eq!(s.find_session("t1").unwrap(), None);
    }
}
