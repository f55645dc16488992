//! Concurrent writer tests
//!
//! `Interleaved` lets a second admin's write land between an operation's
//! pre-checks and its store write, so the store-side constraints are the
//! only thing left to catch the conflict.

use std::thread;

use dashguard::menu;
use dashguard::model::{Icon, Id, Menu, MenuPatch, NewMenu, NewRole, Permission, Role, RolePatch, SessionRecord, User};
use dashguard::{protected, AuthContext, DashError, LmdbStore, MemoryStore, Result, Session, Store};
use parking_lot::Mutex;
use tempfile::TempDir;

type Hook<S> = Box<dyn FnOnce(&S) + Send>;

/// Store wrapper that runs one queued write against the inner store right
/// before the next role or menu write reaches it.
struct Interleaved<S> {
    inner: S,
    pending: Mutex<Option<Hook<S>>>,
}

impl<S: Store> Interleaved<S> {
    fn new(inner: S) -> Self {
        Interleaved { inner, pending: Mutex::new(None) }
    }

    fn before_next_write(&self, f: impl FnOnce(&S) + Send + 'static) {
        *self.pending.lock() = Some(Box::new(f));
    }

    fn fire(&self) {
        let hook = self.pending.lock().take();
        if let Some(f) = hook {
            f(&self.inner);
        }
    }
}

macro_rules! delegate {
    ($($name:ident($($arg:ident: $ty:ty),*) -> $ret:ty;)*) => {
        $(fn $name(&self, $($arg: $ty),*) -> Result<$ret> {
            self.inner.$name($($arg),*)
        })*
    };
}

impl<S: Store> Store for Interleaved<S> {
    fn insert_role_with_permissions(&self, role: Role, permission_ids: Option<&[Id]>) -> Result<Role> {
        self.fire();
        self.inner.insert_role_with_permissions(role, permission_ids)
    }

    fn update_role_with_permissions(&self, role: Role, permission_ids: Option<&[Id]>) -> Result<Role> {
        self.fire();
        self.inner.update_role_with_permissions(role, permission_ids)
    }

    fn insert_menu(&self, menu: Menu) -> Result<Menu> {
        self.fire();
        self.inner.insert_menu(menu)
    }

    fn update_menu(&self, menu: Menu) -> Result<Menu> {
        self.fire();
        self.inner.update_menu(menu)
    }

    delegate! {
        find_role(id: Id) -> Option<Role>;
        find_role_by_name(name: &str) -> Option<Role>;
        list_roles() -> Vec<Role>;
        delete_role(id: Id) -> bool;
        set_role_permissions(role_id: Id, permission_ids: &[Id]) -> ();
        find_permissions_for_role(role_id: Id) -> Vec<Permission>;
        count_users_with_role(role_id: Id) -> usize;
        find_permission(id: Id) -> Option<Permission>;
        find_permission_by_name(name: &str) -> Option<Permission>;
        find_permission_by_pair(module: &str, action: &str) -> Option<Permission>;
        list_permissions() -> Vec<Permission>;
        insert_permission(permission: Permission) -> Permission;
        update_permission(permission: Permission) -> Permission;
        delete_permission(id: Id) -> bool;
        count_roles_with_permission(permission_id: Id) -> usize;
        find_user(id: Id) -> Option<User>;
        find_user_by_email(email: &str) -> Option<User>;
        list_users() -> Vec<User>;
        insert_user(user: User) -> User;
        update_user(user: User) -> User;
        delete_user(id: Id) -> bool;
        find_menu_by_id(id: Id) -> Option<Menu>;
        find_menus_by_parent(parent: Option<Id>) -> Vec<Menu>;
        list_menus() -> Vec<Menu>;
        delete_menu(id: Id) -> bool;
        find_icon(id: Id) -> Option<Icon>;
        find_icon_by_name(name: &str) -> Option<Icon>;
        list_icons() -> Vec<Icon>;
        insert_icon(icon: Icon) -> Icon;
        update_icon(icon: Icon) -> Icon;
        delete_icon(id: Id) -> bool;
        insert_session(token_hash: &str, session: SessionRecord) -> ();
        find_session(token_hash: &str) -> Option<SessionRecord>;
        delete_session(token_hash: &str) -> bool;
    }
}

fn lmdb() -> (LmdbStore, TempDir) {
    let dir = TempDir::new().unwrap();
    let s = LmdbStore::open(dir.path().join("db")).unwrap();
    (s, dir)
}

fn add(s: &dyn Store, title: &str, parent: Option<Id>) -> Menu {
    let mut m = NewMenu::new(title);
    m.parent_id = parent;
    menu::create(s, m).unwrap()
}

fn parent_patch(parent: Option<Id>) -> MenuPatch {
    MenuPatch { parent_id: parent.into(), ..Default::default() }
}

fn assert_within_cap(s: &dyn Store) {
    for m in s.list_menus().unwrap() {
        let d = menu::depth(s, m.id).unwrap();
        assert!(d <= 3, "menu '{}' sits at level {}", m.title, d);
    }
}

fn new_role(name: &str, permission_ids: Option<Vec<Id>>) -> NewRole {
    NewRole { name: name.into(), description: None, is_active: true, permission_ids }
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

fn root() -> Session {
    Session::new(1, "admin")
}

// ============================================================================
// Menu depth
// ============================================================================

mod menu_depth {
    use super::*;

    /// X > Y and A > B. Creating C under B while B moves under Y.
    fn create_while_parent_moves<S: Store + 'static>(inner: S) {
        let s = Interleaved::new(inner);
        let x = add(&s, "X", None);
        let y = add(&s, "Y", Some(x.id));
        let a = add(&s, "A", None);
        let b = add(&s, "B", Some(a.id));

        s.before_next_write(move |other| {
            menu::update(other, b.id, parent_patch(Some(y.id))).unwrap();
        });
        let err = menu::create(&s, NewMenu::new("C").under(b.id)).unwrap_err();
        assert_eq!(err, DashError::DepthExceeded { max: 3 });
        assert_eq!(s.find_menu_by_id(b.id).unwrap().unwrap().parent_id, Some(y.id));
        assert_eq!(s.list_menus().unwrap().len(), 4);
        assert_within_cap(&s);
    }

    /// Same tree. Moving B under Y while C is created under B.
    fn move_while_child_created<S: Store + 'static>(inner: S) {
        let s = Interleaved::new(inner);
        let x = add(&s, "X", None);
        let y = add(&s, "Y", Some(x.id));
        let a = add(&s, "A", None);
        let b = add(&s, "B", Some(a.id));

        s.before_next_write(move |other| {
            add(other, "C", Some(b.id));
        });
        let err = menu::update(&s, b.id, parent_patch(Some(y.id))).unwrap_err();
        assert_eq!(err, DashError::DepthExceeded { max: 3 });
        assert_eq!(s.find_menu_by_id(b.id).unwrap().unwrap().parent_id, Some(a.id));
        assert_within_cap(&s);
    }

    #[test]
    fn lmdb_create_while_parent_moves() {
        let (s, _d) = lmdb();
        create_while_parent_moves(s);
    }

    #[test]
    fn memory_create_while_parent_moves() {
        create_while_parent_moves(MemoryStore::new());
    }

    #[test]
    fn lmdb_move_while_child_created() {
        let (s, _d) = lmdb();
        move_while_child_created(s);
    }

    #[test]
    fn memory_move_while_child_created() {
        move_while_child_created(MemoryStore::new());
    }

    #[test]
    fn threads_never_build_a_fourth_level() {
        let (s, _d) = lmdb();
        let x = add(&s, "X", None);
        let y = add(&s, "Y", Some(x.id));
        let a = add(&s, "A", None);
        let b = add(&s, "B", Some(a.id));

        thread::scope(|scope| {
            let store: &dyn Store = &s;
            scope.spawn(move || {
                let _ = menu::update(store, b.id, parent_patch(Some(y.id)));
            });
            for i in 0..4 {
                scope.spawn(move || {
                    let _ = menu::create(store, NewMenu::new(format!("Child {}", i)).under(b.id));
                });
            }
        });
        assert_within_cap(&s);
    }
}

// ============================================================================
// Roles
// ============================================================================

mod roles {
    use super::*;

    fn duplicate_name_lands_first<S: Store + 'static>(inner: S) {
        let s = Interleaved::new(inner);
        let session = root();
        let ctx = AuthContext::new(&session, &s);

        s.before_next_write(|other| {
            let editor = Role { id: 0, name: "editor".into(), description: None, is_active: true, created_at: 0, updated_at: 0 };
            other.insert_role(editor).unwrap();
        });
        let err = protected::create_role(&ctx, new_role("editor", None)).unwrap_err();
        assert!(matches!(err, DashError::Conflict(_)));
        assert_eq!(s.list_roles().unwrap().len(), 1);
    }

    fn permission_deleted_before_create<S: Store + 'static>(inner: S) {
        let s = Interleaved::new(inner);
        let session = root();
        let ctx = AuthContext::new(&session, &s);
        let p = s.insert_permission(permission("reports", "read")).unwrap();

        s.before_next_write(move |other| {
            assert!(other.delete_permission(p.id).unwrap());
        });
        let err = protected::create_role(&ctx, new_role("analyst", Some(vec![p.id]))).unwrap_err();
        assert!(matches!(err, DashError::NotFound(_)));
        assert!(s.find_role_by_name("analyst").unwrap().is_none());

        // Nothing left behind, so a retry is not a conflict
        let p = s.insert_permission(permission("reports", "read")).unwrap();
        let detail = protected::create_role(&ctx, new_role("analyst", Some(vec![p.id]))).unwrap();
        assert_eq!(s.find_permissions_for_role(detail.role.id).unwrap().len(), 1);
    }

    fn permission_deleted_before_update<S: Store + 'static>(inner: S) {
        let s = Interleaved::new(inner);
        let session = root();
        let ctx = AuthContext::new(&session, &s);
        let read = s.insert_permission(permission("reports", "read")).unwrap();
        let export = s.insert_permission(permission("reports", "export")).unwrap();
        let role = protected::create_role(&ctx, new_role("analyst", Some(vec![read.id]))).unwrap().role;

        s.before_next_write(move |other| {
            assert!(other.delete_permission(export.id).unwrap());
        });
        let patch = RolePatch { name: Some("auditor".into()), permission_ids: Some(vec![export.id]), ..Default::default() };
        let err = protected::update_role(&ctx, role.id, patch).unwrap_err();
        assert!(matches!(err, DashError::NotFound(_)));

        let stored = s.find_role(role.id).unwrap().unwrap();
        assert_eq!(stored.name, "analyst");
        let held: Vec<_> = s.find_permissions_for_role(role.id).unwrap().into_iter().map(|p| p.id).collect();
        assert_eq!(held, vec![read.id]);
    }

    #[test]
    fn lmdb_duplicate_name_lands_first() {
        let (s, _d) = lmdb();
        duplicate_name_lands_first(s);
    }

    #[test]
    fn memory_duplicate_name_lands_first() {
        duplicate_name_lands_first(MemoryStore::new());
    }

    #[test]
    fn lmdb_permission_deleted_before_create() {
        let (s, _d) = lmdb();
        permission_deleted_before_create(s);
    }

    #[test]
    fn memory_permission_deleted_before_create() {
        permission_deleted_before_create(MemoryStore::new());
    }

    #[test]
    fn lmdb_permission_deleted_before_update() {
        let (s, _d) = lmdb();
        permission_deleted_before_update(s);
    }

    #[test]
    fn memory_permission_deleted_before_update() {
        permission_deleted_before_update(MemoryStore::new());
    }

    #[test]
    fn threads_create_one_role_per_name() {
        let (s, _d) = lmdb();
        let session = root();
        let ok = thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    let ctx = AuthContext::new(&session, &s);
                    scope.spawn(move || protected::create_role(&ctx, new_role("editor", None)))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|r| match r {
                    Ok(_) => true,
                    Err(e) => {
                        assert!(matches!(e, DashError::Conflict(_)), "{e:?}");
                        false
                    }
                })
                .count()
        });
        assert_eq!(ok, 1);
        assert_eq!(s.list_roles().unwrap().len(), 1);
    }
}
