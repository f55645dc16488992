//! LMDB store: database handles, key helpers and environment setup

use std::marker::PhantomData;
use std::path::Path;

use heed::types::{Bytes, Str, U64};
use heed::{Database, Env, EnvOpenOptions, RoTxn, RwTxn};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{err, DashError, Result};
use crate::model::{Icon, Id, Menu, Permission, Role, SessionRecord, User};
use crate::read;
use crate::store::Store;
use crate::tx::Tx;

// Database type aliases
pub type Db = Database<Bytes, U64<byteorder::BigEndian>>;
pub type DbU64 = Database<Str, U64<byteorder::BigEndian>>;
pub type DbRec = Database<U64<byteorder::BigEndian>, Bytes>;

/// Parent key used for root menus in the children index
pub const ROOT: u64 = 0;

/// Create a 16-byte key from two u64 values
#[inline]
pub fn key(a: u64, b: u64) -> [u8; 16] {
    let a = a.to_be_bytes();
    let b = b.to_be_bytes();
    [a[0], a[1], a[2], a[3], a[4], a[5], a[6], a[7],
     b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]
}

/// Second half of a 16-byte pair key
#[inline]
fn tail(k: &[u8]) -> Option<u64> {
    let b: [u8; 8] = k.get(8..16)?.try_into().ok()?;
    Some(u64::from_be_bytes(b))
}

/// Records of one type, JSON-encoded under big-endian ids
pub struct Table<T> {
    db: DbRec,
    _t: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned> Table<T> {
    fn new(db: DbRec) -> Self {
        Table { db, _t: PhantomData }
    }

    pub fn get(&self, tx: &RoTxn, id: u64) -> Result<Option<T>> {
        match self.db.get(tx, &id).map_err(err)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(bytes)?)),
            None => Ok(None),
        }
    }

    pub fn put(&self, tx: &mut RwTxn, id: u64, v: &T) -> Result<()> {
        let bytes = serde_json::to_vec(v)?;
        self.db.put(tx, &id, &bytes).map_err(err)
    }

    pub fn del(&self, tx: &mut RwTxn, id: u64) -> Result<bool> {
        self.db.delete(tx, &id).map_err(err)
    }

    pub fn all(&self, tx: &RoTxn) -> Result<Vec<T>> {
        let mut r = Vec::new();
        for item in self.db.iter(tx).map_err(err)? {
            let (_, bytes) = item.map_err(err)?;
            r.push(serde_json::from_slice(bytes)?);
        }
        Ok(r)
    }

    pub fn clear(&self, tx: &mut RwTxn) -> Result<()> {
        self.db.clear(tx).map_err(err)
    }
}

/// Bidirectional index: fwd[a,b] and rev[b,a] stay in sync
pub struct BiPair {
    pub fwd: Db,
    pub rev: Db,
}

impl BiPair {
    #[inline]
    pub fn put(&self, tx: &mut RwTxn, a: u64, b: u64) -> Result<()> {
        self.fwd.put(tx, &key(a, b), &1).map_err(err)?;
        self.rev.put(tx, &key(b, a), &1).map_err(err)
    }

    #[inline]
    pub fn del(&self, tx: &mut RwTxn, a: u64, b: u64) -> Result<bool> {
        let r = self.fwd.delete(tx, &key(a, b)).map_err(err)?;
        self.rev.delete(tx, &key(b, a)).map_err(err)?;
        Ok(r)
    }

    pub fn list_fwd(&self, tx: &RoTxn, a: u64) -> Result<Vec<u64>> {
        list_pfx(tx, &self.fwd, a)
    }

    pub fn count_rev(&self, tx: &RoTxn, b: u64) -> Result<usize> {
        count_pfx(tx, &self.rev, b)
    }

    fn clear(&self, tx: &mut RwTxn) -> Result<()> {
        self.fwd.clear(tx).map_err(err)?;
        self.rev.clear(tx).map_err(err)
    }
}

/// Second halves of every `key(pfx, _)` in `db`
pub fn list_pfx(tx: &RoTxn, db: &Db, pfx: u64) -> Result<Vec<u64>> {
    let mut r = Vec::new();
    for item in db.prefix_iter(tx, &pfx.to_be_bytes()).map_err(err)? {
        let (k, _) = item.map_err(err)?;
        if let Some(id) = tail(k) {
            r.push(id);
        }
    }
    Ok(r)
}

pub fn count_pfx(tx: &RoTxn, db: &Db, pfx: u64) -> Result<usize> {
    let mut n = 0;
    for item in db.prefix_iter(tx, &pfx.to_be_bytes()).map_err(err)? {
        item.map_err(err)?;
        n += 1;
    }
    Ok(n)
}

/// All database handles
pub struct Dbs {
    pub meta: Database<Str, Str>,
    pub roles: Table<Role>,
    pub permissions: Table<Permission>,
    pub users: Table<User>,
    pub menus: Table<Menu>,
    pub icons: Table<Icon>,
    pub sessions: Database<Str, Bytes>,
    /// role -> permission
    pub grants: BiPair,
    /// key(role, user)
    pub role_users: Db,
    /// key(parent or ROOT, child)
    pub menu_children: Db,
    // Unique indexes
    pub role_names: DbU64,
    pub permission_names: DbU64,
    pub permission_pairs: DbU64,
    pub user_emails: DbU64,
    pub icon_names: DbU64,
}

/// Index key for a (module, action) pair
pub fn pair_key(module: &str, action: &str) -> String {
    format!("{}\u{1f}{}", module, action)
}

/// Store persisted in an LMDB environment
pub struct LmdbStore {
    env: Env,
    dbs: Dbs,
}

/// Default map size: 1 GiB
pub const DEFAULT_MAP_SIZE: usize = 1 << 30;

impl LmdbStore {
    /// Open (or create) the store at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_map_size(path, DEFAULT_MAP_SIZE)
    }

    pub fn open_with_map_size(path: impl AsRef<Path>, map_size: usize) -> Result<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path).map_err(err)?;
        // SAFETY: LMDB requires no other processes access this path concurrently during open.
        let e = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(20)
                .open(path)
                .map_err(err)?
        };
        let mut tx = e.write_txn().map_err(err)?;
        let dbs = Dbs {
            meta: e.create_database(&mut tx, Some("meta")).map_err(err)?,
            roles: Table::new(e.create_database(&mut tx, Some("roles")).map_err(err)?),
            permissions: Table::new(e.create_database(&mut tx, Some("permissions")).map_err(err)?),
            users: Table::new(e.create_database(&mut tx, Some("users")).map_err(err)?),
            menus: Table::new(e.create_database(&mut tx, Some("menus")).map_err(err)?),
            icons: Table::new(e.create_database(&mut tx, Some("icons")).map_err(err)?),
            sessions: e.create_database(&mut tx, Some("sessions")).map_err(err)?,
            grants: BiPair {
                fwd: e.create_database(&mut tx, Some("grants")).map_err(err)?,
                rev: e.create_database(&mut tx, Some("grants_rev")).map_err(err)?,
            },
            role_users: e.create_database(&mut tx, Some("role_users")).map_err(err)?,
            menu_children: e.create_database(&mut tx, Some("menu_children")).map_err(err)?,
            role_names: e.create_database(&mut tx, Some("role_names")).map_err(err)?,
            permission_names: e.create_database(&mut tx, Some("permission_names")).map_err(err)?,
            permission_pairs: e.create_database(&mut tx, Some("permission_pairs")).map_err(err)?,
            user_emails: e.create_database(&mut tx, Some("user_emails")).map_err(err)?,
            icon_names: e.create_database(&mut tx, Some("icon_names")).map_err(err)?,
        };
        tx.commit().map_err(err)?;
        tracing::debug!(path = %path.display(), map_size, "opened lmdb store");
        Ok(LmdbStore { env: e, dbs })
    }

    /// Execute a read-only operation
    #[inline]
    pub(crate) fn read<T, F: FnOnce(&Dbs, &RoTxn) -> Result<T>>(&self, f: F) -> Result<T> {
        f(&self.dbs, &self.env.read_txn().map_err(err)?)
    }

    /// Run multiple writes in a single transaction. Nothing is committed
    /// if `f` fails.
    #[inline]
    pub(crate) fn transact<T, F: FnOnce(&mut Tx) -> Result<T>>(&self, f: F) -> Result<T> {
        let mut tx = Tx::new(self.env.write_txn().map_err(err)?, &self.dbs);
        let r = f(&mut tx)?;
        tx.commit()?;
        Ok(r)
    }

    /// Clear all databases (for testing)
    pub fn clear(&self) -> Result<()> {
        self.transact(|tx| {
            let (t, d) = tx.parts();
            d.meta.clear(t).map_err(err)?;
            d.roles.clear(t)?;
            d.permissions.clear(t)?;
            d.users.clear(t)?;
            d.menus.clear(t)?;
            d.icons.clear(t)?;
            d.sessions.clear(t).map_err(err)?;
            d.grants.clear(t)?;
            d.role_users.clear(t).map_err(err)?;
            d.menu_children.clear(t).map_err(err)?;
            d.role_names.clear(t).map_err(err)?;
            d.permission_names.clear(t).map_err(err)?;
            d.permission_pairs.clear(t).map_err(err)?;
            d.user_emails.clear(t).map_err(err)?;
            d.icon_names.clear(t).map_err(err)
        })
    }
}

impl std::fmt::Debug for LmdbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LmdbStore").field("path", &self.env.path()).finish()
    }
}

/// Look up a unique-index entry
#[inline]
pub fn index_get(tx: &RoTxn, db: &DbU64, k: &str) -> Result<Option<u64>> {
    db.get(tx, k).map_err(err)
}

/// Decode failure for a corrupted record
pub fn corrupted(what: &str, id: u64) -> DashError {
    DashError::Codec(format!("dangling {} {}", what, id))
}

impl Store for LmdbStore {
    // Roles

    fn find_role(&self, id: Id) -> Result<Option<Role>> {
        self.read(|d, tx| d.roles.get(tx, id))
    }

    fn find_role_by_name(&self, name: &str) -> Result<Option<Role>> {
        self.read(|d, tx| read::role_by_name(d, tx, name))
    }

    fn list_roles(&self) -> Result<Vec<Role>> {
        self.read(read::sorted_roles)
    }

    fn insert_role_with_permissions(&self, role: Role, permission_ids: Option<&[Id]>) -> Result<Role> {
        self.transact(|tx| {
            let role = tx.insert_role(role)?;
            if let Some(ids) = permission_ids {
                tx.set_role_permissions(role.id, ids)?;
            }
            Ok(role)
        })
    }

    fn update_role_with_permissions(&self, role: Role, permission_ids: Option<&[Id]>) -> Result<Role> {
        self.transact(|tx| {
            let role = tx.update_role(role)?;
            if let Some(ids) = permission_ids {
                tx.set_role_permissions(role.id, ids)?;
            }
            Ok(role)
        })
    }

    fn delete_role(&self, id: Id) -> Result<bool> {
        self.transact(|tx| tx.delete_role(id))
    }

    fn set_role_permissions(&self, role_id: Id, permission_ids: &[Id]) -> Result<()> {
        self.transact(|tx| tx.set_role_permissions(role_id, permission_ids))
    }

    fn find_permissions_for_role(&self, role_id: Id) -> Result<Vec<Permission>> {
        self.read(|d, tx| read::permissions_for_role(d, tx, role_id))
    }

    fn count_users_with_role(&self, role_id: Id) -> Result<usize> {
        self.read(|d, tx| count_pfx(tx, &d.role_users, role_id))
    }

    // Permissions

    fn find_permission(&self, id: Id) -> Result<Option<Permission>> {
        self.read(|d, tx| d.permissions.get(tx, id))
    }

    fn find_permission_by_name(&self, name: &str) -> Result<Option<Permission>> {
        self.read(|d, tx| read::permission_by_name(d, tx, name))
    }

    fn find_permission_by_pair(&self, module: &str, action: &str) -> Result<Option<Permission>> {
        self.read(|d, tx| read::permission_by_pair(d, tx, module, action))
    }

    fn list_permissions(&self) -> Result<Vec<Permission>> {
        self.read(read::sorted_permissions)
    }

    fn insert_permission(&self, permission: Permission) -> Result<Permission> {
        self.transact(|tx| tx.insert_permission(permission))
    }

    fn update_permission(&self, permission: Permission) -> Result<Permission> {
        self.transact(|tx| tx.update_permission(permission))
    }

    fn delete_permission(&self, id: Id) -> Result<bool> {
        self.transact(|tx| tx.delete_permission(id))
    }

    fn count_roles_with_permission(&self, permission_id: Id) -> Result<usize> {
        self.read(|d, tx| d.grants.count_rev(tx, permission_id))
    }

    // Users

    fn find_user(&self, id: Id) -> Result<Option<User>> {
        self.read(|d, tx| d.users.get(tx, id))
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.read(|d, tx| match index_get(tx, &d.user_emails, email)? {
            Some(id) => d.users.get(tx, id)?.ok_or_else(|| corrupted("user", id)).map(Some),
            None => Ok(None),
        })
    }

    fn list_users(&self) -> Result<Vec<User>> {
        self.read(|d, tx| {
            let mut v = d.users.all(tx)?;
            v.reverse();
            Ok(v)
        })
    }

    fn insert_user(&self, user: User) -> Result<User> {
        self.transact(|tx| tx.insert_user(user))
    }

    fn update_user(&self, user: User) -> Result<User> {
        self.transact(|tx| tx.update_user(user))
    }

    fn delete_user(&self, id: Id) -> Result<bool> {
        self.transact(|tx| tx.delete_user(id))
    }

    // Menus

    fn find_menu_by_id(&self, id: Id) -> Result<Option<Menu>> {
        self.read(|d, tx| d.menus.get(tx, id))
    }

    fn find_menus_by_parent(&self, parent: Option<Id>) -> Result<Vec<Menu>> {
        self.read(|d, tx| read::menus_by_parent(d, tx, parent))
    }

    fn list_menus(&self) -> Result<Vec<Menu>> {
        self.read(read::sorted_menus)
    }

    fn insert_menu(&self, menu: Menu) -> Result<Menu> {
        self.transact(|tx| tx.insert_menu(menu))
    }

    fn update_menu(&self, menu: Menu) -> Result<Menu> {
        self.transact(|tx| tx.update_menu(menu))
    }

    fn delete_menu(&self, id: Id) -> Result<bool> {
        self.transact(|tx| tx.delete_menu(id))
    }

    // Icons

    fn find_icon(&self, id: Id) -> Result<Option<Icon>> {
        self.read(|d, tx| d.icons.get(tx, id))
    }

    fn find_icon_by_name(&self, name: &str) -> Result<Option<Icon>> {
        self.read(|d, tx| match index_get(tx, &d.icon_names, name)? {
            Some(id) => d.icons.get(tx, id)?.ok_or_else(|| corrupted("icon", id)).map(Some),
            None => Ok(None),
        })
    }

    fn list_icons(&self) -> Result<Vec<Icon>> {
        self.read(read::sorted_icons)
    }

    fn insert_icon(&self, icon: Icon) -> Result<Icon> {
        self.transact(|tx| tx.insert_icon(icon))
    }

    fn update_icon(&self, icon: Icon) -> Result<Icon> {
        self.transact(|tx| tx.update_icon(icon))
    }

    fn delete_icon(&self, id: Id) -> Result<bool> {
        self.transact(|tx| tx.delete_icon(id))
    }

    // Sessions

    fn insert_session(&self, token_hash: &str, session: SessionRecord) -> Result<()> {
        self.transact(|tx| tx.insert_session(token_hash, &session))
    }

    fn find_session(&self, token_hash: &str) -> Result<Option<SessionRecord>> {
        self.read(|d, tx| read::session(d, tx, token_hash))
    }

    fn delete_session(&self, token_hash: &str) -> Result<bool> {
        self.transact(|tx| tx.delete_session(token_hash))
    }
}
