//! Write transaction wrapper
//!
//! Every constraint check runs inside the same LMDB write transaction as the
//! write it protects. LMDB serializes writers, so the checks cannot race.

use heed::RwTxn;

use crate::constants::MAX_MENU_DEPTH;
use crate::db::{count_pfx, index_get, key, list_pfx, pair_key, DbU64, Dbs, ROOT};
use crate::error::{err, DashError, Result};
use crate::model::{now_millis, Icon, Id, Menu, Permission, Role, SessionRecord, User};
use crate::store::{
    check_menu_placement, email_taken, icon_taken, permission_in_use, permission_name_taken,
    permission_pair_taken, role_in_use, role_taken,
};

pub struct Tx<'a> {
    txn: RwTxn<'a>,
    dbs: &'a Dbs,
}

impl<'a> Tx<'a> {
    #[inline]
    pub(crate) fn new(txn: RwTxn<'a>, dbs: &'a Dbs) -> Self {
        Tx { txn, dbs }
    }

    #[inline]
    pub(crate) fn parts(&mut self) -> (&mut RwTxn<'a>, &'a Dbs) {
        (&mut self.txn, self.dbs)
    }

    #[inline]
    pub(crate) fn commit(self) -> Result<()> {
        self.txn.commit().map_err(err)
    }

    pub(crate) fn next_id(&mut self) -> Result<Id> {
        let id = self.dbs.meta
            .get(&self.txn, "next_id")
            .map_err(err)?
            .and_then(|s| s.parse().ok())
            .unwrap_or(1u64);
        self.dbs.meta.put(&mut self.txn, "next_id", &(id + 1).to_string()).map_err(err)?;
        Ok(id)
    }

    /// Point a unique index entry at `id`, failing if it names another row
    fn claim(&mut self, index: &DbU64, k: &str, id: Id, taken: impl FnOnce() -> DashError) -> Result<()> {
        match index_get(&self.txn, index, k)? {
            Some(owner) if owner != id => Err(taken()),
            _ => index.put(&mut self.txn, k, &id).map_err(err),
        }
    }

    fn release(&mut self, index: &DbU64, k: &str) -> Result<()> {
        index.delete(&mut self.txn, k).map_err(err).map(|_| ())
    }

    // ------------------------------------------------------------------------
    // Roles
    // ------------------------------------------------------------------------

    pub fn insert_role(&mut self, mut role: Role) -> Result<Role> {
        let d = self.dbs;
        role.id = self.next_id()?;
        role.created_at = now_millis();
        role.updated_at = role.created_at;
        self.claim(&d.role_names, &role.name, role.id, || role_taken(&role.name))?;
        d.roles.put(&mut self.txn, role.id, &role)?;
        Ok(role)
    }

    pub fn update_role(&mut self, mut role: Role) -> Result<Role> {
        let d = self.dbs;
        let old = d.roles.get(&self.txn, role.id)?.ok_or_else(|| DashError::not_found(format!("role {}", role.id)))?;
        if old.name != role.name {
            self.claim(&d.role_names, &role.name, role.id, || role_taken(&role.name))?;
            self.release(&d.role_names, &old.name)?;
        }
        role.created_at = old.created_at;
        role.updated_at = now_millis();
        d.roles.put(&mut self.txn, role.id, &role)?;
        Ok(role)
    }

    pub fn delete_role(&mut self, id: Id) -> Result<bool> {
        let d = self.dbs;
        let Some(role) = d.roles.get(&self.txn, id)? else { return Ok(false) };
        let users = count_pfx(&self.txn, &d.role_users, id)?;
        if users > 0 {
            return Err(role_in_use(&role.name, users));
        }
        for p in d.grants.list_fwd(&self.txn, id)? {
            d.grants.del(&mut self.txn, id, p)?;
        }
        self.release(&d.role_names, &role.name)?;
        d.roles.del(&mut self.txn, id)
    }

    pub fn set_role_permissions(&mut self, role_id: Id, permission_ids: &[Id]) -> Result<()> {
        let d = self.dbs;
        if d.roles.get(&self.txn, role_id)?.is_none() {
            return Err(DashError::not_found(format!("role {}", role_id)));
        }
        for &p in permission_ids {
            if d.permissions.get(&self.txn, p)?.is_none() {
                return Err(DashError::not_found(format!("permission {}", p)));
            }
        }
        for p in d.grants.list_fwd(&self.txn, role_id)? {
            d.grants.del(&mut self.txn, role_id, p)?;
        }
        for &p in permission_ids {
            d.grants.put(&mut self.txn, role_id, p)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Permissions
    // ------------------------------------------------------------------------

    pub fn insert_permission(&mut self, mut p: Permission) -> Result<Permission> {
        let d = self.dbs;
        let pair = pair_key(&p.module, &p.action);
        p.id = self.next_id()?;
        p.created_at = now_millis();
        p.updated_at = p.created_at;
        self.claim(&d.permission_names, &p.name, p.id, || permission_name_taken(&p.name))?;
        self.claim(&d.permission_pairs, &pair, p.id, || permission_pair_taken(&p.module, &p.action))?;
        d.permissions.put(&mut self.txn, p.id, &p)?;
        Ok(p)
    }

    pub fn update_permission(&mut self, mut p: Permission) -> Result<Permission> {
        let d = self.dbs;
        let old = d.permissions.get(&self.txn, p.id)?.ok_or_else(|| DashError::not_found(format!("permission {}", p.id)))?;
        if old.name != p.name {
            self.claim(&d.permission_names, &p.name, p.id, || permission_name_taken(&p.name))?;
            self.release(&d.permission_names, &old.name)?;
        }
        let (old_pair, pair) = (pair_key(&old.module, &old.action), pair_key(&p.module, &p.action));
        if old_pair != pair {
            self.claim(&d.permission_pairs, &pair, p.id, || permission_pair_taken(&p.module, &p.action))?;
            self.release(&d.permission_pairs, &old_pair)?;
        }
        p.created_at = old.created_at;
        p.updated_at = now_millis();
        d.permissions.put(&mut self.txn, p.id, &p)?;
        Ok(p)
    }

    pub fn delete_permission(&mut self, id: Id) -> Result<bool> {
        let d = self.dbs;
        let Some(p) = d.permissions.get(&self.txn, id)? else { return Ok(false) };
        let roles = d.grants.count_rev(&self.txn, id)?;
        if roles > 0 {
            return Err(permission_in_use(&p.name, roles));
        }
        self.release(&d.permission_names, &p.name)?;
        self.release(&d.permission_pairs, &pair_key(&p.module, &p.action))?;
        d.permissions.del(&mut self.txn, id)
    }

    // ------------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------------

    fn check_role_ref(&mut self, role_id: Option<Id>) -> Result<()> {
        if let Some(rid) = role_id {
            if self.dbs.roles.get(&self.txn, rid)?.is_none() {
                return Err(DashError::not_found(format!("role {}", rid)));
            }
        }
        Ok(())
    }

    pub fn insert_user(&mut self, mut u: User) -> Result<User> {
        let d = self.dbs;
        u.id = self.next_id()?;
        self.claim(&d.user_emails, &u.email, u.id, || email_taken(&u.email))?;
        self.check_role_ref(u.role_id)?;
        u.created_at = now_millis();
        u.updated_at = u.created_at;
        if let Some(rid) = u.role_id {
            d.role_users.put(&mut self.txn, &key(rid, u.id), &1).map_err(err)?;
        }
        d.users.put(&mut self.txn, u.id, &u)?;
        Ok(u)
    }

    pub fn update_user(&mut self, mut u: User) -> Result<User> {
        let d = self.dbs;
        let old = d.users.get(&self.txn, u.id)?.ok_or_else(|| DashError::not_found(format!("user {}", u.id)))?;
        if old.email != u.email {
            self.claim(&d.user_emails, &u.email, u.id, || email_taken(&u.email))?;
            self.release(&d.user_emails, &old.email)?;
        }
        if old.role_id != u.role_id {
            self.check_role_ref(u.role_id)?;
            if let Some(rid) = old.role_id {
                d.role_users.delete(&mut self.txn, &key(rid, u.id)).map_err(err)?;
            }
            if let Some(rid) = u.role_id {
                d.role_users.put(&mut self.txn, &key(rid, u.id), &1).map_err(err)?;
            }
        }
        u.created_at = old.created_at;
        u.updated_at = now_millis();
        d.users.put(&mut self.txn, u.id, &u)?;
        Ok(u)
    }

    pub fn delete_user(&mut self, id: Id) -> Result<bool> {
        let d = self.dbs;
        let Some(u) = d.users.get(&self.txn, id)? else { return Ok(false) };
        if let Some(rid) = u.role_id {
            d.role_users.delete(&mut self.txn, &key(rid, id)).map_err(err)?;
        }
        self.release(&d.user_emails, &u.email)?;
        let mut stale = Vec::new();
        for item in d.sessions.iter(&self.txn).map_err(err)? {
            let (k, bytes) = item.map_err(err)?;
            let s: SessionRecord = serde_json::from_slice(bytes)?;
            if s.user_id == id {
                stale.push(k.to_string());
            }
        }
        for k in stale {
            d.sessions.delete(&mut self.txn, &k).map_err(err)?;
        }
        d.users.del(&mut self.txn, id)
    }

    // ------------------------------------------------------------------------
    // Menus
    // ------------------------------------------------------------------------

    fn check_parent(&mut self, parent: Option<Id>) -> Result<()> {
        if let Some(pid) = parent {
            if self.dbs.menus.get(&self.txn, pid)?.is_none() {
                return Err(DashError::not_found(format!("parent menu {}", pid)));
            }
        }
        Ok(())
    }

    /// Level of a stored menu (root = 1), stopping one past the cap
    fn menu_depth(&self, id: Id) -> Result<usize> {
        let d = self.dbs;
        let mut level = 1;
        let mut cur = d.menus.get(&self.txn, id)?;
        while let Some(pid) = cur.as_ref().and_then(|m| m.parent_id) {
            level += 1;
            if level > MAX_MENU_DEPTH {
                break;
            }
            cur = d.menus.get(&self.txn, pid)?;
        }
        Ok(level)
    }

    /// Levels below and including `id`, walked through `menu_children`
    fn menu_height(&self, id: Id, level: usize) -> Result<usize> {
        if level > MAX_MENU_DEPTH {
            return Ok(level);
        }
        let mut h = level;
        for child in list_pfx(&self.txn, &self.dbs.menu_children, id)? {
            h = h.max(self.menu_height(child, level + 1)?);
        }
        Ok(h)
    }

    fn parent_depth(&self, parent: Option<Id>) -> Result<Option<usize>> {
        parent.map(|pid| self.menu_depth(pid)).transpose()
    }

    pub fn insert_menu(&mut self, mut m: Menu) -> Result<Menu> {
        let d = self.dbs;
        self.check_parent(m.parent_id)?;
        check_menu_placement(self.parent_depth(m.parent_id)?, 1)?;
        m.id = self.next_id()?;
        m.created_at = now_millis();
        m.updated_at = m.created_at;
        d.menu_children.put(&mut self.txn, &key(m.parent_id.unwrap_or(ROOT), m.id), &1).map_err(err)?;
        d.menus.put(&mut self.txn, m.id, &m)?;
        Ok(m)
    }

    pub fn update_menu(&mut self, mut m: Menu) -> Result<Menu> {
        let d = self.dbs;
        let old = d.menus.get(&self.txn, m.id)?.ok_or_else(|| DashError::not_found(format!("menu {}", m.id)))?;
        if old.parent_id != m.parent_id {
            if m.parent_id == Some(m.id) {
                return Err(DashError::SelfParent);
            }
            self.check_parent(m.parent_id)?;
            check_menu_placement(self.parent_depth(m.parent_id)?, self.menu_height(m.id, 1)?)?;
            d.menu_children.delete(&mut self.txn, &key(old.parent_id.unwrap_or(ROOT), m.id)).map_err(err)?;
            d.menu_children.put(&mut self.txn, &key(m.parent_id.unwrap_or(ROOT), m.id), &1).map_err(err)?;
        }
        m.created_at = old.created_at;
        m.updated_at = now_millis();
        d.menus.put(&mut self.txn, m.id, &m)?;
        Ok(m)
    }

    pub fn delete_menu(&mut self, id: Id) -> Result<bool> {
        let d = self.dbs;
        let Some(m) = d.menus.get(&self.txn, id)? else { return Ok(false) };
        let children = count_pfx(&self.txn, &d.menu_children, id)?;
        if children > 0 {
            return Err(DashError::HasChildren { count: children });
        }
        d.menu_children.delete(&mut self.txn, &key(m.parent_id.unwrap_or(ROOT), id)).map_err(err)?;
        d.menus.del(&mut self.txn, id)
    }

    // ------------------------------------------------------------------------
    // Icons
    // ------------------------------------------------------------------------

    pub fn insert_icon(&mut self, mut i: Icon) -> Result<Icon> {
        let d = self.dbs;
        i.id = self.next_id()?;
        i.created_at = now_millis();
        i.updated_at = i.created_at;
        self.claim(&d.icon_names, &i.name, i.id, || icon_taken(&i.name))?;
        d.icons.put(&mut self.txn, i.id, &i)?;
        Ok(i)
    }

    pub fn update_icon(&mut self, mut i: Icon) -> Result<Icon> {
        let d = self.dbs;
        let old = d.icons.get(&self.txn, i.id)?.ok_or_else(|| DashError::not_found(format!("icon {}", i.id)))?;
        if old.name != i.name {
            self.claim(&d.icon_names, &i.name, i.id, || icon_taken(&i.name))?;
            self.release(&d.icon_names, &old.name)?;
        }
        i.created_at = old.created_at;
        i.updated_at = now_millis();
        d.icons.put(&mut self.txn, i.id, &i)?;
        Ok(i)
    }

    pub fn delete_icon(&mut self, id: Id) -> Result<bool> {
        let d = self.dbs;
        let Some(i) = d.icons.get(&self.txn, id)? else { return Ok(false) };
        self.release(&d.icon_names, &i.name)?;
        d.icons.del(&mut self.txn, id)
    }

    // ------------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------------

    pub fn insert_session(&mut self, token_hash: &str, s: &SessionRecord) -> Result<()> {
        let bytes = serde_json::to_vec(s)?;
        self.dbs.sessions.put(&mut self.txn, token_hash, &bytes).map_err(err)
    }

    pub fn delete_session(&mut self, token_hash: &str) -> Result<bool> {
        self.dbs.sessions.delete(&mut self.txn, token_hash).map_err(err)
    }
}
