//! In-memory store
//!
//! Same constraints as the LMDB backend, checked under a single write lock.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use parking_lot::RwLock;

use crate::constants::MAX_MENU_DEPTH;
use crate::error::{DashError, Result};
use crate::model::{now_millis, Icon, Id, Menu, Permission, Role, SessionRecord, User};
use crate::store::{
    check_menu_placement, email_taken, icon_taken, menu_order, permission_in_use,
    permission_name_taken, permission_pair_taken, role_in_use, role_taken, Store,
};

#[derive(Default)]
struct Tables {
    next_id: Id,
    roles: BTreeMap<Id, Role>,
    permissions: BTreeMap<Id, Permission>,
    /// (role_id, permission_id)
    grants: BTreeSet<(Id, Id)>,
    users: BTreeMap<Id, User>,
    menus: BTreeMap<Id, Menu>,
    icons: BTreeMap<Id, Icon>,
    sessions: HashMap<String, SessionRecord>,
}

impl Tables {
    fn issue_id(&mut self) -> Id {
        self.next_id += 1;
        self.next_id
    }

    fn users_with_role(&self, role_id: Id) -> usize {
        self.users.values().filter(|u| u.role_id == Some(role_id)).count()
    }

    fn roles_with_permission(&self, permission_id: Id) -> usize {
        self.grants.iter().filter(|(_, p)| *p == permission_id).count()
    }

    fn check_permission_ids(&self, ids: &[Id]) -> Result<()> {
        match ids.iter().find(|p| !self.permissions.contains_key(*p)) {
            Some(missing) => Err(DashError::not_found(format!("permission {}", missing))),
            None => Ok(()),
        }
    }

    fn replace_grants(&mut self, role_id: Id, ids: &[Id]) {
        self.grants.retain(|(r, _)| *r != role_id);
        for &p in ids {
            self.grants.insert((role_id, p));
        }
    }

    fn check_permission_unique(&self, p: &Permission) -> Result<()> {
        for other in self.permissions.values().filter(|o| o.id != p.id) {
            if other.name == p.name {
                return Err(permission_name_taken(&p.name));
            }
            if other.module == p.module && other.action == p.action {
                return Err(permission_pair_taken(&p.module, &p.action));
            }
        }
        Ok(())
    }

    fn check_user(&self, u: &User) -> Result<()> {
        if self.users.values().any(|o| o.id != u.id && o.email == u.email) {
            return Err(email_taken(&u.email));
        }
        if let Some(rid) = u.role_id {
            if !self.roles.contains_key(&rid) {
                return Err(DashError::not_found(format!("role {}", rid)));
            }
        }
        Ok(())
    }

    fn menu_depth(&self, id: Id) -> usize {
        let mut level = 1;
        let mut cur = self.menus.get(&id);
        while let Some(pid) = cur.and_then(|m| m.parent_id) {
            level += 1;
            if level > MAX_MENU_DEPTH {
                break;
            }
            cur = self.menus.get(&pid);
        }
        level
    }

    fn menu_height(&self, id: Id, level: usize) -> usize {
        if level > MAX_MENU_DEPTH {
            return level;
        }
        self.menus
            .values()
            .filter(|m| m.parent_id == Some(id))
            .map(|m| self.menu_height(m.id, level + 1))
            .fold(level, usize::max)
    }

    fn check_parent(&self, parent: Option<Id>) -> Result<Option<usize>> {
        match parent {
            None => Ok(None),
            Some(pid) if self.menus.contains_key(&pid) => Ok(Some(self.menu_depth(pid))),
            Some(pid) => Err(DashError::not_found(format!("parent menu {}", pid))),
        }
    }

    fn sorted_menus<'a>(&self, it: impl Iterator<Item = &'a Menu>) -> Vec<Menu> {
        let mut v: Vec<Menu> = it.cloned().collect();
        v.sort_by(menu_order);
        v
    }
}

/// Store backed by process memory. Cheap to create, nothing persists.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemoryStore {
    // Roles

    fn find_role(&self, id: Id) -> Result<Option<Role>> {
        Ok(self.tables.read().roles.get(&id).cloned())
    }

    fn find_role_by_name(&self, name: &str) -> Result<Option<Role>> {
        Ok(self.tables.read().roles.values().find(|r| r.name == name).cloned())
    }

    fn list_roles(&self) -> Result<Vec<Role>> {
        let mut v: Vec<Role> = self.tables.read().roles.values().cloned().collect();
        v.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(v)
    }

    fn insert_role_with_permissions(&self, mut role: Role, permission_ids: Option<&[Id]>) -> Result<Role> {
        let mut t = self.tables.write();
        if t.roles.values().any(|r| r.name == role.name) {
            return Err(role_taken(&role.name));
        }
        if let Some(ids) = permission_ids {
            t.check_permission_ids(ids)?;
        }
        role.id = t.issue_id();
        role.created_at = now_millis();
        role.updated_at = role.created_at;
        t.roles.insert(role.id, role.clone());
        if let Some(ids) = permission_ids {
            t.replace_grants(role.id, ids);
        }
        Ok(role)
    }

    fn update_role_with_permissions(&self, mut role: Role, permission_ids: Option<&[Id]>) -> Result<Role> {
        let mut t = self.tables.write();
        let existing = t.roles.get(&role.id).ok_or_else(|| DashError::not_found(format!("role {}", role.id)))?;
        role.created_at = existing.created_at;
        if t.roles.values().any(|r| r.id != role.id && r.name == role.name) {
            return Err(role_taken(&role.name));
        }
        if let Some(ids) = permission_ids {
            t.check_permission_ids(ids)?;
        }
        role.updated_at = now_millis();
        t.roles.insert(role.id, role.clone());
        if let Some(ids) = permission_ids {
            t.replace_grants(role.id, ids);
        }
        Ok(role)
    }

    fn delete_role(&self, id: Id) -> Result<bool> {
        let mut t = self.tables.write();
        let Some(role) = t.roles.get(&id) else { return Ok(false) };
        let users = t.users_with_role(id);
        if users > 0 {
            return Err(role_in_use(&role.name, users));
        }
        t.roles.remove(&id);
        t.grants.retain(|(r, _)| *r != id);
        Ok(true)
    }

    fn set_role_permissions(&self, role_id: Id, permission_ids: &[Id]) -> Result<()> {
        let mut t = self.tables.write();
        if !t.roles.contains_key(&role_id) {
            return Err(DashError::not_found(format!("role {}", role_id)));
        }
        t.check_permission_ids(permission_ids)?;
        t.replace_grants(role_id, permission_ids);
        Ok(())
    }

    fn find_permissions_for_role(&self, role_id: Id) -> Result<Vec<Permission>> {
        let t = self.tables.read();
        Ok(t.grants
            .range((role_id, 0)..=(role_id, Id::MAX))
            .filter_map(|(_, p)| t.permissions.get(p).cloned())
            .collect())
    }

    fn count_users_with_role(&self, role_id: Id) -> Result<usize> {
        Ok(self.tables.read().users_with_role(role_id))
    }

    // Permissions

    fn find_permission(&self, id: Id) -> Result<Option<Permission>> {
        Ok(self.tables.read().permissions.get(&id).cloned())
    }

    fn find_permission_by_name(&self, name: &str) -> Result<Option<Permission>> {
        Ok(self.tables.read().permissions.values().find(|p| p.name == name).cloned())
    }

    fn find_permission_by_pair(&self, module: &str, action: &str) -> Result<Option<Permission>> {
        Ok(self
            .tables
            .read()
            .permissions
            .values()
            .find(|p| p.module == module && p.action == action)
            .cloned())
    }

    fn list_permissions(&self) -> Result<Vec<Permission>> {
        let mut v: Vec<Permission> = self.tables.read().permissions.values().cloned().collect();
        v.sort_by(|a, b| (&a.module, &a.action).cmp(&(&b.module, &b.action)));
        Ok(v)
    }

    fn insert_permission(&self, mut permission: Permission) -> Result<Permission> {
        let mut t = self.tables.write();
        permission.id = 0;
        t.check_permission_unique(&permission)?;
        permission.id = t.issue_id();
        permission.created_at = now_millis();
        permission.updated_at = permission.created_at;
        t.permissions.insert(permission.id, permission.clone());
        Ok(permission)
    }

    fn update_permission(&self, mut permission: Permission) -> Result<Permission> {
        let mut t = self.tables.write();
        let existing = t
            .permissions
            .get(&permission.id)
            .ok_or_else(|| DashError::not_found(format!("permission {}", permission.id)))?;
        permission.created_at = existing.created_at;
        t.check_permission_unique(&permission)?;
        permission.updated_at = now_millis();
        t.permissions.insert(permission.id, permission.clone());
        Ok(permission)
    }

    fn delete_permission(&self, id: Id) -> Result<bool> {
        let mut t = self.tables.write();
        let Some(p) = t.permissions.get(&id) else { return Ok(false) };
        let roles = t.roles_with_permission(id);
        if roles > 0 {
            return Err(permission_in_use(&p.name, roles));
        }
        t.permissions.remove(&id);
        Ok(true)
    }

    fn count_roles_with_permission(&self, permission_id: Id) -> Result<usize> {
        Ok(self.tables.read().roles_with_permission(permission_id))
    }

    // Users

    fn find_user(&self, id: Id) -> Result<Option<User>> {
        Ok(self.tables.read().users.get(&id).cloned())
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.tables.read().users.values().find(|u| u.email == email).cloned())
    }

    fn list_users(&self) -> Result<Vec<User>> {
        Ok(self.tables.read().users.values().rev().cloned().collect())
    }

    fn insert_user(&self, mut user: User) -> Result<User> {
        let mut t = self.tables.write();
        user.id = 0;
        t.check_user(&user)?;
        user.id = t.issue_id();
        user.created_at = now_millis();
        user.updated_at = user.created_at;
        t.users.insert(user.id, user.clone());
        Ok(user)
    }

    fn update_user(&self, mut user: User) -> Result<User> {
        let mut t = self.tables.write();
        let existing = t.users.get(&user.id).ok_or_else(|| DashError::not_found(format!("user {}", user.id)))?;
        user.created_at = existing.created_at;
        t.check_user(&user)?;
        user.updated_at = now_millis();
        t.users.insert(user.id, user.clone());
        Ok(user)
    }

    fn delete_user(&self, id: Id) -> Result<bool> {
        let mut t = self.tables.write();
        let removed = t.users.remove(&id).is_some();
        if removed {
            t.sessions.retain(|_, s| s.user_id != id);
        }
        Ok(removed)
    }

    // Menus

    fn find_menu_by_id(&self, id: Id) -> Result<Option<Menu>> {
        Ok(self.tables.read().menus.get(&id).cloned())
    }

    fn find_menus_by_parent(&self, parent: Option<Id>) -> Result<Vec<Menu>> {
        let t = self.tables.read();
        Ok(t.sorted_menus(t.menus.values().filter(|m| m.parent_id == parent)))
    }

    fn list_menus(&self) -> Result<Vec<Menu>> {
        let t = self.tables.read();
        Ok(t.sorted_menus(t.menus.values()))
    }

    fn insert_menu(&self, mut menu: Menu) -> Result<Menu> {
        let mut t = self.tables.write();
        check_menu_placement(t.check_parent(menu.parent_id)?, 1)?;
        menu.id = t.issue_id();
        menu.created_at = now_millis();
        menu.updated_at = menu.created_at;
        t.menus.insert(menu.id, menu.clone());
        Ok(menu)
    }

    fn update_menu(&self, mut menu: Menu) -> Result<Menu> {
        let mut t = self.tables.write();
        let existing = t.menus.get(&menu.id).ok_or_else(|| DashError::not_found(format!("menu {}", menu.id)))?;
        menu.created_at = existing.created_at;
        if existing.parent_id != menu.parent_id {
            if menu.parent_id == Some(menu.id) {
                return Err(DashError::SelfParent);
            }
            let parent_depth = t.check_parent(menu.parent_id)?;
            check_menu_placement(parent_depth, t.menu_height(menu.id, 1))?;
        }
        menu.updated_at = now_millis();
        t.menus.insert(menu.id, menu.clone());
        Ok(menu)
    }

    fn delete_menu(&self, id: Id) -> Result<bool> {
        let mut t = self.tables.write();
        if !t.menus.contains_key(&id) {
            return Ok(false);
        }
        let children = t.menus.values().filter(|m| m.parent_id == Some(id)).count();
        if children > 0 {
            return Err(DashError::HasChildren { count: children });
        }
        t.menus.remove(&id);
        Ok(true)
    }

    // Icons

    fn find_icon(&self, id: Id) -> Result<Option<Icon>> {
        Ok(self.tables.read().icons.get(&id).cloned())
    }

    fn find_icon_by_name(&self, name: &str) -> Result<Option<Icon>> {
        Ok(self.tables.read().icons.values().find(|i| i.name == name).cloned())
    }

    fn list_icons(&self) -> Result<Vec<Icon>> {
        let mut v: Vec<Icon> = self.tables.read().icons.values().cloned().collect();
        v.sort_by(|a, b| (&a.category, &a.name).cmp(&(&b.category, &b.name)));
        Ok(v)
    }

    fn insert_icon(&self, mut icon: Icon) -> Result<Icon> {
        let mut t = self.tables.write();
        if t.icons.values().any(|i| i.name == icon.name) {
            return Err(icon_taken(&icon.name));
        }
        icon.id = t.issue_id();
        icon.created_at = now_millis();
        icon.updated_at = icon.created_at;
        t.icons.insert(icon.id, icon.clone());
        Ok(icon)
    }

    fn update_icon(&self, mut icon: Icon) -> Result<Icon> {
        let mut t = self.tables.write();
        let existing = t.icons.get(&icon.id).ok_or_else(|| DashError::not_found(format!("icon {}", icon.id)))?;
        icon.created_at = existing.created_at;
        if t.icons.values().any(|i| i.id != icon.id && i.name == icon.name) {
            return Err(icon_taken(&icon.name));
        }
        icon.updated_at = now_millis();
        t.icons.insert(icon.id, icon.clone());
        Ok(icon)
    }

    fn delete_icon(&self, id: Id) -> Result<bool> {
        Ok(self.tables.write().icons.remove(&id).is_some())
    }

    // Sessions

    fn insert_session(&self, token_hash: &str, session: SessionRecord) -> Result<()> {
        self.tables.write().sessions.insert(token_hash.to_string(), session);
        Ok(())
    }

    fn find_session(&self, token_hash: &str) -> Result<Option<SessionRecord>> {
        Ok(self.tables.read().sessions.get(token_hash).cloned())
    }

    fn delete_session(&self, token_hash: &str) -> Result<bool> {
        Ok(self.tables.write().sessions.remove(token_hash).is_some())
    }
}
