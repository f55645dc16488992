//! Read operations (no permission checks, direct LMDB access)

use heed::RoTxn;

use crate::db::{corrupted, index_get, list_pfx, pair_key, Dbs, ROOT};
use crate::error::{err, Result};
use crate::model::{Icon, Id, Menu, Permission, Role, SessionRecord};
use crate::store::menu_order;

pub(crate) fn role_by_name(d: &Dbs, tx: &RoTxn, name: &str) -> Result<Option<Role>> {
    match index_get(tx, &d.role_names, name)? {
        Some(id) => d.roles.get(tx, id)?.ok_or_else(|| corrupted("role", id)).map(Some),
        None => Ok(None),
    }
}

pub(crate) fn permission_by_name(d: &Dbs, tx: &RoTxn, name: &str) -> Result<Option<Permission>> {
    match index_get(tx, &d.permission_names, name)? {
        Some(id) => d.permissions.get(tx, id)?.ok_or_else(|| corrupted("permission", id)).map(Some),
        None => Ok(None),
    }
}

pub(crate) fn permission_by_pair(d: &Dbs, tx: &RoTxn, module: &str, action: &str) -> Result<Option<Permission>> {
    match index_get(tx, &d.permission_pairs, &pair_key(module, action))? {
        Some(id) => d.permissions.get(tx, id)?.ok_or_else(|| corrupted("permission", id)).map(Some),
        None => Ok(None),
    }
}

/// Permissions granted to a role, in grant-key order
pub(crate) fn permissions_for_role(d: &Dbs, tx: &RoTxn, role_id: Id) -> Result<Vec<Permission>> {
    let mut r = Vec::new();
    for pid in d.grants.list_fwd(tx, role_id)? {
        r.push(d.permissions.get(tx, pid)?.ok_or_else(|| corrupted("permission", pid))?);
    }
    Ok(r)
}

pub(crate) fn menus_by_parent(d: &Dbs, tx: &RoTxn, parent: Option<Id>) -> Result<Vec<Menu>> {
    let mut r = Vec::new();
    for id in list_pfx(tx, &d.menu_children, parent.unwrap_or(ROOT))? {
        r.push(d.menus.get(tx, id)?.ok_or_else(|| corrupted("menu", id))?);
    }
    r.sort_by(menu_order);
    Ok(r)
}

pub(crate) fn sorted_roles(d: &Dbs, tx: &RoTxn) -> Result<Vec<Role>> {
    let mut v = d.roles.all(tx)?;
    v.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(v)
}

pub(crate) fn sorted_permissions(d: &Dbs, tx: &RoTxn) -> Result<Vec<Permission>> {
    let mut v = d.permissions.all(tx)?;
    v.sort_by(|a, b| (&a.module, &a.action).cmp(&(&b.module, &b.action)));
    Ok(v)
}

pub(crate) fn sorted_menus(d: &Dbs, tx: &RoTxn) -> Result<Vec<Menu>> {
    let mut v = d.menus.all(tx)?;
    v.sort_by(menu_order);
    Ok(v)
}

pub(crate) fn sorted_icons(d: &Dbs, tx: &RoTxn) -> Result<Vec<Icon>> {
    let mut v = d.icons.all(tx)?;
    v.sort_by(|a, b| (&a.category, &a.name).cmp(&(&b.category, &b.name)));
    Ok(v)
}

pub(crate) fn session(d: &Dbs, tx: &RoTxn, token_hash: &str) -> Result<Option<SessionRecord>> {
    match d.sessions.get(tx, token_hash).map_err(err)? {
        Some(bytes) => Ok(Some(serde_json::from_slice(bytes)?)),
        None => Ok(None),
    }
}
