//! Menu visibility filter: a role's navigation tree

use std::collections::HashMap;

use serde::Serialize;

use crate::constants::{required_module, MAX_MENU_DEPTH, READ};
use crate::error::Result;
use crate::evaluator::{is_admin, PermissionSet};
use crate::menu::group_by_parent;
use crate::model::{Id, Menu};
use crate::store::Store;

/// Navigation node. `items` is always present, empty for leaves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuNode {
    pub id: Id,
    pub title: String,
    pub url: Option<String>,
    pub icon: Option<String>,
    pub order: i32,
    pub items: Vec<MenuNode>,
}

/// Whether a single menu passes for `role`, ignoring its ancestors
pub fn is_visible(role: Option<&str>, grants: &PermissionSet, menu: &Menu) -> bool {
    if !menu.is_active {
        return false;
    }
    let Some(role) = role else { return false };
    if is_admin(role) {
        return true;
    }
    if !menu.roles.contains(role) {
        return false;
    }
    match required_module(&menu.title) {
        Some(module) => grants.allows(module, READ),
        None => true,
    }
}

/// Visible menus for `role` as a nested tree, at most three levels deep.
/// A hidden node hides its whole subtree. Deterministic for fixed inputs.
pub fn visible_menu_tree(role: Option<&str>, grants: &PermissionSet, menus: &[Menu]) -> Vec<MenuNode> {
    let groups = group_by_parent(menus);
    level(&groups, role, grants, None, 1)
}

fn level(
    groups: &HashMap<Option<Id>, Vec<&Menu>>,
    role: Option<&str>,
    grants: &PermissionSet,
    parent: Option<Id>,
    depth: usize,
) -> Vec<MenuNode> {
    let Some(siblings) = groups.get(&parent) else { return Vec::new() };
    if depth > MAX_MENU_DEPTH {
        return Vec::new();
    }
    siblings
        .iter()
        .filter(|m| is_visible(role, grants, m))
        .map(|m| MenuNode {
            id: m.id,
            title: m.title.clone(),
            url: m.url.clone(),
            icon: m.icon.clone(),
            order: m.order,
            items: level(groups, role, grants, Some(m.id), depth + 1),
        })
        .collect()
}

/// Load the role's grants and every active menu, then filter
pub fn visible_menu_tree_for(store: &dyn Store, role: Option<&str>) -> Result<Vec<MenuNode>> {
    let grants = PermissionSet::load(store, role)?;
    let menus = store.find_all_active_menus()?;
    Ok(visible_menu_tree(role, &grants, &menus))
}
