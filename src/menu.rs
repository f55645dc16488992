//! Menu tree model
//!
//! Depth counts from 1 at the root and never exceeds [`MAX_MENU_DEPTH`].
//! Parents are always existing nodes and the cap applies to the whole moved
//! subtree, so a menu can never be re-parented under its own descendant:
//! that placement would always exceed the cap.

use std::collections::HashMap;

use crate::constants::MAX_MENU_DEPTH;
use crate::error::{DashError, Result};
use crate::model::{Id, Menu, MenuDetail, MenuPatch, MenuSummary, NewMenu};
use crate::patch::Patch;
use crate::store::{menu_order, Store};
use crate::validate;

fn depth_exceeded() -> DashError {
    DashError::DepthExceeded { max: MAX_MENU_DEPTH }
}

fn require_menu(store: &dyn Store, id: Id) -> Result<Menu> {
    store.find_menu_by_id(id)?.ok_or_else(|| DashError::not_found(format!("menu {}", id)))
}

/// Level of `id` in the tree (root = 1)
pub fn depth(store: &dyn Store, id: Id) -> Result<usize> {
    let mut cur = require_menu(store, id)?;
    let mut d = 1;
    while let Some(pid) = cur.parent_id {
        d += 1;
        if d > MAX_MENU_DEPTH + 1 {
            // Stored chain is longer than any valid tree
            return Err(depth_exceeded());
        }
        cur = require_menu(store, pid)?;
    }
    Ok(d)
}

/// Levels in the subtree rooted at `id` (leaf = 1)
pub fn subtree_height(store: &dyn Store, id: Id) -> Result<usize> {
    fn walk(store: &dyn Store, id: Id, level: usize) -> Result<usize> {
        if level > MAX_MENU_DEPTH {
            return Ok(level);
        }
        let mut h = level;
        for child in store.find_menus_by_parent(Some(id))? {
            h = h.max(walk(store, child.id, level + 1)?);
        }
        Ok(h)
    }
    walk(store, id, 1)
}

/// Depth a node would get under `parent`, rejecting missing parents and
/// placements past the cap.
fn placement_depth(store: &dyn Store, parent: Option<Id>, height: usize) -> Result<usize> {
    let d = match parent {
        None => 1,
        Some(pid) => match depth(store, pid) {
            Ok(d) => d + 1,
            Err(DashError::NotFound(_)) => return Err(DashError::not_found(format!("parent menu {}", pid))),
            Err(e) => return Err(e),
        },
    };
    if d + height - 1 > MAX_MENU_DEPTH {
        tracing::debug!(?parent, depth = d, height, "menu placement exceeds depth");
        return Err(depth_exceeded());
    }
    Ok(d)
}

pub fn create(store: &dyn Store, input: NewMenu) -> Result<Menu> {
    let menu = Menu {
        id: 0,
        title: validate::menu_title(&input.title)?,
        url: validate::menu_url(input.url)?,
        icon: validate::menu_icon(input.icon)?,
        order: validate::menu_order(input.order)?,
        parent_id: input.parent_id,
        roles: input.roles,
        is_active: input.is_active,
        created_at: 0,
        updated_at: 0,
    };
    placement_depth(store, menu.parent_id, 1)?;
    let menu = store.insert_menu(menu)?;
    tracing::info!(id = menu.id, title = %menu.title, parent = ?menu.parent_id, "menu created");
    Ok(menu)
}

pub fn update(store: &dyn Store, id: Id, patch: MenuPatch) -> Result<Menu> {
    let mut menu = require_menu(store, id)?;
    if let Some(title) = patch.title {
        menu.title = validate::menu_title(&title)?;
    }
    match patch.url {
        Patch::Absent => {}
        Patch::Null => menu.url = None,
        Patch::Value(url) => menu.url = validate::menu_url(Some(url))?,
    }
    match patch.icon {
        Patch::Absent => {}
        Patch::Null => menu.icon = None,
        Patch::Value(icon) => menu.icon = validate::menu_icon(Some(icon))?,
    }
    if let Some(order) = patch.order {
        menu.order = validate::menu_order(order)?;
    }
    if let Some(roles) = patch.roles {
        menu.roles = roles;
    }
    if let Some(active) = patch.is_active {
        menu.is_active = active;
    }
    if let Some(parent) = patch.parent_id.as_update().map(|p| p.copied()) {
        if parent != menu.parent_id {
            if parent == Some(id) {
                return Err(DashError::SelfParent);
            }
            placement_depth(store, parent, subtree_height(store, id)?)?;
            menu.parent_id = parent;
        }
    }
    let menu = store.update_menu(menu)?;
    tracing::info!(id, parent = ?menu.parent_id, "menu updated");
    Ok(menu)
}

pub fn delete(store: &dyn Store, id: Id) -> Result<()> {
    require_menu(store, id)?;
    let children = store.find_menus_by_parent(Some(id))?.len();
    if children > 0 {
        return Err(DashError::HasChildren { count: children });
    }
    if !store.delete_menu(id)? {
        return Err(DashError::not_found(format!("menu {}", id)));
    }
    tracing::info!(id, "menu deleted");
    Ok(())
}

/// Menus grouped by parent, each group in sibling order
pub fn group_by_parent(menus: &[Menu]) -> HashMap<Option<Id>, Vec<&Menu>> {
    let mut groups: HashMap<Option<Id>, Vec<&Menu>> = HashMap::new();
    for m in menus {
        groups.entry(m.parent_id).or_default().push(m);
    }
    for group in groups.values_mut() {
        group.sort_by(|a, b| menu_order(a, b));
    }
    groups
}

/// Every menu, active or not, with parent and direct children
pub fn list_details(store: &dyn Store) -> Result<Vec<MenuDetail>> {
    let menus = store.list_menus()?;
    let by_id: HashMap<Id, &Menu> = menus.iter().map(|m| (m.id, m)).collect();
    let groups = group_by_parent(&menus);
    Ok(menus
        .iter()
        .map(|m| MenuDetail {
            menu: m.clone(),
            parent: m.parent_id.and_then(|p| by_id.get(&p)).map(|p| MenuSummary::from(*p)),
            children: groups
                .get(&Some(m.id))
                .map(|c| c.iter().map(|c| MenuSummary::from(*c)).collect())
                .unwrap_or_default(),
        })
        .collect())
}

pub fn detail(store: &dyn Store, id: Id) -> Result<MenuDetail> {
    let menu = require_menu(store, id)?;
    let parent = match menu.parent_id {
        Some(pid) => store.find_menu_by_id(pid)?.as_ref().map(MenuSummary::from),
        None => None,
    };
    let children = store.find_menus_by_parent(Some(id))?.iter().map(MenuSummary::from).collect();
    Ok(MenuDetail { menu, parent, children })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    #[test]
    fn depth_and_height() {
        let s = MemoryStore::new();
        let a = create(&s, NewMenu::new("Alpha")).unwrap();
        let b = create(&s, NewMenu::new("Beta").under(a.id)).unwrap();
        let c = create(&s, NewMenu::new("Gamma").under(b.id)).unwrap();
        assert_eq!(depth(&s, a.id).unwrap(), 1);
        assert_eq!(depth(&s, c.id).unwrap(), 3);
        assert_eq!(subtree_height(&s, a.id).unwrap(), 3);
        assert_eq!(subtree_height(&s, c.id).unwrap(), 1);
    }

    #[test]
    fn grouping_sorts_siblings() {
        let s = MemoryStore::new();
        let late = create(&s, NewMenu::new("Late").order(5)).unwrap();
        let tie1 = create(&s, NewMenu::new("Tie one").order(1)).unwrap();
        let tie2 = create(&s, NewMenu::new("Tie two").order(1)).unwrap();
        let menus = s.list_menus().unwrap();
        let roots: Vec<Id> = group_by_parent(&menus)[&None].iter().map(|m| m.id).collect();
        assert_eq!(roots, vec![tie1.id, tie2.id, late.id]);
    }
}
