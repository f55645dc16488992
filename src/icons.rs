//! Icon registry

use serde::{Deserialize, Serialize};

use crate::constants::{ICON_PAGE_LIMIT, ICON_PAGE_MAX};
use crate::error::{DashError, Result};
use crate::guards;
use crate::model::{Icon, IconPatch, Id, NewIcon};
use crate::store::Store;
use crate::validate;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct IconQuery {
    /// Case-insensitive substring over name and category
    pub search: Option<String>,
    /// 1-based
    pub page: Option<usize>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub total_pages: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IconPage {
    pub data: Vec<Icon>,
    pub pagination: Pagination,
}

/// Active icons matching the query, by category then name
pub fn search(store: &dyn Store, q: &IconQuery) -> Result<IconPage> {
    let page = q.page.unwrap_or(1).max(1);
    let limit = q.limit.unwrap_or(ICON_PAGE_LIMIT).clamp(1, ICON_PAGE_MAX);
    let needle = q.search.as_deref().map(str::trim).unwrap_or("").to_lowercase();
    let matches: Vec<Icon> = store
        .list_icons()?
        .into_iter()
        .filter(|i| i.is_active)
        .filter(|i| {
            needle.is_empty() || i.name.to_lowercase().contains(&needle) || i.category.to_lowercase().contains(&needle)
        })
        .collect();
    let total = matches.len();
    let data = matches.into_iter().skip((page - 1).saturating_mul(limit)).take(limit).collect();
    Ok(IconPage {
        data,
        pagination: Pagination { page, limit, total, total_pages: total.div_ceil(limit) },
    })
}

pub fn create(store: &dyn Store, input: NewIcon) -> Result<Icon> {
    let name = validate::icon_name(&input.name)?;
    let category = validate::icon_category(&input.category)?;
    guards::ensure_icon_name_free(store, &name, None)?;
    let icon = store.insert_icon(Icon { id: 0, name, category, is_active: input.is_active, created_at: 0, updated_at: 0 })?;
    tracing::info!(id = icon.id, name = %icon.name, "icon created");
    Ok(icon)
}

pub fn update(store: &dyn Store, id: Id, patch: IconPatch) -> Result<Icon> {
    let mut icon = store.find_icon(id)?.ok_or_else(|| DashError::not_found(format!("icon {}", id)))?;
    if let Some(name) = patch.name {
        icon.name = validate::icon_name(&name)?;
        guards::ensure_icon_name_free(store, &icon.name, Some(id))?;
    }
    if let Some(category) = patch.category {
        icon.category = validate::icon_category(&category)?;
    }
    if let Some(active) = patch.is_active {
        icon.is_active = active;
    }
    let icon = store.update_icon(icon)?;
    tracing::info!(id, "icon updated");
    Ok(icon)
}

pub fn delete(store: &dyn Store, id: Id) -> Result<()> {
    if !store.delete_icon(id)? {
        return Err(DashError::not_found(format!("icon {}", id)));
    }
    tracing::info!(id, "icon deleted");
    Ok(())
}
