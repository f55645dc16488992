//! Input validation
//!
//! Each check returns the normalized value (trimmed, lowercased where
//! relevant) or a `Validation` error naming the field.

use crate::constants::{
    ICON_CATEGORY_LEN, ICON_NAME_LEN, MENU_ORDER_RANGE, MENU_TITLE_LEN, MENU_URL_MAX, MODULE_LEN,
    PASSWORD_LEN, PERMISSION_NAME_LEN, ROLE_NAME_LEN, USER_NAME_LEN,
};
use crate::error::{DashError, Result};

fn length(field: &str, value: &str, (min, max): (usize, usize)) -> Result<()> {
    let n = value.chars().count();
    if n < min {
        return Err(DashError::validation(field, format!("must be at least {} characters", min)));
    }
    if n > max {
        return Err(DashError::validation(field, format!("must be at most {} characters", max)));
    }
    Ok(())
}

fn trimmed(field: &str, value: &str, bounds: (usize, usize)) -> Result<String> {
    let v = value.trim();
    length(field, v, bounds)?;
    Ok(v.to_string())
}

/// Blank optional text collapses to `None`
fn optional(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

// ============================================================================
// Menus and icons
// ============================================================================

pub fn menu_title(title: &str) -> Result<String> {
    trimmed("title", title, MENU_TITLE_LEN)
}

/// Empty, `#`, or an absolute path
pub fn menu_url(url: Option<String>) -> Result<Option<String>> {
    let Some(url) = optional(url) else { return Ok(None) };
    if url.chars().count() > MENU_URL_MAX {
        return Err(DashError::validation("url", format!("must be at most {} characters", MENU_URL_MAX)));
    }
    if url != "#" && !url.starts_with('/') {
        return Err(DashError::validation("url", "must be '#' or start with '/'"));
    }
    Ok(Some(url))
}

/// PascalCase identifier: `ChartBar`, `Users2`
fn pascal(field: &str, name: &str) -> Result<String> {
    let name = trimmed(field, name, ICON_NAME_LEN)?;
    let mut chars = name.chars();
    let ok = chars.next().is_some_and(|c| c.is_ascii_uppercase()) && chars.all(|c| c.is_ascii_alphanumeric());
    if !ok {
        return Err(DashError::validation(field, "must be a PascalCase identifier"));
    }
    Ok(name)
}

pub fn icon_name(name: &str) -> Result<String> {
    pascal("name", name)
}

pub fn menu_icon(icon: Option<String>) -> Result<Option<String>> {
    optional(icon).map(|i| pascal("icon", &i)).transpose()
}

pub fn menu_order(order: i32) -> Result<i32> {
    let (min, max) = MENU_ORDER_RANGE;
    if !(min..=max).contains(&order) {
        return Err(DashError::validation("order", format!("must be between {} and {}", min, max)));
    }
    Ok(order)
}

pub fn icon_category(category: &str) -> Result<String> {
    trimmed("category", category, ICON_CATEGORY_LEN)
}

// ============================================================================
// Roles and permissions
// ============================================================================

pub fn role_name(name: &str) -> Result<String> {
    let name = trimmed("name", name, ROLE_NAME_LEN)?;
    if !name.chars().all(|c| c.is_ascii_lowercase()) {
        return Err(DashError::validation("name", "role names are lowercase letters only"));
    }
    Ok(name)
}

pub fn permission_name(name: &str) -> Result<String> {
    trimmed("name", name, PERMISSION_NAME_LEN)
}

pub fn module(module: &str) -> Result<String> {
    trimmed("module", module, MODULE_LEN)
}

pub fn action(action: &str) -> Result<String> {
    trimmed("action", action, MODULE_LEN)
}

pub fn description(description: Option<String>) -> Option<String> {
    optional(description)
}

// ============================================================================
// Users
// ============================================================================

pub fn email(email: &str) -> Result<String> {
    let e = email.trim().to_lowercase();
    let bad = || DashError::validation("email", "must be a valid email address");
    let (local, domain) = e.split_once('@').ok_or_else(bad)?;
    let well_formed = !local.is_empty()
        && !domain.contains('@')
        && !e.chars().any(char::is_whitespace)
        && domain.split('.').count() >= 2
        && domain.split('.').all(|part| !part.is_empty());
    if !well_formed {
        return Err(bad());
    }
    Ok(e)
}

pub fn user_name(name: Option<String>) -> Result<Option<String>> {
    let Some(name) = optional(name) else { return Ok(None) };
    length("name", &name, USER_NAME_LEN)?;
    Ok(Some(name))
}

pub fn password(password: &str) -> Result<()> {
    length("password", password, PASSWORD_LEN)?;
    let lower = password.chars().any(|c| c.is_lowercase());
    let upper = password.chars().any(|c| c.is_uppercase());
    let digit = password.chars().any(|c| c.is_ascii_digit());
    if !(lower && upper && digit) {
        return Err(DashError::validation(
            "password",
            "must contain a lowercase letter, an uppercase letter and a digit",
        ));
    }
    Ok(())
}
