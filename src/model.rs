//! Stored records and the inputs that create or patch them

use serde::{Deserialize, Serialize};

use crate::constants::DEFAULT_ICON_CATEGORY;
use crate::patch::Patch;
use crate::role_set::RoleSet;

/// Store-assigned identifier. `0` is never issued.
pub type Id = u64;

/// Milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// ============================================================================
// Records
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub id: Id,
    pub name: String,
    pub description: Option<String>,
    pub module: String,
    pub action: String,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: Id,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// User row. `password_hash` is only ever a hash produced by a
/// [`CredentialHasher`](crate::auth::CredentialHasher).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Id,
    pub email: String,
    pub name: Option<String>,
    pub password_hash: String,
    pub role_id: Option<Id>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Menu {
    pub id: Id,
    pub title: String,
    pub url: Option<String>,
    pub icon: Option<String>,
    pub order: i32,
    pub parent_id: Option<Id>,
    pub roles: RoleSet,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Icon {
    pub id: Id,
    pub name: String,
    pub category: String,
    pub is_active: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Stored under the SHA-256 of the session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub user_id: Id,
    pub created_at: i64,
    /// `None` = never expires
    pub expires_at: Option<i64>,
}

// ============================================================================
// Views
// ============================================================================

/// User without its credential
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: Id,
    pub email: String,
    pub name: Option<String>,
    pub role_id: Option<Id>,
    pub role: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl UserView {
    pub fn new(user: &User, role: Option<&Role>) -> Self {
        UserView {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            role_id: user.role_id,
            role: role.map(|r| r.name.clone()),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleDetail {
    #[serde(flatten)]
    pub role: Role,
    pub permissions: Vec<Permission>,
    pub user_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuSummary {
    pub id: Id,
    pub title: String,
}

impl From<&Menu> for MenuSummary {
    fn from(m: &Menu) -> Self {
        MenuSummary { id: m.id, title: m.title.clone() }
    }
}

/// Admin listing row: a menu with its parent and direct children
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MenuDetail {
    #[serde(flatten)]
    pub menu: Menu,
    pub parent: Option<MenuSummary>,
    pub children: Vec<MenuSummary>,
}

// ============================================================================
// Inputs
// ============================================================================

fn yes() -> bool {
    true
}

fn default_category() -> String {
    DEFAULT_ICON_CATEGORY.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPermission {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub module: String,
    pub action: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PermissionPatch {
    pub name: Option<String>,
    pub description: Patch<String>,
    pub module: Option<String>,
    pub action: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRole {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "yes")]
    pub is_active: bool,
    #[serde(default)]
    pub permission_ids: Option<Vec<Id>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RolePatch {
    pub name: Option<String>,
    pub description: Patch<String>,
    pub is_active: Option<bool>,
    /// Present = replace the whole permission set
    pub permission_ids: Option<Vec<Id>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    pub password: String,
    #[serde(default)]
    pub role_id: Option<Id>,
    /// Role by name, used when `role_id` is absent
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserPatch {
    pub email: Option<String>,
    pub name: Patch<String>,
    /// Empty leaves the credential unchanged
    pub password: Option<String>,
    pub role_id: Option<Id>,
    pub role: Option<String>,
}

/// Registration form: always lands on the default role
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Registration {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMenu {
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub parent_id: Option<Id>,
    #[serde(default)]
    pub roles: RoleSet,
    #[serde(default = "yes")]
    pub is_active: bool,
}

impl NewMenu {
    /// Active root menu visible to the default scope
    pub fn new(title: impl Into<String>) -> Self {
        NewMenu {
            title: title.into(),
            url: None,
            icon: None,
            order: 0,
            parent_id: None,
            roles: RoleSet::default(),
            is_active: true,
        }
    }

    pub fn under(mut self, parent: Id) -> Self {
        self.parent_id = Some(parent);
        self
    }

    pub fn order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn roles(mut self, roles: RoleSet) -> Self {
        self.roles = roles;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MenuPatch {
    pub title: Option<String>,
    pub url: Patch<String>,
    pub icon: Patch<String>,
    pub order: Option<i32>,
    pub parent_id: Patch<Id>,
    pub roles: Option<RoleSet>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewIcon {
    pub name: String,
    #[serde(default = "default_category")]
    pub category: String,
    #[serde(default = "yes")]
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IconPatch {
    pub name: Option<String>,
    pub category: Option<String>,
    pub is_active: Option<bool>,
}
