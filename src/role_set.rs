//! Role-scope sets for menu visibility
//!
//! Stored as a comma-joined lowercase token list (`"user,admin"`). The
//! string form only exists at the storage and input boundary; everything
//! else works on the parsed set.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::constants::{ADMIN_ROLE, DEFAULT_ROLE};
use crate::error::{DashError, Result};

/// Non-empty ordered set of lowercase role tokens
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoleSet(Vec<String>);

impl RoleSet {
    /// Parse `a,b,c`. Each token must match `[a-z]+`; duplicates collapse.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(DashError::validation("roles", "at least one role is required"));
        }
        let mut tokens: Vec<String> = Vec::new();
        for tok in s.split(',') {
            if tok.is_empty() || !tok.bytes().all(|b| b.is_ascii_lowercase()) {
                return Err(DashError::validation(
                    "roles",
                    "roles must be comma-separated lowercase names (e.g. 'user,admin')",
                ));
            }
            if !tokens.iter().any(|t| t == tok) {
                tokens.push(tok.to_string());
            }
        }
        Ok(RoleSet(tokens))
    }

    /// Exact per-token membership
    pub fn contains(&self, role: &str) -> bool {
        self.0.iter().any(|t| t == role)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The scope given to menus created without an explicit one: `user,admin`
impl Default for RoleSet {
    fn default() -> Self {
        RoleSet(vec![DEFAULT_ROLE.to_string(), ADMIN_ROLE.to_string()])
    }
}

impl fmt::Display for RoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(","))
    }
}

impl FromStr for RoleSet {
    type Err = DashError;

    fn from_str(s: &str) -> Result<Self> {
        RoleSet::parse(s)
    }
}

impl Serialize for RoleSet {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for RoleSet {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        RoleSet::parse(&s).map_err(serde::de::Error::custom)
    }
}
