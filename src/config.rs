//! Runtime configuration, read from the environment

use std::path::PathBuf;

use crate::db::DEFAULT_MAP_SIZE;

/// dashguard configuration. Every field has a default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// LMDB directory (`DASHGUARD_DB`)
    pub db_path: PathBuf,
    /// LMDB map size in bytes (`DASHGUARD_MAP_SIZE`)
    pub map_size: usize,
    /// Listen address (`DASHGUARD_BIND`)
    pub bind: String,
    /// Log filter (`DASHGUARD_LOG`, falls back to `RUST_LOG`)
    pub log_level: String,
    /// Session lifetime in seconds, `None` = never expires (`DASHGUARD_SESSION_TTL`, 0 = never)
    pub session_ttl_secs: Option<u64>,
    /// Seeded on first start when both are set (`DASHGUARD_ADMIN_EMAIL`, `DASHGUARD_ADMIN_PASSWORD`)
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            db_path: PathBuf::from("./dashguard.lmdb"),
            map_size: DEFAULT_MAP_SIZE,
            bind: "0.0.0.0:3000".to_string(),
            log_level: "info".to_string(),
            session_ttl_secs: Some(24 * 60 * 60),
            admin_email: None,
            admin_password: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from any key lookup; unparseable values fall back to defaults
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let d = Config::default();
        Config {
            db_path: get("DASHGUARD_DB").map(PathBuf::from).unwrap_or(d.db_path),
            map_size: get("DASHGUARD_MAP_SIZE").and_then(|v| v.parse().ok()).unwrap_or(d.map_size),
            bind: get("DASHGUARD_BIND").unwrap_or(d.bind),
            log_level: get("DASHGUARD_LOG").or_else(|| get("RUST_LOG")).unwrap_or(d.log_level),
            session_ttl_secs: match get("DASHGUARD_SESSION_TTL").and_then(|v| v.parse::<u64>().ok()) {
                Some(0) => None,
                Some(secs) => Some(secs),
                None => d.session_ttl_secs,
            },
            admin_email: get("DASHGUARD_ADMIN_EMAIL").filter(|v| !v.is_empty()),
            admin_password: get("DASHGUARD_ADMIN_PASSWORD").filter(|v| !v.is_empty()),
        }
    }

    /// Seed credentials, when both are configured
    pub fn admin_credentials(&self) -> Option<(&str, &str)> {
        Some((self.admin_email.as_deref()?, self.admin_password.as_deref()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let m: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| m.get(k).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(Config::from_lookup(lookup(&[])), Config::default());
    }

    #[test]
    fn reads_overrides() {
        let c = Config::from_lookup(lookup(&[
            ("DASHGUARD_DB", "/tmp/dg"),
            ("DASHGUARD_MAP_SIZE", "4096"),
            ("DASHGUARD_SESSION_TTL", "0"),
            ("RUST_LOG", "debug"),
            ("DASHGUARD_ADMIN_EMAIL", "root@example.com"),
            ("DASHGUARD_ADMIN_PASSWORD", "Secret1"),
        ]));
        assert_eq!(c.db_path, PathBuf::from("/tmp/dg"));
        assert_eq!(c.map_size, 4096);
        assert_eq!(c.session_ttl_secs, None);
        assert_eq!(c.log_level, "debug");
        assert_eq!(c.admin_credentials(), Some(("root@example.com", "Secret1")));
    }

    #[test]
    fn bad_numbers_fall_back() {
        let c = Config::from_lookup(lookup(&[("DASHGUARD_MAP_SIZE", "lots"), ("DASHGUARD_SESSION_TTL", "-1")]));
        assert_eq!(c.map_size, DEFAULT_MAP_SIZE);
        assert_eq!(c.session_ttl_secs, Some(86_400));
        assert_eq!(c.admin_credentials(), None);
    }
}
