//! Authentication: credential hashing, login and token sessions
//!
//! Tokens are opaque; the store only ever sees their SHA-256.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};

use crate::constants::DEFAULT_ROLE;
use crate::context::Session;
use crate::error::{DashError, Result};
use crate::model::{now_millis, Id, Registration, SessionRecord, User, UserView};
use crate::store::Store;
use crate::{guards, validate};

// ============================================================================
// Credential hashing
// ============================================================================

/// Turns passwords into stored hashes and checks them back
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, password: &str) -> Result<String>;
    /// False for a wrong password or an unparseable hash
    fn verify(&self, password: &str, hash: &str) -> bool;
}

/// Salted Argon2id in PHC string format
#[derive(Clone, Default)]
pub struct Argon2Hasher {
    argon: Argon2<'static>,
}

impl Argon2Hasher {
    /// Custom cost: memory in KiB, iterations, parallelism
    pub fn with_cost(m_cost: u32, t_cost: u32, p_cost: u32) -> Result<Self> {
        let params = Params::new(m_cost, t_cost, p_cost, None)
            .map_err(|e| DashError::validation("hasher", e.to_string()))?;
        Ok(Argon2Hasher { argon: Argon2::new(Algorithm::Argon2id, Version::V0x13, params) })
    }
}

impl CredentialHasher for Argon2Hasher {
    fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| DashError::Storage(format!("password hashing failed: {}", e)))
    }

    fn verify(&self, password: &str, hash: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(hash) else { return false };
        self.argon.verify_password(password.as_bytes(), &parsed).is_ok()
    }
}

impl std::fmt::Debug for Argon2Hasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Argon2Hasher").finish_non_exhaustive()
    }
}

// ============================================================================
// Tokens and sessions
// ============================================================================

/// 32 random bytes, base64url without padding
pub fn generate_token() -> Result<String> {
    let mut bytes = [0u8; 32];
    getrandom::getrandom(&mut bytes).map_err(|e| DashError::Storage(format!("rng failure: {}", e)))?;
    Ok(URL_SAFE_NO_PAD.encode(bytes))
}

/// SHA-256 of the token, hex encoded
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Create a session, returns token. `ttl_secs = None` never expires.
pub fn create_session(store: &dyn Store, user_id: Id, ttl_secs: Option<u64>) -> Result<String> {
    let token = generate_token()?;
    let now = now_millis();
    let expires_at = ttl_secs.map(|t| i64::try_from(t.saturating_mul(1000)).map_or(i64::MAX, |ms| now.saturating_add(ms)));
    store.insert_session(&hash_token(&token), SessionRecord { user_id, created_at: now, expires_at })?;
    tracing::debug!(user = user_id, ?expires_at, "session created");
    Ok(token)
}

/// Resolve a token to the caller's identity and current role name
pub fn validate_session(store: &dyn Store, token: &str) -> Result<Session> {
    let hash = hash_token(token);
    let rec = store.find_session(&hash)?.ok_or(DashError::Unauthenticated)?;
    if rec.expires_at.is_some_and(|exp| exp < now_millis()) {
        store.delete_session(&hash)?;
        tracing::debug!(user = rec.user_id, "expired session rejected");
        return Err(DashError::Unauthenticated);
    }
    let user = store.find_user(rec.user_id)?.ok_or(DashError::Unauthenticated)?;
    let role = match user.role_id {
        Some(rid) => store.find_role(rid)?.map(|r| r.name),
        None => None,
    };
    Ok(Session { user_id: user.id, role })
}

/// Revoke a session by token
pub fn logout(store: &dyn Store, token: &str) -> Result<bool> {
    store.delete_session(&hash_token(token))
}

#[derive(Debug, Clone)]
pub struct LoginResult {
    pub token: String,
    pub user: UserView,
}

/// Verify email and password, then issue a session. Unknown email and
/// wrong password fail the same way.
pub fn login(
    store: &dyn Store,
    hasher: &dyn CredentialHasher,
    email: &str,
    password: &str,
    ttl_secs: Option<u64>,
) -> Result<LoginResult> {
    let email = email.trim().to_lowercase();
    let Some(user) = store.find_user_by_email(&email)? else {
        tracing::debug!(%email, "login for unknown email");
        return Err(DashError::Unauthenticated);
    };
    if !hasher.verify(password, &user.password_hash) {
        tracing::debug!(user = user.id, "login with wrong password");
        return Err(DashError::Unauthenticated);
    }
    let token = create_session(store, user.id, ttl_secs)?;
    let role = match user.role_id {
        Some(rid) => store.find_role(rid)?,
        None => None,
    };
    tracing::info!(user = user.id, "login");
    Ok(LoginResult { token, user: UserView::new(&user, role.as_ref()) })
}

/// Self-service signup onto the default role
pub fn register(store: &dyn Store, hasher: &dyn CredentialHasher, form: Registration) -> Result<UserView> {
    let email = validate::email(&form.email)?;
    validate::password(&form.password)?;
    let name = validate::user_name(form.name)?;
    guards::ensure_email_free(store, &email, None)?;
    let role = store
        .find_role_by_name(DEFAULT_ROLE)?
        .ok_or_else(|| DashError::not_found(format!("role '{}'", DEFAULT_ROLE)))?;
    let user = store.insert_user(User {
        id: 0,
        email,
        name,
        password_hash: hasher.hash(&form.password)?,
        role_id: Some(role.id),
        created_at: 0,
        updated_at: 0,
    })?;
    tracing::info!(user = user.id, "user registered");
    Ok(UserView::new(&user, Some(&role)))
}
