//! Bearer-token verification.
//!
//! Tokens are issued by the main Taskboard auth service and verified here
//! with the shared HS256 secret. Pulse never issues production tokens; the
//! `token` CLI subcommand exists for local development only.

use axum::http::HeaderMap;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;

/// Roles carried in the token's `role` claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Manager,
    Member,
}

impl Role {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "admin" => Role::Admin,
            "manager" => Role::Manager,
            _ => Role::Member,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Member => "member",
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Role::Admin)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: Uuid,
    role: String,
    exp: usize,
}

/// Authenticated caller, attached to requests as an axum extension.
#[derive(Debug, Clone)]
pub struct AuthedUser {
    pub user_id: Uuid,
    pub role: Role,
}

impl AuthedUser {
    /// Admin gate for the stats/broadcast/test surface.
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}

/// Extract the bearer token from an `Authorization` header.
pub fn bearer_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .or_else(|| headers.get("Authorization"))
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
}

/// Verify a token and resolve the caller. Bad or expired tokens surface as
/// `Unauthorized`; the connection never reaches the registered state.
pub fn verify_token(secret: &str, token: &str) -> Result<AuthedUser, AppError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::new(Algorithm::HS256),
    )
    .map_err(|e| {
        tracing::debug!("token rejected: {}", e);
        AppError::Unauthorized
    })?;

    Ok(AuthedUser {
        user_id: data.claims.sub,
        role: Role::from_str(&data.claims.role),
    })
}

/// Issue a development token. Mirrors the claim shape the auth service uses.
pub fn issue_token(secret: &str, user_id: Uuid, role: Role, ttl_secs: u64) -> anyhow::Result<String> {
    let claims = Claims {
        sub: user_id,
        role: role.as_str().to_string(),
        exp: (chrono::Utc::now().timestamp() as usize) + ttl_secs as usize,
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_token() {
        let id = Uuid::new_v4();
        let token = issue_token("test-secret", id, Role::Manager, 600).unwrap();
        let user = verify_token("test-secret", &token).unwrap();
        assert_eq!(user.user_id, id);
        assert_eq!(user.role, Role::Manager);
    }

    #[test]
    fn wrong_secret_is_unauthorized() {
        let token = issue_token("secret-a", Uuid::new_v4(), Role::Member, 600).unwrap();
        assert!(matches!(
            verify_token("secret-b", &token),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn unknown_role_defaults_to_member() {
        assert_eq!(Role::from_str("owner"), Role::Member);
        assert_eq!(Role::from_str("ADMIN"), Role::Admin);
    }

    #[test]
    fn only_admin_passes_admin_gate() {
        let admin = AuthedUser { user_id: Uuid::new_v4(), role: Role::Admin };
        let member = AuthedUser { user_id: Uuid::new_v4(), role: Role::Member };
        assert!(admin.require_admin().is_ok());
        assert!(member.require_admin().is_err());
    }
}
