//! Auth types consumed from the identity collaborator.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Bearer token claims. The verifier itself is owned by the auth
/// collaborator; the scheduling core only consumes the decoded identity.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id as a UUID string.
    pub sub: String,
    /// Identity-provider email, when the provider supplies one.
    #[serde(default)]
    pub email: Option<String>,
    pub exp: u64,
    pub iat: u64,
}

/// Fallback email for identity providers that supply none.
pub fn fallback_email(user_id: Uuid) -> String {
    format!("{user_id}@users.hifz.local")
}
