//! JWT claim set issued to registered users.

use serde::{Deserialize, Serialize};

/// Claims embedded in every token.
///
/// Validity is decided purely by the HS256 signature and `exp`; there is no
/// revocation list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Username the token was issued to
    pub username: String,

    /// Issued-at (Unix timestamp, seconds)
    pub iat: i64,

    /// Expiry (Unix timestamp, seconds)
    pub exp: i64,
}
