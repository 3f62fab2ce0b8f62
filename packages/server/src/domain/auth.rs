//! Authentication gate trait

use super::{error::AuthError, value_object::UserId};

/// Resolves a bearer token to the identity it was issued for.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, token: Option<&str>) -> Result<UserId, AuthError>;
}
