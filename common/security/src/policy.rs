//! Authorization decisions. Every function is pure over its inputs and
//! reports a denial as a `SecurityError`.

use tracing::warn;

use crate::{context::Principal, roles::Role, SecurityError};

/// Admin-or-owner rule, evaluated in order: absent principal denies, holding
/// `required` allows, owning the resource allows, anything else denies.
pub fn require_role_or_owner(
    principal: Option<&Principal>,
    required: Role,
    owner_id: i64,
) -> Result<(), SecurityError> {
    let Some(p) = principal else {
        warn!(%required, owner_id, "authorization_denied_anonymous");
        return Err(SecurityError::NotAuthenticated);
    };
    if p.has_role(required) {
        return Ok(());
    }
    if p.id == owner_id {
        return Ok(());
    }
    warn!(principal_id = p.id, %required, owner_id, "authorization_denied");
    Err(SecurityError::AccessDenied)
}

/// Same precedence as [`require_role_or_owner`], keyed by username.
pub fn require_role_or_username(
    principal: Option<&Principal>,
    required: Role,
    username: &str,
) -> Result<(), SecurityError> {
    let Some(p) = principal else {
        warn!(%required, "authorization_denied_anonymous");
        return Err(SecurityError::NotAuthenticated);
    };
    if p.has_role(required) {
        return Ok(());
    }
    if p.username.eq_ignore_ascii_case(username) {
        return Ok(());
    }
    warn!(principal_id = p.id, %required, "authorization_denied");
    Err(SecurityError::AccessDenied)
}

pub fn require_authenticated(principal: Option<&Principal>, required: Role) -> Result<(), SecurityError> {
    let p = require_principal(principal)?;
    if p.has_role(required) {
        return Ok(());
    }
    warn!(principal_id = p.id, %required, roles = ?p.roles, "role_check_failed");
    Err(SecurityError::MissingRole(required))
}

/// Any signed-in principal passes; the principal is handed back for convenience.
pub fn require_principal(principal: Option<&Principal>) -> Result<&Principal, SecurityError> {
    principal.ok_or_else(|| {
        warn!("authentication_required");
        SecurityError::NotAuthenticated
    })
}
