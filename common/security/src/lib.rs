pub mod context;
pub mod error;
pub mod policy;
pub mod roles;
pub mod test_macros;

pub use context::{resolve_principal, IdentityLookup, Principal, PrincipalCtx};
pub use error::SecurityError;
pub use policy::{require_authenticated, require_principal, require_role_or_owner, require_role_or_username};
pub use roles::Role;
