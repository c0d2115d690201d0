//! Accounts and authentication
//!
//! Password hashing and verification run on the worker pool. Logged-in
//! clients carry an opaque bearer token issued by the session store.

mod gate;
mod password;
mod session;

pub use gate::{AuthError, CredentialGate};
pub use password::{BcryptHasher, PasswordHasher};
pub use session::{AuthUser, SessionStore};
