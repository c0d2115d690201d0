//! Password hashing

use super::gate::AuthError;

/// Cost bounds accepted by bcrypt
const MIN_COST: u32 = 4;
const MAX_COST: u32 = 31;

/// Hashes and checks passwords. Calls are CPU-bound and blocking.
pub trait PasswordHasher: Send + Sync + 'static {
    fn hash(&self, password: &str) -> Result<String, AuthError>;

    fn verify(&self, password: &str, hashed: &str) -> Result<bool, AuthError>;
}

/// bcrypt with a configurable cost
#[derive(Debug, Clone, Copy)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    pub fn new(cost: u32) -> Self {
        Self {
            cost: cost.clamp(MIN_COST, MAX_COST),
        }
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl PasswordHasher for BcryptHasher {
    fn hash(&self, password: &str) -> Result<String, AuthError> {
        bcrypt::hash(password, self.cost).map_err(|e| AuthError::Hash(e.to_string()))
    }

    fn verify(&self, password: &str, hashed: &str) -> Result<bool, AuthError> {
        match bcrypt::verify(password, hashed) {
            Ok(matches) => Ok(matches),
            // A stored value that is not a bcrypt hash never matches
            Err(
                bcrypt::BcryptError::InvalidHash(_)
                | bcrypt::BcryptError::InvalidPrefix(_)
                | bcrypt::BcryptError::InvalidCost(_)
                | bcrypt::BcryptError::InvalidBase64(_),
            ) => Ok(false),
            Err(e) => Err(AuthError::Hash(e.to_string())),
        }
    }
}
