//! Password hashing (bcrypt + optional server-side pepper)

use bcrypt::{hash, verify, BcryptResult, DEFAULT_COST};

#[derive(Debug, Clone)]
pub struct PasswordHasher {
    cost: u32,
    pepper: String,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self::new(DEFAULT_COST, String::new())
    }
}

impl PasswordHasher {
    pub fn new(cost: u32, pepper: String) -> Self {
        Self { cost, pepper }
    }

    fn peppered(&self, password: &str) -> String {
        format!("{}{}", password, self.pepper)
    }

    pub fn hash(&self, password: &str) -> BcryptResult<String> {
        hash(self.peppered(password), self.cost)
    }

    pub fn verify(&self, password: &str, password_hash: &str) -> BcryptResult<bool> {
        verify(self.peppered(password), password_hash)
    }
}
