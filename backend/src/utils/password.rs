use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};

use crate::config::PasswordHashConfig;

/// Argon2id password hashing with a tunable work factor.
///
/// Hashes are PHC strings, so the salt and cost parameters travel with the
/// stored value and older hashes stay verifiable after the cost changes.
#[derive(Clone)]
pub struct CredentialHasher {
    argon2: Argon2<'static>,
    dummy_hash: String,
}

impl CredentialHasher {
    pub fn new(config: PasswordHashConfig) -> anyhow::Result<Self> {
        let params = Params::new(
            config.memory_kib,
            config.iterations,
            config.parallelism,
            None,
        )
        .map_err(|e| anyhow::anyhow!("Invalid password hash parameters: {}", e))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let salt = SaltString::generate(&mut OsRng);
        let dummy_hash = argon2
            .hash_password(b"agenda-dummy-credential", &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?
            .to_string();

        Ok(Self { argon2, dummy_hash })
    }

    pub fn hash(&self, password: &str) -> anyhow::Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))?;

        Ok(password_hash.to_string())
    }

    /// Returns `false` for a mismatch and for an unparsable stored hash.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        let parsed_hash = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!(error = %e, "Stored password hash is malformed");
                return false;
            }
        };

        match self.argon2.verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => true,
            Err(argon2::password_hash::Error::Password) => false,
            Err(e) => {
                tracing::warn!(error = %e, "Password verification error");
                false
            }
        }
    }

    /// Spends one verification so a login for an unknown user costs the same
    /// as one with a wrong password.
    pub fn verify_dummy(&self, password: &str) {
        let _ = self.verify(password, &self.dummy_hash);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> CredentialHasher {
        CredentialHasher::new(PasswordHashConfig {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        })
        .expect("hasher")
    }

    #[test]
    fn hash_and_verify_roundtrip() {
        let hasher = hasher();
        let pw = "S3cr3t!pass";
        let hash = hasher.hash(pw).expect("hash should succeed");
        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.verify(pw, &hash));
        assert!(!hasher.verify("wrong", &hash));
    }

    #[test]
    fn salts_differ_between_hashes() {
        let hasher = hasher();
        let first = hasher.hash("same-password").expect("hash");
        let second = hasher.hash("same-password").expect("hash");
        assert_ne!(first, second);
        assert!(hasher.verify("same-password", &second));
    }

    #[test]
    fn malformed_hash_verifies_false() {
        assert!(!hasher().verify("anything", "not-a-phc-string"));
    }

    #[test]
    fn rejects_invalid_cost_parameters() {
        let result = CredentialHasher::new(PasswordHashConfig {
            memory_kib: 1,
            iterations: 0,
            parallelism: 1,
        });
        assert!(result.is_err());
    }
}
