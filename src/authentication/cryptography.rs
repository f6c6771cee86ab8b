use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use crate::error::{ActionError, QueryError};

fn internal(info: &str) -> ActionError {
    ActionError::Query(QueryError::new(info.to_string()))
}

/// PHC string of `password` under a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, ActionError> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| {
            log::error!("Failed to hash password: {e}");
            internal("Password could not be processed")
        })
}

/// `Ok(false)` for a wrong password. A stored hash that doesn't parse is an
/// internal error, not a failed login.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, ActionError> {
    let parsed = PasswordHash::new(stored_hash).map_err(|e| {
        log::error!("Stored password hash is unreadable: {e}");
        internal("Stored password hash is unreadable")
    })?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn verifies_own_hash_only() {
        let hash = hash_password("correct horse").expect("hashable");

        assert!(verify_password("correct horse", &hash).expect("parsable hash"));
        assert!(!verify_password("battery staple", &hash).expect("parsable hash"));
    }

    #[rstest]
    fn hashes_are_salted() {
        assert_ne!(
            hash_password("same").expect("hashable"),
            hash_password("same").expect("hashable")
        );
    }

    #[rstest]
    fn malformed_hash_is_an_internal_error() {
        assert!(matches!(
            verify_password("anything", "not-a-phc-string"),
            Err(ActionError::Query(_))
        ));
    }
}
