use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use potion::HtmlError;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::database::schema::User;
use crate::identity::Identity;
use crate::schema::{Id, UserRole};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: Id,
    pub username: String,
    pub user_role: UserRole,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(id: Id, username: String, role: UserRole, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            user_id: id,
            username,
            user_role: role,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        (self.exp - now.timestamp()).is_negative()
    }
}

impl From<JwtSessionData> for Identity {
    fn from(value: JwtSessionData) -> Self {
        Identity::User {
            id: value.user_id,
            username: value.username,
            role: value.user_role,
        }
    }
}

/// Signing secret and lifetime of session tokens.
#[derive(Clone)]
pub struct SessionKeys {
    secret: Vec<u8>,
    ttl: Duration,
}

impl SessionKeys {
    pub fn new(secret: &str, ttl_hours: i64) -> Self {
        Self {
            secret: secret.as_bytes().to_vec(),
            ttl: Duration::hours(ttl_hours),
        }
    }

    fn key(&self) -> Result<Hmac<Sha256>, potion::Error> {
        Hmac::new_from_slice(&self.secret)
            .map_err(|_| HtmlError::InternalServerError.new("Invalid session secret"))
    }
}

pub fn generate_jwt_session(user: &User, keys: &SessionKeys) -> Result<String, potion::Error> {
    let claims = JwtSessionData::new(
        user.id,
        user.username.to_owned(),
        user.role,
        Utc::now(),
        keys.ttl,
    );

    sign_session(&claims, keys)
}

pub fn sign_session(claims: &JwtSessionData, keys: &SessionKeys) -> Result<String, potion::Error> {
    claims
        .sign_with_key(&keys.key()?)
        .map_err(|_| HtmlError::InternalServerError.new("Failed to sign session"))
}

pub fn verify_jwt_session(token: &str, keys: &SessionKeys) -> Result<JwtSessionData, potion::Error> {
    let session: JwtSessionData = token
        .verify_with_key(&keys.key()?)
        .map_err(|_| HtmlError::InvalidSession.new("Invalid Session; Invalid token"))?;

    if session.is_expired(Utc::now()) {
        return Err(HtmlError::InvalidSession.new("Invalid session; Token expired"));
    }

    Ok(session)
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;

    #[fixture]
    fn keys() -> SessionKeys {
        SessionKeys::new("test-secret", 1)
    }

    fn claims(now: DateTime<Utc>, ttl: Duration) -> JwtSessionData {
        JwtSessionData::new(7, String::from("chef"), UserRole::User, now, ttl)
    }

    #[rstest]
    fn round_trips_into_identity(keys: SessionKeys) {
        let token = sign_session(&claims(Utc::now(), Duration::hours(1)), &keys).expect("signed");
        let session = verify_jwt_session(&token, &keys).expect("valid session");

        assert_eq!(
            Identity::from(session),
            Identity::user(7, "chef", UserRole::User)
        );
    }

    #[rstest]
    fn rejects_foreign_signature(keys: SessionKeys) {
        let other = SessionKeys::new("another-secret", 1);
        let token = sign_session(&claims(Utc::now(), Duration::hours(1)), &other).expect("signed");

        assert!(verify_jwt_session(&token, &keys).is_err());
    }

    #[rstest]
    fn rejects_expired_token(keys: SessionKeys) {
        let issued = Utc::now() - Duration::hours(3);
        let token = sign_session(&claims(issued, Duration::hours(1)), &keys).expect("signed");

        assert!(verify_jwt_session(&token, &keys).is_err());
    }

    #[rstest]
    fn rejects_garbage(keys: SessionKeys) {
        assert!(verify_jwt_session("not.a.token", &keys).is_err());
    }
}
