use std::sync::Arc;

use warp::{
    reject::{self, Rejection},
    Filter,
};

use crate::{
    constants::{SESSION_COOKIE, TOKEN_PREFIX},
    identity::Identity,
};

use super::jwt::{verify_jwt_session, SessionKeys};

#[derive(Debug)]
struct Unauthorized;

impl reject::Reject for Unauthorized {}

/// Picks the session token from the `Authorization: Token <jwt>` header,
/// falling back to the session cookie.
pub fn session_token(cookie: Option<String>, header: Option<String>) -> Option<String> {
    header
        .and_then(|value| value.strip_prefix(TOKEN_PREFIX).map(|t| t.trim().to_string()))
        .filter(|token| !token.is_empty())
        .or(cookie)
}

pub fn resolve_identity(token: Option<String>, keys: &SessionKeys) -> Identity {
    match token {
        Some(token) => match verify_jwt_session(&token, keys) {
            Ok(session) => session.into(),
            Err(_) => {
                log::debug!("Ignoring invalid session token");
                Identity::Anonymous
            }
        },
        None => Identity::Anonymous,
    }
}

/// Resolves the caller; missing or invalid sessions resolve to anonymous.
pub fn with_identity(
    keys: Arc<SessionKeys>,
) -> impl Filter<Extract = (Identity,), Error = Rejection> + Clone {
    warp::cookie::optional::<String>(SESSION_COOKIE)
        .and(warp::header::optional::<String>("authorization"))
        .map(move |cookie: Option<String>, header: Option<String>| {
            resolve_identity(session_token(cookie, header), &keys)
        })
}

/// Like [`with_identity`] but rejects anonymous callers.
pub fn with_user(
    keys: Arc<SessionKeys>,
) -> impl Filter<Extract = (Identity,), Error = Rejection> + Clone {
    with_identity(keys).and_then(|identity: Identity| async move {
        if identity.is_authenticated() {
            Ok(identity)
        } else {
            Err(warp::reject::custom(Unauthorized))
        }
    })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(None, Some("Token abc"), Some("abc"))]
    #[case(Some("cookie"), Some("Token abc"), Some("abc"))]
    #[case(Some("cookie"), None, Some("cookie"))]
    #[case(Some("cookie"), Some("Bearer abc"), Some("cookie"))]
    #[case(None, Some("Token "), None)]
    #[case(None, None, None)]
    fn picks_session_token(
        #[case] cookie: Option<&str>,
        #[case] header: Option<&str>,
        #[case] expected: Option<&str>,
    ) {
        let token = session_token(cookie.map(String::from), header.map(String::from));
        assert_eq!(token.as_deref(), expected);
    }

    #[rstest]
    fn invalid_token_resolves_to_anonymous() {
        let keys = SessionKeys::new("secret", 1);
        assert_eq!(
            resolve_identity(Some(String::from("garbage")), &keys),
            Identity::Anonymous
        );
        assert_eq!(resolve_identity(None, &keys), Identity::Anonymous);
    }

    #[tokio::test]
    async fn anonymous_request_passes_identity_filter() {
        let keys = Arc::new(SessionKeys::new("secret", 1));
        let identity = warp::test::request()
            .filter(&with_identity(keys))
            .await
            .expect("filter never rejects");

        assert_eq!(identity, Identity::Anonymous);
    }

    #[tokio::test]
    async fn anonymous_request_is_rejected_by_user_filter() {
        let keys = Arc::new(SessionKeys::new("secret", 1));
        let result = warp::test::request().filter(&with_user(keys)).await;

        assert!(result.is_err());
    }
}
