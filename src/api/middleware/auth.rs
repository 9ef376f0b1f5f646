use std::future::{ready, Ready};

use actix_web::{
    dev::Payload,
    http::header::{HeaderMap, AUTHORIZATION},
    Error, FromRequest, HttpRequest,
};

use crate::config::AuthConfig;

pub const DEFAULT_USER: &str = "default-user";

/// Second space-separated token of `Authorization`, taken as the user id
/// as-is. Nothing is verified here.
pub fn bearer_user_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .split(' ')
        .nth(1)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// Caller identity as presented in the request headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity(pub Option<String>);

impl UserIdentity {
    pub fn user_id(&self) -> Option<&str> {
        self.0.as_deref()
    }

    /// User id for factory-backed storage. `None` means the request must be
    /// rejected: auth is on and no token was sent.
    pub fn storage_user(&self, auth: &AuthConfig) -> Option<String> {
        match (&self.0, auth.enabled) {
            (Some(user_id), _) => Some(user_id.clone()),
            (None, true) => None,
            (None, false) => Some(DEFAULT_USER.to_string()),
        }
    }
}

impl FromRequest for UserIdentity {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(Ok(UserIdentity(bearer_user_id(req.headers()))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_bearer_token_is_second_token() {
        let req = TestRequest::default()
            .insert_header(("Authorization", "Bearer alice"))
            .to_http_request();
        assert_eq!(bearer_user_id(req.headers()), Some("alice".to_string()));

        let req = TestRequest::default()
            .insert_header(("Authorization", "Bearer"))
            .to_http_request();
        assert_eq!(bearer_user_id(req.headers()), None);

        let req = TestRequest::default().to_http_request();
        assert_eq!(bearer_user_id(req.headers()), None);
    }

    #[test]
    fn test_storage_user_resolution() {
        let enabled = AuthConfig { enabled: true };
        let disabled = AuthConfig { enabled: false };

        assert_eq!(UserIdentity(None).storage_user(&enabled), None);
        assert_eq!(
            UserIdentity(None).storage_user(&disabled),
            Some(DEFAULT_USER.to_string())
        );
        assert_eq!(
            UserIdentity(Some("bob".into())).storage_user(&enabled),
            Some("bob".to_string())
        );
    }
}
