//! Cookie sessions and the extractors built on them.

use std::convert::Infallible;

use axum::{
    extract::FromRequestParts,
    http::request::Parts,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::debug;
use url::form_urlencoded;

use crate::application::accounts::{IssuedSession, Principal};

use super::{HttpState, found};

pub const SESSION_COOKIE: &str = "yatube_session";
pub const LOGIN_PATH: &str = "/auth/login";

/// The signed-in user, if any. Invalid or expired cookies count as anonymous.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Option<Principal>);

impl CurrentUser {
    pub fn principal(&self) -> Option<&Principal> {
        self.0.as_ref()
    }
}

impl FromRequestParts<HttpState> for CurrentUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &HttpState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(principal) = parts.extensions.get::<Principal>() {
            return Ok(Self(Some(principal.clone())));
        }

        let jar = CookieJar::from_headers(&parts.headers);
        let Some(token) = jar.get(SESSION_COOKIE).map(|cookie| cookie.value().to_string()) else {
            return Ok(Self(None));
        };

        match state.accounts.authenticate(&token).await {
            Ok(principal) => {
                parts.extensions.insert(principal.clone());
                Ok(Self(Some(principal)))
            }
            Err(err) => {
                debug!(error = %err, "Ignoring session cookie");
                Ok(Self(None))
            }
        }
    }
}

/// A signed-in user; anonymous requests are sent to the login page with
/// `next` pointing back at the requested path.
#[derive(Debug, Clone)]
pub struct RequireUser(pub Principal);

impl FromRequestParts<HttpState> for RequireUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &HttpState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentUser(principal) = match CurrentUser::from_request_parts(parts, state).await {
            Ok(user) => user,
            Err(never) => match never {},
        };

        match principal {
            Some(principal) => Ok(Self(principal)),
            None => {
                let next = parts
                    .uri
                    .path_and_query()
                    .map(|value| value.as_str())
                    .unwrap_or("/");
                Err(login_redirect(next))
            }
        }
    }
}

pub fn login_redirect(next: &str) -> Response {
    found(&login_href(next))
}

pub fn login_href(next: &str) -> String {
    let encoded: String = form_urlencoded::byte_serialize(next.as_bytes()).collect();
    format!("{LOGIN_PATH}?next={encoded}")
}

/// Accepts only same-site absolute paths as redirect targets.
pub fn safe_next(next: Option<&str>) -> &str {
    match next {
        Some(path) if path.starts_with('/') && !path.starts_with("//") && !path.contains('\\') => {
            path
        }
        _ => "/",
    }
}

pub fn session_cookie(session: &IssuedSession, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session.token.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .expires(session.expires_at)
        .build()
}

pub fn clear_session(jar: CookieJar) -> CookieJar {
    jar.remove(Cookie::build(SESSION_COOKIE).path("/"))
}

pub fn session_token(jar: &CookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn login_href_encodes_next() {
        assert_eq!(login_href("/new"), "/auth/login?next=%2Fnew");
        assert_eq!(
            login_href("/search?text=a b"),
            "/auth/login?next=%2Fsearch%3Ftext%3Da+b"
        );
    }

    #[test]
    fn safe_next_rejects_foreign_targets() {
        assert_eq!(safe_next(Some("/follow")), "/follow");
        assert_eq!(safe_next(Some("//evil.example")), "/");
        assert_eq!(safe_next(Some("https://evil.example")), "/");
        assert_eq!(safe_next(None), "/");
    }
}
