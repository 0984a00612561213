//! Cookie parsing and building for authentication.

use axum::http::{HeaderMap, header};

/// Cookie name for the access token (short-lived, 1 hour).
pub const ACCESS_COOKIE_NAME: &str = "accessToken";

/// Cookie name for the refresh token (long-lived, 1 year).
pub const REFRESH_COOKIE_NAME: &str = "refreshToken";

/// Extract a cookie value from the Cookie header.
pub fn get_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    let cookie_header = headers.get(header::COOKIE)?.to_str().ok()?;
    for part in cookie_header.split(';') {
        let part = part.trim();
        if let Some((key, value)) = part.split_once('=') {
            if key.trim() == name {
                return Some(value.trim());
            }
        }
    }
    None
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn get_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() {
        Some(token)
    } else {
        None
    }
}

/// Attributes shared by every auth cookie this service sets.
#[derive(Debug, Clone, Default)]
pub struct CookieSettings {
    /// Add the `Secure` attribute (should be true behind HTTPS).
    pub secure: bool,
    /// Optional `Domain` attribute.
    pub domain: Option<String>,
}

impl CookieSettings {
    fn attributes(&self) -> String {
        let mut attrs = String::from("HttpOnly; SameSite=Strict; Path=/");
        if let Some(domain) = &self.domain {
            attrs.push_str("; Domain=");
            attrs.push_str(domain);
        }
        if self.secure {
            attrs.push_str("; Secure");
        }
        attrs
    }

    /// `Set-Cookie` value carrying a token for `max_age` seconds.
    pub fn build(&self, name: &str, value: &str, max_age: u64) -> String {
        format!("{}={}; {}; Max-Age={}", name, value, self.attributes(), max_age)
    }

    /// `Set-Cookie` value that removes the cookie.
    pub fn clear(&self, name: &str) -> String {
        format!("{}=; {}; Max-Age=0", name, self.attributes())
    }
}
