use crate::error::{Error, Result};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, HeaderMap, HeaderName, HeaderValue};
use std::fmt;

/// Public bearer token the x.com web app sends with every API call.
const BEARER_TOKEN: &str = "AAAAAAAAAAAAAAAAAAAAANRILgAAAAAAnNwIzUejRCOuH5E6I8xnZz4puTs%3D1Zv7ttfk8LF81IUq16cHjhLTvJu4FA33AGWWjCpTnA";

const CSRF_HEADER: HeaderName = HeaderName::from_static("x-csrf-token");

/// The two browser cookies that identify a logged-in x.com account.
#[derive(Clone)]
pub struct Credentials {
    pub auth_token: String,
    pub csrf_token: String,
}

impl Credentials {
    pub fn new(auth_token: impl Into<String>, csrf_token: impl Into<String>) -> Self {
        Self {
            auth_token: auth_token.into(),
            csrf_token: csrf_token.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("auth_token", &"[redacted]")
            .field("csrf_token", &"[redacted]")
            .finish()
    }
}

/// Header bundle derived once from [`Credentials`] and attached to every request.
#[derive(Clone)]
pub struct Session {
    cookie: String,
    headers: HeaderMap,
}

impl Session {
    pub fn new(credentials: Credentials) -> Result<Self> {
        let Credentials {
            auth_token,
            csrf_token,
        } = credentials;

        if auth_token.is_empty() {
            return Err(Error::Configuration("auth token is empty".to_string()));
        }
        if csrf_token.is_empty() {
            return Err(Error::Configuration("csrf token is empty".to_string()));
        }

        let cookie = format!("auth_token={}; ct0={};", auth_token, csrf_token);

        let mut headers = HeaderMap::new();
        headers.insert(CSRF_HEADER, header_value("csrf token", &csrf_token)?);
        headers.insert(
            AUTHORIZATION,
            header_value("authorization", &format!("Bearer {}", BEARER_TOKEN))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut cookie_value = header_value("cookie", &cookie)?;
        cookie_value.set_sensitive(true);
        headers.insert(COOKIE, cookie_value);

        Ok(Self { cookie, headers })
    }

    pub fn cookie(&self) -> &str {
        &self.cookie
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("cookie", &"[redacted]")
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn header_value(what: &str, value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| Error::Configuration(format!("{} is not a valid header value", what)))
}
