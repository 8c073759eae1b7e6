//! Credentials handed to the resolver.
//!
//! An SDK is initialised with a single authorization string which is either a
//! tokenization key or a client token. Both are turned into an [`Authorization`]
//! carrying the configuration endpoint and the bearer token used to fetch it.
//! Strings that match neither format produce [`Credentials::Invalid`] so that
//! the failure surfaces when configuration is first resolved.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::Deserialize;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

#[derive(Clone, PartialEq, Eq)]
pub struct Authorization {
    config_url: String,
    bearer: Option<String>,
}

impl Authorization {
    pub fn new<U>(config_url: U, bearer: Option<String>) -> Self
    where
        U: Into<String>,
    {
        Authorization {
            config_url: config_url.into(),
            bearer,
        }
    }

    pub fn config_url(&self) -> &str {
        &self.config_url
    }

    pub fn bearer(&self) -> Option<&str> {
        self.bearer.as_deref()
    }
}

// Bearer tokens must never end up in logs.
impl fmt::Debug for Authorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authorization")
            .field("config_url", &self.config_url)
            .field("bearer", &self.bearer.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Credentials {
    Valid(Authorization),
    Invalid { reason: String },
}

impl Credentials {
    pub fn valid<U>(config_url: U, bearer: Option<String>) -> Self
    where
        U: Into<String>,
    {
        Credentials::Valid(Authorization::new(config_url, bearer))
    }

    pub fn invalid<R>(reason: R) -> Self
    where
        R: Into<String>,
    {
        Credentials::Invalid {
            reason: reason.into(),
        }
    }

    /// Interprets a raw authorization string as a tokenization key or a client
    /// token.
    pub fn from_authorization(raw: &str) -> Self {
        let raw = raw.trim();

        if is_tokenization_key(raw) {
            return match tokenization_key_config_url(raw) {
                Some(config_url) => Credentials::valid(config_url, Some(raw.to_string())),
                None => Credentials::invalid(format!(
                    "Tokenization key contains an unknown environment: {raw}"
                )),
            };
        }

        match ClientToken::decode(raw) {
            Some(token) => {
                Credentials::valid(token.config_url, Some(token.authorization_fingerprint))
            }
            None => Credentials::invalid(format!("Authorization provided is invalid: {raw}")),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, Credentials::Valid(_))
    }
}

impl FromStr for Credentials {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Credentials::from_authorization(s))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Environment {
    Development,
    Sandbox,
    Production,
}

impl Environment {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "development" => Some(Environment::Development),
            "sandbox" => Some(Environment::Sandbox),
            "production" => Some(Environment::Production),
            _ => None,
        }
    }

    fn base_url(&self) -> &'static str {
        match self {
            Environment::Development => "http://localhost:3000/",
            Environment::Sandbox => "https://api.sandbox.braintreegateway.com/",
            Environment::Production => "https://api.braintreegateway.com/",
        }
    }
}

// <environment>_<random>_<merchant id>, the merchant id may itself contain '_'.
fn is_tokenization_key(raw: &str) -> bool {
    let mut parts = raw.splitn(3, '_');
    let (Some(environment), Some(random), Some(merchant_id)) =
        (parts.next(), parts.next(), parts.next())
    else {
        return false;
    };

    let alphanumeric = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric());

    alphanumeric(environment)
        && alphanumeric(random)
        && !merchant_id.is_empty()
        && merchant_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn tokenization_key_config_url(raw: &str) -> Option<String> {
    let mut parts = raw.splitn(3, '_');
    let environment = Environment::from_name(parts.next()?)?;
    let merchant_id = parts.nth(1)?;

    Some(format!(
        "{}v1/merchants/{merchant_id}/client_api/v1/configuration",
        environment.base_url()
    ))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ClientToken {
    config_url: String,
    authorization_fingerprint: String,
}

impl ClientToken {
    fn decode(raw: &str) -> Option<Self> {
        let decoded = STANDARD.decode(raw.as_bytes()).ok()?;
        let token: ClientToken = serde_json::from_slice(&decoded).ok()?;
        if token.config_url.is_empty() || token.authorization_fingerprint.is_empty() {
            return None;
        }
        Some(token)
    }
}
