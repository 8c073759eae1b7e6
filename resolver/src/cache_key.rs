use base64::{Engine as _, engine::general_purpose::URL_SAFE};
use std::fmt;

/// Key under which a resolved configuration is stored.
///
/// Derived from the full configuration URL (including the version query
/// parameter) and the bearer token, so two authorizations pointing at the same
/// endpoint and version with the same token always share an entry. The URL-safe
/// alphabet keeps the key usable as a storage key without further escaping.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn derive(url: &str, bearer: Option<&str>) -> Self {
        let bearer = bearer.unwrap_or_default();
        let mut raw = String::with_capacity(url.len() + bearer.len());
        raw.push_str(url);
        raw.push_str(bearer);

        CacheKey(URL_SAFE.encode(raw.as_bytes()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the url and bearer concatenation the key was derived from.
    pub fn decode(&self) -> Result<String, CacheKeyError> {
        let bytes = URL_SAFE.decode(self.0.as_bytes())?;
        Ok(String::from_utf8(bytes)?)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CacheKeyError {
    #[error("Invalid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}
