use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;
use std::str::FromStr;

#[derive(thiserror::Error, Debug)]
pub enum ParseError {
    #[error("configuration is not valid JSON: {0}")]
    Json(#[source] serde_json::Error),
    #[error("configuration must be a JSON object")]
    NotAnObject,
    #[error("configuration is missing required fields: {0}")]
    Schema(#[source] serde_json::Error),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RequiredFields {
    client_api_url: String,
    environment: String,
    merchant_id: String,
}

/// Remote configuration returned by the configuration endpoint.
///
/// The whole document is retained so that serializing a parsed configuration
/// yields every field of the original, including ones this crate does not
/// interpret.
#[derive(Clone, Debug, PartialEq)]
pub struct Configuration {
    document: Value,
    client_api_url: String,
    environment: String,
    merchant_id: String,
}

impl Configuration {
    pub fn from_json(text: &str) -> Result<Self, ParseError> {
        let document: Value = serde_json::from_str(text).map_err(ParseError::Json)?;
        if !document.is_object() {
            return Err(ParseError::NotAnObject);
        }

        let required = RequiredFields::deserialize(&document).map_err(ParseError::Schema)?;

        Ok(Configuration {
            document,
            client_api_url: required.client_api_url,
            environment: required.environment,
            merchant_id: required.merchant_id,
        })
    }

    pub fn to_json(&self) -> String {
        self.document.to_string()
    }

    pub fn client_api_url(&self) -> &str {
        &self.client_api_url
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn merchant_id(&self) -> &str {
        &self.merchant_id
    }

    /// Raw access to any top level field of the document.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.document.get(field)
    }
}

impl FromStr for Configuration {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Configuration::from_json(s)
    }
}

impl Serialize for Configuration {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.document.serialize(serializer)
    }
}
