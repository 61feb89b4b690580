//! Business registration number verification.
//!
//! The registry itself is an external service. Calls are slow and fallible and
//! are never retried here; callers decide what to do with a failure.

use std::time::Duration;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use url::Url;

const REGISTRY_TIMEOUT: Duration = Duration::from_secs(10);

/// A normalized 10-digit business registration number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusinessNumber(String);

impl BusinessNumber {
    /// Normalize user input such as `123-45-67890` and require exactly 10 digits.
    pub fn parse(raw: &str) -> Result<Self, RegistryError> {
        let digits: String = raw
            .chars()
            .filter(|c| !matches!(c, '-' | ' '))
            .collect();
        if digits.len() != 10 || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(RegistryError::InvalidNumber);
        }
        Ok(Self(digits))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Optional applicant details some registries match against.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Applicant {
    #[serde(default)]
    pub representative_name: Option<String>,
    /// Business opening date, `YYYYMMDD`
    #[serde(default)]
    pub opened_on: Option<String>,
}

/// Registry answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verification {
    pub is_valid: bool,
    #[serde(default)]
    pub message: String,
    /// Registry-specific status payload, passed through untouched.
    #[serde(default)]
    pub status: Option<serde_json::Value>,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("registration number must be 10 digits")]
    InvalidNumber,
    #[error("registry request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("registry answered with status {0}")]
    UnexpectedStatus(u16),
}

/// Verifies registration numbers against an external registry.
pub trait RegistryVerifier: Send + Sync {
    fn verify<'a>(
        &'a self,
        number: &'a BusinessNumber,
        applicant: &'a Applicant,
    ) -> BoxFuture<'a, Result<Verification, RegistryError>>;
}

/// Registry reached over HTTP: POSTs the number and applicant as JSON and
/// expects a [`Verification`] body back.
pub struct HttpRegistryVerifier {
    client: reqwest::Client,
    url: Url,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct RegistryRequest<'a> {
    registration_number: &'a str,
    #[serde(flatten)]
    applicant: &'a Applicant,
}

impl HttpRegistryVerifier {
    pub fn new(url: Url, api_key: Option<String>) -> Result<Self, RegistryError> {
        let client = reqwest::Client::builder()
            .timeout(REGISTRY_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            url,
            api_key,
        })
    }
}

impl RegistryVerifier for HttpRegistryVerifier {
    fn verify<'a>(
        &'a self,
        number: &'a BusinessNumber,
        applicant: &'a Applicant,
    ) -> BoxFuture<'a, Result<Verification, RegistryError>> {
        Box::pin(async move {
            let mut request = self.client.post(self.url.clone()).json(&RegistryRequest {
                registration_number: number.as_str(),
                applicant,
            });
            if let Some(key) = &self.api_key {
                request = request.bearer_auth(key);
            }

            let response = request.send().await?;
            if !response.status().is_success() {
                return Err(RegistryError::UnexpectedStatus(response.status().as_u16()));
            }
            Ok(response.json::<Verification>().await?)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes() {
        assert_eq!(
            BusinessNumber::parse("123-45-67890").unwrap().as_str(),
            "1234567890"
        );
        assert_eq!(
            BusinessNumber::parse(" 1234567890 ").unwrap().as_str(),
            "1234567890"
        );
    }

    #[test]
    fn test_parse_rejects_wrong_length_or_letters() {
        assert!(BusinessNumber::parse("123456789").is_err());
        assert!(BusinessNumber::parse("12345678901").is_err());
        assert!(BusinessNumber::parse("12345abcde").is_err());
        assert!(BusinessNumber::parse("").is_err());
    }

    #[test]
    fn test_request_shape() {
        let applicant = Applicant {
            representative_name: Some("Kim".to_string()),
            opened_on: None,
        };
        let body = serde_json::to_value(RegistryRequest {
            registration_number: "1234567890",
            applicant: &applicant,
        })
        .unwrap();

        assert_eq!(body["registration_number"], "1234567890");
        assert_eq!(body["representative_name"], "Kim");
    }
}
