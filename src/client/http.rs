//! Session client speaking to the `api/auth` endpoints over HTTP.
//!
//! Cookies live in the client's own cookie store, the way a browser keeps
//! them; the client never looks inside the tokens.

use futures::future::BoxFuture;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;

use super::transport::{SessionTransport, TransportError};
use crate::api::UserProfile;
use crate::auth::Identity;
use crate::entitlements::EntitlementSet;

/// Signed-in user as returned by login and signup.
#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    pub user: UserProfile,
    pub entitlements: EntitlementSet,
}

/// Identity as returned by `/api/auth/me`.
#[derive(Debug, Clone, Deserialize)]
pub struct WhoAmI {
    pub user: Identity,
    pub entitlements: EntitlementSet,
}

pub struct HttpSessionClient {
    client: Client,
    base: Url,
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            TransportError::Decode(e.to_string())
        } else {
            TransportError::Network(e.to_string())
        }
    }
}

impl HttpSessionClient {
    /// `base` is where the server is mounted, e.g. `https://host/` or
    /// `https://host/app/`. A missing trailing slash is added so endpoint
    /// paths resolve below it.
    pub fn new(mut base: Url) -> Result<Self, TransportError> {
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let client = Client::builder().cookie_store(true).build()?;
        Ok(Self { client, base })
    }

    fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        self.base
            .join(path)
            .map_err(|e| TransportError::Network(e.to_string()))
    }

    fn check(response: Response) -> Result<Response, TransportError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(TransportError::from_status(status.as_u16()))
        }
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, TransportError> {
        let response = self
            .client
            .post(self.endpoint(path)?)
            .json(&body)
            .send()
            .await?;
        Ok(Self::check(response)?.json::<T>().await?)
    }

    async fn post_empty(&self, path: &str) -> Result<(), TransportError> {
        let response = self.client.post(self.endpoint(path)?).send().await?;
        Self::check(response)?;
        Ok(())
    }

    pub async fn signup(
        &self,
        email: &str,
        password: &str,
        name: &str,
    ) -> Result<Session, TransportError> {
        self.post_json(
            "api/auth/signup",
            serde_json::json!({ "email": email, "password": password, "name": name }),
        )
        .await
    }

    pub async fn login(
        &self,
        email: &str,
        password: &str,
        remember: bool,
    ) -> Result<Session, TransportError> {
        self.post_json(
            "api/auth/login",
            serde_json::json!({ "email": email, "password": password, "remember": remember }),
        )
        .await
    }

    pub async fn me(&self) -> Result<WhoAmI, TransportError> {
        let response = self.client.get(self.endpoint("api/auth/me")?).send().await?;
        Ok(Self::check(response)?.json::<WhoAmI>().await?)
    }
}

impl SessionTransport for HttpSessionClient {
    fn refresh(&self) -> BoxFuture<'_, Result<(), TransportError>> {
        Box::pin(self.post_empty("api/auth/refresh"))
    }

    fn logout(&self) -> BoxFuture<'_, Result<(), TransportError>> {
        Box::pin(self.post_empty("api/auth/logout"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(base: &str, path: &str) -> String {
        HttpSessionClient::new(Url::parse(base).unwrap())
            .unwrap()
            .endpoint(path)
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_endpoints_resolve_below_base_path() {
        assert_eq!(
            endpoint("http://127.0.0.1:3000", "api/auth/refresh"),
            "http://127.0.0.1:3000/api/auth/refresh"
        );
        assert_eq!(
            endpoint("https://example.com/app/", "api/auth/refresh"),
            "https://example.com/app/api/auth/refresh"
        );
        assert_eq!(
            endpoint("https://example.com/app", "api/auth/logout"),
            "https://example.com/app/api/auth/logout"
        );
    }
}
