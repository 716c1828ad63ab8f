use std::borrow::Cow;

use serde::Serialize;
use serde::de::DeserializeOwned;
use sonic_rs::Value;

use crate::adapter::{Client, RestResult};

/// Deployed backend the login call talks to.
pub const API_BASE: &str = "https://backend-test-n4bo.vercel.app";
pub const LOGIN_PATH: &str = "/auth/login";

/// Submits `payload` to `POST {API_BASE}/auth/login` and returns the response
/// body unchanged: decoded JSON, or the body text when it is not JSON.
///
/// Transport failures and non-2xx statuses come back as the
/// [`RestError`](crate::RestError) of the underlying client. Exactly one
/// request is sent; nothing is retried.
pub async fn login_guru<P>(payload: &P) -> RestResult<Value>
where
    P: Serialize + ?Sized,
{
    login_guru_with(Client::new(), payload).await
}

/// [`login_guru`] over a caller-provided [`Client`].
pub async fn login_guru_with<P>(client: Client, payload: &P) -> RestResult<Value>
where
    P: Serialize + ?Sized,
{
    AuthClient::with_client(client).login(payload).await
}

#[derive(Clone)]
pub struct AuthClient {
    client: Client,
    base_url: Cow<'static, str>,
}

impl AuthClient {
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            base_url: Cow::Borrowed(API_BASE),
        }
    }

    /// Points the client at another deployment of the backend. The login path
    /// is appended as is, so `base_url` should not end with `/`.
    pub fn with_base_url(mut self, base_url: impl Into<Cow<'static, str>>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn login_url(&self) -> String {
        format!("{}{}", self.base_url, LOGIN_PATH)
    }

    pub async fn login<P, T>(&self, payload: &P) -> RestResult<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.login_url();
        log::trace!("login request to {url}");
        self.client.post_json_checked(url, payload).await
    }
}

impl Default for AuthClient {
    fn default() -> Self {
        Self::new()
    }
}
