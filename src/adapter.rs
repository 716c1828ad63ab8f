use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    time::{Duration, Instant},
};

use bytes::Bytes;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Client as ReqwestClient, Method};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sonic_rs::{from_slice, to_vec};

pub type RestBytes = Bytes;
pub type RestFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;
pub type RestResult<T> = Result<T, RestError>;

const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RestErrorKind {
    Connect,
    Send,
    Receive,
    Timeout,
    /// The server answered with a non-2xx status.
    Rejected,
    Parse,
    Internal,
}

#[derive(Clone, Debug, thiserror::Error)]
#[error("rest error {kind:?} status={status:?} {message}")]
pub struct RestError {
    kind: RestErrorKind,
    status: Option<u16>,
    message: String,
    body: Option<RestBytes>,
}

impl RestError {
    pub fn new(kind: RestErrorKind, status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            kind,
            status,
            message: message.into(),
            body: None,
        }
    }

    pub fn connect(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::new(RestErrorKind::Connect, status, message)
    }

    pub fn send(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::new(RestErrorKind::Send, status, message)
    }

    pub fn receive(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::new(RestErrorKind::Receive, status, message)
    }

    pub fn timeout(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::new(RestErrorKind::Timeout, status, message)
    }

    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::new(RestErrorKind::Rejected, Some(status), message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(RestErrorKind::Internal, None, message)
    }

    /// Builds the error for a response whose status is outside `200..300`,
    /// keeping the raw body so callers can inspect what the server sent.
    pub fn from_response(response: RestResponse) -> Self {
        let message = String::from_utf8_lossy(&response.body).into_owned();
        Self {
            kind: RestErrorKind::Rejected,
            status: Some(response.status),
            message,
            body: Some(response.body),
        }
    }

    fn from_reqwest(kind: RestErrorKind, err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            RestErrorKind::Timeout
        } else if err.is_connect() {
            RestErrorKind::Connect
        } else {
            kind
        };
        Self::new(kind, err.status().map(|s| s.as_u16()), err.to_string())
    }

    pub fn from_json(err: sonic_rs::Error) -> Self {
        Self::new(RestErrorKind::Parse, None, err.to_string())
    }

    /// A body from `response` that could not be decoded. Status and body stay
    /// attached so the caller still sees what the server sent.
    fn undecodable(err: sonic_rs::Error, response: &RestResponse) -> Self {
        Self {
            kind: RestErrorKind::Parse,
            status: Some(response.status),
            message: err.to_string(),
            body: Some(response.body.clone()),
        }
    }

    pub fn kind(&self) -> RestErrorKind {
        self.kind
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn body(&self) -> Option<&[u8]> {
        self.body.as_deref()
    }
}

impl From<sonic_rs::Error> for RestError {
    fn from(err: sonic_rs::Error) -> Self {
        Self::from_json(err)
    }
}

#[derive(Clone, Debug)]
pub struct RestRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, RestBytes)>,
    pub body: Option<RestBytes>,
    pub timeout: Option<Duration>,
}

impl RestRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<RestBytes>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<RestBytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serializes `payload` as the body and marks it as JSON.
    pub fn with_json<T: Serialize + ?Sized>(self, payload: &T) -> RestResult<Self> {
        let body = to_vec(payload)?;
        Ok(self
            .with_header(CONTENT_TYPE.as_str(), Bytes::from_static(JSON_CONTENT_TYPE.as_bytes()))
            .with_body(body))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn header(&self, key: &str) -> Option<&[u8]> {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value.as_ref())
    }
}

#[derive(Clone, Debug)]
pub struct RestResponse {
    pub status: u16,
    pub headers: Vec<(String, RestBytes)>,
    pub body: RestBytes,
    pub elapsed: Duration,
}

impl RestResponse {
    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn json<T: DeserializeOwned>(&self) -> RestResult<T> {
        from_slice(&self.body).map_err(|err| RestError::undecodable(err, self))
    }

    /// Decodes the body as JSON when it parses, otherwise as the body text
    /// itself (an empty body is the empty string). `T = sonic_rs::Value`
    /// therefore never fails; a typed `T` that fits neither is a parse error.
    pub fn data<T: DeserializeOwned>(&self) -> RestResult<T> {
        let err = match from_slice::<T>(&self.body) {
            Ok(data) => return Ok(data),
            Err(err) => err,
        };
        let text = String::from_utf8_lossy(&self.body);
        to_vec(&*text)
            .and_then(|quoted| from_slice::<T>(&quoted))
            .map_err(|_| RestError::undecodable(err, self))
    }

    pub fn error_for_status(self) -> RestResult<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(RestError::from_response(self))
        }
    }
}

pub trait RestTransport: Send + Sync {
    fn execute(&self, request: RestRequest) -> RestFuture<RestResult<RestResponse>>;
}

type SharedRestTransport = dyn RestTransport + Send + Sync;

#[derive(Clone)]
pub struct Client {
    transport: Arc<SharedRestTransport>,
}

impl Client {
    pub fn new() -> Self {
        Self::with_transport(ReqwestTransport::new())
    }

    pub fn with_transport<T>(transport: T) -> Self
    where
        T: RestTransport + 'static,
    {
        Self {
            transport: Arc::new(transport),
        }
    }

    pub async fn execute(&self, request: RestRequest) -> RestResult<RestResponse> {
        self.transport.execute(request).await
    }

    /// Like [`Client::execute`], but a non-2xx status is an error.
    pub async fn execute_checked(&self, request: RestRequest) -> RestResult<RestResponse> {
        self.execute(request).await?.error_for_status()
    }

    pub async fn execute_json_checked<T>(&self, request: RestRequest) -> RestResult<T>
    where
        T: DeserializeOwned,
    {
        self.execute_checked(request).await?.json::<T>()
    }

    pub async fn post(
        &self,
        url: impl Into<String>,
        body: impl Into<RestBytes>,
    ) -> RestResult<RestResponse> {
        self.execute(RestRequest::post(url).with_body(body)).await
    }

    pub async fn post_json<P: Serialize + ?Sized>(
        &self,
        url: impl Into<String>,
        payload: &P,
    ) -> RestResult<RestResponse> {
        let request = RestRequest::post(url).with_json(payload)?;
        self.execute(request).await
    }

    pub async fn post_json_checked<P, T>(&self, url: impl Into<String>, payload: &P) -> RestResult<T>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = RestRequest::post(url).with_json(payload)?;
        self.execute_checked(request).await?.data::<T>()
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: ReqwestClient,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            client: ReqwestClient::new(),
        }
    }

    pub fn with_client(client: ReqwestClient) -> Self {
        Self { client }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl RestTransport for ReqwestTransport {
    fn execute(&self, request: RestRequest) -> RestFuture<RestResult<RestResponse>> {
        let client = self.client.clone();
        Box::pin(async move {
            let start = Instant::now();
            log::debug!("{} {}", request.method, request.url);
            let mut req = client.request(request.method.clone(), &request.url);

            for (key, value) in request.headers {
                let value = HeaderValue::from_bytes(value.as_ref())
                    .map_err(|err| RestError::internal(err.to_string()))?;
                req = req.header(key, value);
            }

            if let Some(body) = request.body {
                req = req.body(body);
            }

            if let Some(timeout) = request.timeout {
                req = req.timeout(timeout);
            }

            let resp = req.send().await.map_err(|err| {
                log::debug!("{} {} failed: {}", request.method, request.url, err);
                RestError::from_reqwest(RestErrorKind::Send, err)
            })?;

            let status = resp.status().as_u16();
            let headers = resp
                .headers()
                .iter()
                .map(|(name, value)| (name.to_string(), Bytes::copy_from_slice(value.as_ref())))
                .collect();
            let body = resp
                .bytes()
                .await
                .map_err(|err| RestError::from_reqwest(RestErrorKind::Receive, err))?;
            let elapsed = start.elapsed();
            log::debug!(
                "{} {} -> {} in {:?}",
                request.method,
                request.url,
                status,
                elapsed
            );

            Ok(RestResponse {
                status,
                headers,
                body,
                elapsed,
            })
        })
    }
}
