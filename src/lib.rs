//! Async login client for the guru backend, built on a thin zero-copy wrapper
//! around reqwest with an in-memory mock transport for deterministic tests.

pub mod adapter;
pub mod auth;
pub mod mock;

pub use reqwest::Method;

pub use adapter::{
    Client, ReqwestTransport, RestBytes, RestError, RestErrorKind, RestFuture, RestRequest,
    RestResponse, RestResult, RestTransport,
};
pub use auth::{API_BASE, AuthClient, LOGIN_PATH, login_guru, login_guru_with};
pub use mock::{
    MockBehavior, MockBehaviorPlan, MockResponse, MockRestAdapter, MockRestStateSnapshot,
    MockTransportState,
};
