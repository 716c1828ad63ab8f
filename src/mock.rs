use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard},
    time::{Duration, Instant},
};

use bytes::Bytes;
use reqwest::Method;
use serde::Serialize;
use sonic_rs::to_vec;

use super::adapter::{
    RestBytes, RestError, RestFuture, RestRequest, RestResponse, RestResult,
    RestTransport,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MockTransportState {
    Idle,
    Busy,
    Error,
}

#[derive(Clone, Debug, Default)]
pub enum MockBehavior {
    /// Answer from the queued responses.
    #[default]
    Pass,
    Reject {
        status: u16,
        reason: String,
    },
    ConnectError {
        status: Option<u16>,
        reason: String,
    },
    SendError {
        status: Option<u16>,
        reason: String,
    },
    ReceiveError {
        status: Option<u16>,
        reason: String,
    },
    TimeoutError {
        status: Option<u16>,
        reason: String,
    },
    InternalError {
        reason: String,
    },
    Drop,
}

impl MockBehavior {
    pub fn pass() -> Self {
        Self::Pass
    }

    pub fn reject(status: u16, reason: impl Into<String>) -> Self {
        Self::Reject {
            status,
            reason: reason.into(),
        }
    }

    pub fn connect_error(reason: impl Into<String>, status: Option<u16>) -> Self {
        Self::ConnectError {
            status,
            reason: reason.into(),
        }
    }

    pub fn send_error(reason: impl Into<String>, status: Option<u16>) -> Self {
        Self::SendError {
            status,
            reason: reason.into(),
        }
    }

    pub fn receive_error(reason: impl Into<String>, status: Option<u16>) -> Self {
        Self::ReceiveError {
            status,
            reason: reason.into(),
        }
    }

    pub fn timeout_error(reason: impl Into<String>, status: Option<u16>) -> Self {
        Self::TimeoutError {
            status,
            reason: reason.into(),
        }
    }

    pub fn internal_error(reason: impl Into<String>) -> Self {
        Self::InternalError {
            reason: reason.into(),
        }
    }

    pub fn drop_response() -> Self {
        Self::Drop
    }
}

/// Behaviors consumed one per request, in order. An exhausted plan passes.
#[derive(Clone, Debug, Default)]
pub struct MockBehaviorPlan {
    request: VecDeque<MockBehavior>,
}

impl MockBehaviorPlan {
    pub fn push(&mut self, behavior: MockBehavior) -> &mut Self {
        self.request.push_back(behavior);
        self
    }

    pub fn pop(&mut self) -> MockBehavior {
        self.request.pop_front().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.request.len()
    }

    pub fn is_empty(&self) -> bool {
        self.request.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct MockResponse {
    pub status: u16,
    pub headers: Vec<(String, RestBytes)>,
    pub body: RestBytes,
}

impl MockResponse {
    pub fn new(status: u16, body: impl Into<RestBytes>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<RestBytes>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn text(status: u16, body: impl Into<String>) -> Self {
        Self::new(status, body.into())
    }

    pub fn json<T: Serialize + ?Sized>(status: u16, payload: &T) -> RestResult<Self> {
        let body = to_vec(payload)?;
        Ok(Self::new(status, body))
    }
}

#[derive(Clone, Debug)]
pub struct MockRestStateSnapshot {
    pub state: MockTransportState,
    pub request_count: usize,
    pub last_url: Option<String>,
    pub last_status: Option<u16>,
    pub behavior_remaining: usize,
    pub response_queue_len: usize,
    pub route_queue_len: usize,
    pub inbound_count: usize,
    pub outbound_count: usize,
    pub elapsed_total: Duration,
    pub last_error: Option<String>,
}

#[derive(Debug)]
struct MockRestAdapterState {
    state: MockTransportState,
    request_count: usize,
    last_url: Option<String>,
    last_status: Option<u16>,
    behavior_plan: MockBehaviorPlan,
    default_response_queue: VecDeque<MockResponse>,
    route_response_queues: HashMap<(Method, String), VecDeque<MockResponse>>,
    outbound_log: Vec<RestRequest>,
    inbound_log: Vec<RestResponse>,
    last_error: Option<String>,
    elapsed_total: Duration,
}

impl MockRestAdapterState {
    fn snapshot(&self) -> MockRestStateSnapshot {
        MockRestStateSnapshot {
            state: self.state,
            request_count: self.request_count,
            last_url: self.last_url.clone(),
            last_status: self.last_status,
            behavior_remaining: self.behavior_plan.len(),
            response_queue_len: self.default_response_queue.len(),
            route_queue_len: self.route_response_queues.values().map(VecDeque::len).sum(),
            inbound_count: self.inbound_log.len(),
            outbound_count: self.outbound_log.len(),
            elapsed_total: self.elapsed_total,
            last_error: self.last_error.clone(),
        }
    }

    fn next_response(&mut self, request: &RestRequest) -> Option<MockResponse> {
        let route_key = (request.method.clone(), request.url.clone());
        if let Some(response) = self
            .route_response_queues
            .get_mut(&route_key)
            .and_then(VecDeque::pop_front)
        {
            return Some(response);
        }
        self.default_response_queue.pop_front()
    }
}

impl Default for MockRestAdapterState {
    fn default() -> Self {
        Self {
            state: MockTransportState::Idle,
            request_count: 0,
            last_url: None,
            last_status: None,
            behavior_plan: MockBehaviorPlan::default(),
            default_response_queue: VecDeque::new(),
            route_response_queues: HashMap::new(),
            outbound_log: Vec::new(),
            inbound_log: Vec::new(),
            last_error: None,
            elapsed_total: Duration::ZERO,
        }
    }
}

/// In-memory [`RestTransport`] that records every request it sees and answers
/// from queued responses or scripted failures. Clones share state, so a test
/// can keep one handle for assertions and give another to a [`crate::Client`].
#[derive(Clone, Debug, Default)]
pub struct MockRestAdapter {
    state: Arc<Mutex<MockRestAdapterState>>,
}

impl MockRestAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_behavior_plan(behavior_plan: MockBehaviorPlan) -> Self {
        let state = MockRestAdapterState {
            behavior_plan,
            ..MockRestAdapterState::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockRestAdapterState> {
        self.state.lock().expect("mock transport mutex poisoned")
    }

    pub fn snapshot(&self) -> MockRestStateSnapshot {
        self.lock().snapshot()
    }

    pub fn queue_response(&self, response: MockResponse) {
        self.lock().default_response_queue.push_back(response);
    }

    pub fn queue_response_for(&self, method: Method, url: impl Into<String>, response: MockResponse) {
        self.lock()
            .route_response_queues
            .entry((method, url.into()))
            .or_default()
            .push_back(response);
    }

    pub fn queue_post_response(&self, url: impl Into<String>, response: MockResponse) {
        self.queue_response_for(Method::POST, url, response);
    }

    pub fn queue_error_json<T: Serialize + ?Sized>(
        &self,
        url: impl Into<String>,
        status: u16,
        payload: &T,
    ) -> RestResult<()> {
        let response = MockResponse::json(status, payload)?;
        self.queue_post_response(url, response);
        Ok(())
    }

    /// Every request the adapter has seen, oldest first.
    pub fn outbound_requests(&self) -> Vec<RestRequest> {
        self.lock().outbound_log.clone()
    }

    pub fn outbound_count(&self) -> usize {
        self.lock().outbound_log.len()
    }

    pub fn inbound_count(&self) -> usize {
        self.lock().inbound_log.len()
    }

    pub fn clear_logs(&self) {
        let mut state = self.lock();
        state.outbound_log.clear();
        state.inbound_log.clear();
    }

    fn begin(&self, request: &RestRequest) -> MockBehavior {
        let mut state = self.lock();
        state.outbound_log.push(request.clone());
        state.request_count += 1;
        state.last_url = Some(request.url.clone());
        state.state = MockTransportState::Busy;
        state.last_error = None;
        state.behavior_plan.pop()
    }

    fn fail(&self, error: RestError) -> RestError {
        let mut state = self.lock();
        state.state = MockTransportState::Error;
        state.last_error = Some(error.message().to_string());
        state.last_status = error.status();
        error
    }

    fn respond(&self, request: &RestRequest, start: Instant) -> RestResponse {
        let mut state = self.lock();
        let (status, headers, body) = match state.next_response(request) {
            Some(response) => (response.status, response.headers, response.body),
            None => (200, Vec::new(), Bytes::new()),
        };
        let response = RestResponse {
            status,
            headers,
            body,
            elapsed: start.elapsed(),
        };
        state.inbound_log.push(response.clone());
        state.last_status = Some(status);
        state.state = MockTransportState::Idle;
        state.elapsed_total += response.elapsed;
        response
    }
}

impl RestTransport for MockRestAdapter {
    fn execute(&self, request: RestRequest) -> RestFuture<RestResult<RestResponse>> {
        let adapter = self.clone();
        Box::pin(async move {
            let start = Instant::now();
            let behavior = adapter.begin(&request);

            let error = match behavior {
                MockBehavior::Pass => return Ok(adapter.respond(&request, start)),
                MockBehavior::Drop => RestError::timeout("mock transport dropped response", None),
                MockBehavior::ConnectError { status, reason } => RestError::connect(reason, status),
                MockBehavior::SendError { status, reason } => RestError::send(reason, status),
                MockBehavior::ReceiveError { status, reason } => RestError::receive(reason, status),
                MockBehavior::TimeoutError { status, reason } => RestError::timeout(reason, status),
                MockBehavior::InternalError { reason } => RestError::internal(reason),
                MockBehavior::Reject { status, reason } => RestError::rejected(status, reason),
            };
            Err(adapter.fail(error))
        })
    }
}
