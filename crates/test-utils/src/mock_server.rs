//! In-process HTTP server for provider client tests.
//!
//! Routes are matched on the request path only. Every request is recorded
//! so tests can assert on call counts, query strings and headers.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Canned response for one path.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
}

impl MockResponse {
    pub fn json(value: serde_json::Value) -> Self {
        Self {
            status: 200,
            content_type: "application/json".to_string(),
            body: value.to_string().into_bytes(),
        }
    }

    pub fn text(content_type: &str, body: &str) -> Self {
        Self {
            status: 200,
            content_type: content_type.to_string(),
            body: body.as_bytes().to_vec(),
        }
    }

    pub fn bytes(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            content_type: "application/octet-stream".to_string(),
            body,
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            content_type: "text/plain".to_string(),
            body: Vec::new(),
        }
    }
}

/// A request as seen by the server.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
}

#[derive(Default)]
struct MockState {
    routes: HashMap<String, MockResponse>,
    requests: Mutex<Vec<RecordedRequest>>,
}

/// Builder collecting routes before the server starts.
#[derive(Default)]
pub struct MockServerBuilder {
    routes: HashMap<String, MockResponse>,
}

impl MockServerBuilder {
    pub fn route(mut self, path: &str, response: MockResponse) -> Self {
        self.routes.insert(path.to_string(), response);
        self
    }

    pub fn json(self, path: &str, value: serde_json::Value) -> Self {
        self.route(path, MockResponse::json(value))
    }

    pub async fn start(self) -> MockServer {
        MockServer::start(self.routes).await
    }
}

/// Running mock server; shut down on drop.
pub struct MockServer {
    addr: SocketAddr,
    state: Arc<MockState>,
    handle: JoinHandle<()>,
}

impl MockServer {
    pub fn builder() -> MockServerBuilder {
        MockServerBuilder::default()
    }

    /// Bind to an ephemeral port on 127.0.0.1 and serve `routes`.
    ///
    /// Panics if the listener cannot be bound (test helper).
    pub async fn start(routes: HashMap<String, MockResponse>) -> Self {
        let state = Arc::new(MockState {
            routes,
            requests: Mutex::new(Vec::new()),
        });

        let app = Router::new().fallback(handle).with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("mock server address");

        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    /// Base URL without trailing slash, e.g. `http://127.0.0.1:41234`.
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    /// Number of requests received so far.
    pub fn hits(&self) -> usize {
        self.requests().len()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state
            .requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    pub fn hits_for(&self, path: &str) -> usize {
        self.requests().iter().filter(|r| r.path == path).count()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn handle(State(state): State<Arc<MockState>>, req: Request) -> Response {
    let path = req.uri().path().to_string();
    let recorded = RecordedRequest {
        path: path.clone(),
        query: req.uri().query().map(str::to_string),
        authorization: req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    };
    if let Ok(mut requests) = state.requests.lock() {
        requests.push(recorded);
    }

    match state.routes.get(&path) {
        Some(resp) => {
            let status = StatusCode::from_u16(resp.status).unwrap_or(StatusCode::OK);
            Response::builder()
                .status(status)
                .header(header::CONTENT_TYPE, resp.content_type.as_str())
                .body(Body::from(resp.body.clone()))
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
