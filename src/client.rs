use async_trait::async_trait;
use hyper::client::HttpConnector;
use hyper::header::{HeaderValue, CONTENT_TYPE, USER_AGENT};
use hyper::{Body, Client, Method, Request, StatusCode};
use std::time::Duration;
use tokio::time;
use tracing::trace;

/// Status reported for requests that never produced a response.
pub const TRANSPORT_ERROR_STATUS: u16 = 400;

#[derive(Clone, Debug, PartialEq)]
pub enum ProbeOutcome {
    Response { body: String, status: u16 },
    Error { message: String },
}

impl ProbeOutcome {
    pub fn error(message: impl Into<String>) -> Self {
        ProbeOutcome::Error {
            message: message.into(),
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            ProbeOutcome::Response { status, .. } => *status,
            ProbeOutcome::Error { .. } => TRANSPORT_ERROR_STATUS,
        }
    }

    /// Response body, or `{"error": "<message>"}` for transport failures.
    pub fn payload(&self) -> String {
        match self {
            ProbeOutcome::Response { body, .. } => body.clone(),
            ProbeOutcome::Error { message } => serde_json::json!({ "error": message }).to_string(),
        }
    }

    /// The candidate accepted the join and is now an active peer.
    pub fn is_accepted(&self) -> bool {
        self.status() == StatusCode::CREATED.as_u16()
    }
}

#[async_trait]
pub trait Fetch: Send + Sync {
    /// GET `url`. Never fails: transport problems come back as `ProbeOutcome::Error`.
    async fn get(&self, url: &str) -> ProbeOutcome;

    /// POST a JSON `body` to `url`, with the same failure handling as `get`.
    async fn post(&self, url: &str, body: String) -> ProbeOutcome;
}

pub struct HttpFetcher {
    client: Client<HttpConnector, Body>,
    timeout: Duration,
    user_agent: HeaderValue,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(timeout));
        let client = Client::builder().build(connector);

        let version = env!("CARGO_PKG_VERSION");
        let build = option_env!("GIT_COMMIT_HASH").unwrap_or("unknown");
        let user_agent = HeaderValue::from_str(&format!("dino/{} ({})", version, build))
            .unwrap_or_else(|_| HeaderValue::from_static("dino"));

        Self {
            client,
            timeout,
            user_agent,
        }
    }

    async fn request(&self, method: Method, url: &str, body: Body) -> Result<(u16, String), String> {
        let mut builder = Request::builder()
            .method(method.clone())
            .uri(url)
            .header(USER_AGENT, self.user_agent.clone());
        if method == Method::POST {
            builder = builder.header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        let req = builder.body(body).map_err(|e| e.to_string())?;

        let resp = self.client.request(req).await.map_err(|e| e.to_string())?;
        let status = resp.status().as_u16();
        let bytes = hyper::body::to_bytes(resp.into_body())
            .await
            .map_err(|e| e.to_string())?;

        Ok((status, String::from_utf8_lossy(&bytes).into_owned()))
    }

    async fn send(&self, method: Method, url: &str, body: Body) -> ProbeOutcome {
        match time::timeout(self.timeout, self.request(method.clone(), url, body)).await {
            Ok(Ok((status, body))) => {
                trace!("{} {} -> HTTP {}", method, url, status);
                ProbeOutcome::Response { body, status }
            }
            Ok(Err(message)) => {
                trace!("{} {} failed: {}", method, url, message);
                ProbeOutcome::Error { message }
            }
            Err(_) => {
                trace!("{} {} timed out", method, url);
                ProbeOutcome::error(format!(
                    "request to {} timed out after {}ms",
                    url,
                    self.timeout.as_millis()
                ))
            }
        }
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn get(&self, url: &str) -> ProbeOutcome {
        self.send(Method::GET, url, Body::empty()).await
    }

    async fn post(&self, url: &str, body: String) -> ProbeOutcome {
        self.send(Method::POST, url, Body::from(body)).await
    }
}
