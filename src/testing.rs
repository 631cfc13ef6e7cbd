use crate::client::{Fetch, ProbeOutcome};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Scripted network: unknown URLs behave like a refused connection.
/// Requests are recorded as `"<METHOD> <url>"`.
#[derive(Default)]
pub struct FakeNetwork {
    responses: HashMap<String, ProbeOutcome>,
    requests: Mutex<Vec<String>>,
}

impl FakeNetwork {
    pub fn respond(self, url: &str, status: u16, body: &str) -> Self {
        self.script("GET", url, status, body)
    }

    pub fn respond_post(self, url: &str, status: u16, body: &str) -> Self {
        self.script("POST", url, status, body)
    }

    fn script(mut self, method: &str, url: &str, status: u16, body: &str) -> Self {
        self.responses.insert(
            format!("{} {}", method, url),
            ProbeOutcome::Response {
                body: body.to_string(),
                status,
            },
        );
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn answer(&self, key: String) -> ProbeOutcome {
        let outcome = self
            .responses
            .get(&key)
            .cloned()
            .unwrap_or_else(|| ProbeOutcome::error("Connection refused (os error 111)"));
        self.requests.lock().unwrap().push(key);
        outcome
    }
}

#[async_trait]
impl Fetch for FakeNetwork {
    async fn get(&self, url: &str) -> ProbeOutcome {
        self.answer(format!("GET {}", url))
    }

    async fn post(&self, url: &str, _body: String) -> ProbeOutcome {
        self.answer(format!("POST {}", url))
    }
}
