use crate::client::Fetch;
use hyper::StatusCode;

pub fn base_url(base: &str) -> String {
    format!("http://{}/", base)
}

/// The discovery service at `base` answers `GET /` with exactly 200.
pub async fn is_live(fetch: &dyn Fetch, base: &str) -> bool {
    fetch.get(&base_url(base)).await.status() == StatusCode::OK.as_u16()
}
