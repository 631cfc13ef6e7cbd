use crate::client::{Fetch, ProbeOutcome};
use std::net::SocketAddrV4;

pub fn join_url(candidate: SocketAddrV4) -> String {
    format!("http://{}/join", candidate)
}

/// Ask `candidate` to join. Side-effect free: registering an accepted peer
/// is left to the caller.
pub async fn probe(fetch: &dyn Fetch, candidate: SocketAddrV4) -> ProbeOutcome {
    fetch.get(&join_url(candidate)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_url() {
        let candidate: SocketAddrV4 = "192.168.1.17:5000".parse().unwrap();
        assert_eq!(join_url(candidate), "http://192.168.1.17:5000/join");
    }
}
