use crate::accept_stream::tcp_accept_stream;
use crate::handlers::{handle_connection, DiscoveryService};
use crate::select_stream_or_shutdown::{select_stream_or_shutdown, GenericBoxedStream, Next};

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::task;
use tracing::info;

/// Serve the discovery service on `listener` until shutdown is signalled.
pub async fn serve(listener: TcpListener, service: DiscoveryService, shutdown_notify: Arc<Notify>) {
    let mut connections: GenericBoxedStream<(TcpStream, SocketAddr)> =
        Box::pin(tcp_accept_stream(listener));

    loop {
        match select_stream_or_shutdown(connections.as_mut(), &shutdown_notify).await {
            Next::Item((stream, remote)) => {
                task::spawn(handle_connection(stream, remote, service.clone()));
            }
            Next::Ended => {
                info!("Listener closed");
                break;
            }
            Next::Shutdown => {
                info!("Shutdown requested");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{Fetch, HttpFetcher};
    use crate::membership::{self, fetch_listing, ServiceRegistrar};
    use crate::peers::LeaveOutcome;
    use crate::probe::probe;
    use crate::store::MembershipStore;
    use crate::sweep::{SweepReport, Sweeper};
    use crate::testing::FakeNetwork;
    use std::net::SocketAddrV4;
    use std::time::Duration;

    #[tokio::test]
    async fn test_join_then_list_over_http() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let store = MembershipStore::open_temporary().unwrap();
        let shutdown = Arc::new(Notify::new());
        let server = tokio::spawn(serve(
            listener,
            DiscoveryService {
                store: store.clone(),
                port: addr.port(),
            },
            shutdown.clone(),
        ));

        let fetcher = HttpFetcher::new(Duration::from_secs(2));
        let candidate: SocketAddrV4 = format!("127.0.0.1:{}", addr.port()).parse().unwrap();

        for _ in 0..2 {
            let outcome = probe(&fetcher, candidate).await;
            assert_eq!(outcome.status(), 201);
        }

        let root = fetcher.get(&format!("http://{}/", addr)).await;
        assert_eq!(root.status(), 200);

        let listing = fetch_listing(&fetcher, &addr.to_string()).await.unwrap();
        assert_eq!(listing, vec![candidate.to_string()]);

        shutdown.notify_one();
        tokio::time::timeout(Duration::from_secs(2), server)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_sweep_and_leave_while_serving_store_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = MembershipStore::open(&dir.path().join("dino.db")).unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Arc::new(Notify::new());
        let server = tokio::spawn(serve(
            listener,
            DiscoveryService {
                store: store.clone(),
                port: addr.port(),
            },
            shutdown.clone(),
        ));

        // Neighbours are scripted; registration goes to the real service.
        let port = addr.port();
        let neighbours = Arc::new(
            FakeNetwork::default()
                .respond(&format!("http://127.0.0.1:{}/", port), 200, "[]")
                .respond(&format!("http://127.0.0.5:{}/join", port), 201, "{}"),
        );
        let fetcher = Arc::new(HttpFetcher::new(Duration::from_secs(2)));
        let registrar = Arc::new(ServiceRegistrar::new(fetcher.clone(), addr.to_string()));
        let local: SocketAddrV4 = format!("127.0.0.1:{}", port).parse().unwrap();
        let sweeper = Sweeper::new(neighbours, registrar, local, 16);

        let peer = format!("127.0.0.5:{}", port);
        match sweeper.sweep(&Notify::new()).await {
            SweepReport::Finished(summary) => {
                assert_eq!(summary.registered, 1);
                assert_eq!(summary.failures, 0);
            }
            other => panic!("unexpected report {:?}", other),
        }
        assert_eq!(store.addresses().unwrap(), vec![peer.clone()]);

        let outcome = membership::leave(fetcher.as_ref(), &addr.to_string(), &peer)
            .await
            .unwrap();
        assert_eq!(outcome, LeaveOutcome::Left(peer.clone()));
        assert!(store.is_empty());

        let again = membership::leave(fetcher.as_ref(), &addr.to_string(), &peer)
            .await
            .unwrap();
        assert_eq!(again, LeaveOutcome::NotConnected(peer));

        shutdown.notify_one();
        tokio::time::timeout(Duration::from_secs(2), server)
            .await
            .unwrap()
            .unwrap();
    }
}
