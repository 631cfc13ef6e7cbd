use std::net::SocketAddr;

use async_stream::stream;
use futures_util::Stream;
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, trace};

/// Accepted connections paired with the remote address. Accept errors are
/// logged and skipped.
pub fn tcp_accept_stream(listener: TcpListener) -> impl Stream<Item = (TcpStream, SocketAddr)> {
    stream! {
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    trace!("accepted connection from {}", addr);
                    yield (stream, addr);
                }
                Err(e) => {
                    error!("TCP accept error: {}", e);
                    continue;
                }
            }
        }
    }
}
