use futures_util::Stream;
use futures_util::StreamExt;
use std::pin::Pin;
use tokio::sync::Notify;

pub type GenericBoxedStream<T> = Pin<Box<dyn Stream<Item = T> + Send>>;

#[derive(Debug, PartialEq)]
pub enum Next<T> {
    Item(T),
    Ended,
    Shutdown,
}

/// Await the next item from a stream or a shutdown signal, whichever comes first.
pub async fn select_stream_or_shutdown<T>(
    mut stream: Pin<&mut (dyn Stream<Item = T> + Send)>,
    shutdown_notify: &Notify,
) -> Next<T> {
    tokio::select! {
        item = stream.next() => match item {
            Some(item) => Next::Item(item),
            None => Next::Ended,
        },
        _ = shutdown_notify.notified() => Next::Shutdown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    #[tokio::test]
    async fn test_yields_then_ends() {
        let notify = Notify::new();
        let mut items: GenericBoxedStream<u8> = Box::pin(stream::iter(vec![1, 2]));

        assert_eq!(select_stream_or_shutdown(items.as_mut(), &notify).await, Next::Item(1));
        assert_eq!(select_stream_or_shutdown(items.as_mut(), &notify).await, Next::Item(2));
        assert_eq!(select_stream_or_shutdown(items.as_mut(), &notify).await, Next::Ended);
    }

    #[tokio::test]
    async fn test_shutdown_wins_over_pending_stream() {
        let notify = Notify::new();
        notify.notify_one();
        let mut pending: GenericBoxedStream<u8> = Box::pin(stream::pending());

        assert_eq!(select_stream_or_shutdown(pending.as_mut(), &notify).await, Next::Shutdown);
    }
}
