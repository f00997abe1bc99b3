use axum::body::{Body, Bytes};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::Stream;
use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

/// Bare 200 whose empty body signals the returned receiver once the server has finished
/// with it: polled to the end after the head is written, or dropped.
pub fn acknowledgment() -> (Response, oneshot::Receiver<()>) {
    let (sender, receiver) = oneshot::channel();
    let body = Body::from_stream(AckSignal {
        sender: Some(sender),
    });

    ((StatusCode::OK, body).into_response(), receiver)
}

struct AckSignal {
    sender: Option<oneshot::Sender<()>>,
}
impl AckSignal {
    fn fire(&mut self) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(());
        }
    }
}
impl Stream for AckSignal {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().fire();
        Poll::Ready(None)
    }
}
impl Drop for AckSignal {
    fn drop(&mut self) {
        self.fire();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_signal_waits_for_body() {
        let (response, mut acknowledged) = acknowledgment();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(acknowledged.try_recv().is_err());

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(body.is_empty());
        assert!(acknowledged.await.is_ok());
    }

    #[tokio::test]
    async fn test_signal_on_drop() {
        let (response, acknowledged) = acknowledgment();
        drop(response);
        assert!(acknowledged.await.is_ok());
    }
}
