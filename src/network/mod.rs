//! Listen stream transports.
//!
//! The watch engine talks to the server through [`ListenTransport`]. Each
//! call to [`ListenTransport::open`] starts one bidirectional Listen call and
//! returns its two halves as a [`ListenStream`].
pub mod grpc;
pub mod local;

pub use grpc::*;
pub use local::*;


use futures::stream::BoxStream;
use futures::Stream;
use futures::StreamExt;
#[cfg(test)]
use mockall::automock;
use tokio::sync::mpsc;
use tonic::async_trait;

use crate::proto::ListenRequest;
use crate::proto::ListenResponse;
use crate::Result;
use crate::StreamError;

#[cfg_attr(test, automock)]
#[async_trait]
pub trait ListenTransport: Send + Sync + 'static {
    /// Opens a Listen call and sends `request` as its first message.
    ///
    /// # Errors
    /// - [`Error::Stream`](crate::Error::Stream) when the server rejects the call with a status
    /// - [`Error::Network`](crate::Error::Network) when no connection can be established
    async fn open(
        &self,
        request: ListenRequest,
    ) -> Result<ListenStream>;
}

/// Both directions of one open Listen call.
///
/// Dropping the stream cancels the call.
pub struct ListenStream {
    requests: Option<mpsc::Sender<ListenRequest>>,
    responses: BoxStream<'static, Result<ListenResponse>>,
}

impl ListenStream {
    pub fn new<S>(
        requests: mpsc::Sender<ListenRequest>,
        responses: S,
    ) -> Self
    where
        S: Stream<Item = Result<ListenResponse>> + Send + 'static,
    {
        Self {
            requests: Some(requests),
            responses: responses.boxed(),
        }
    }

    /// Next server message. `None` once the server has closed the stream.
    pub async fn next(&mut self) -> Option<Result<ListenResponse>> {
        self.responses.next().await
    }

    pub async fn write(
        &mut self,
        request: ListenRequest,
    ) -> Result<()> {
        let Some(requests) = &self.requests else {
            return Err(StreamError::Ended.into());
        };
        requests.send(request).await.map_err(|_| StreamError::Ended.into())
    }

    /// Half-closes the call; the server observes end of input.
    pub fn end(&mut self) {
        self.requests.take();
    }

    pub fn is_ended(&self) -> bool {
        self.requests.is_none()
    }
}

impl std::fmt::Debug for ListenStream {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ListenStream").field("ended", &self.is_ended()).finish()
    }
}
