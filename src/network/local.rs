//! In-process Listen transport.
//!
//! [`local_listen_channel`] returns a connected client/server pair. The client
//! half implements [`ListenTransport`]; the server half accepts every stream
//! the client opens and scripts its responses. It backs emulators and tests
//! that need a Listen server without a network.

use std::collections::VecDeque;
use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tonic::async_trait;
use tonic::Status;
use tracing::debug;

use super::ListenStream;
use super::ListenTransport;
use crate::proto::ListenRequest;
use crate::proto::ListenResponse;
use crate::Error;
use crate::NetworkError;
use crate::Result;

const LOCAL_REQUEST_BUFFER: usize = 16;

pub fn local_listen_channel() -> (LocalListenTransport, LocalListenServer) {
    let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
    let failures = Arc::new(Mutex::new(VecDeque::new()));

    (
        LocalListenTransport {
            incoming: incoming_tx,
            failures: failures.clone(),
        },
        LocalListenServer {
            incoming: incoming_rx,
            failures,
        },
    )
}

#[derive(Clone)]
pub struct LocalListenTransport {
    incoming: mpsc::UnboundedSender<ServerStream>,
    failures: Arc<Mutex<VecDeque<Status>>>,
}

pub struct LocalListenServer {
    incoming: mpsc::UnboundedReceiver<ServerStream>,
    failures: Arc<Mutex<VecDeque<Status>>>,
}

/// Server side of one Listen call
pub struct ServerStream {
    requests: mpsc::Receiver<ListenRequest>,
    responses: Option<mpsc::UnboundedSender<std::result::Result<ListenResponse, Status>>>,
}

#[async_trait]
impl ListenTransport for LocalListenTransport {
    async fn open(
        &self,
        request: ListenRequest,
    ) -> Result<ListenStream> {
        if let Some(status) = self.failures.lock().pop_front() {
            debug!(code = ?status.code(), "local open rejected");
            return Err(status.into());
        }

        let (request_tx, request_rx) = mpsc::channel(LOCAL_REQUEST_BUFFER);
        let (response_tx, response_rx) = mpsc::unbounded_channel();
        request_tx
            .send(request)
            .await
            .map_err(|_| NetworkError::ServiceUnavailable("local listen call closed".to_string()))?;

        self.incoming
            .send(ServerStream {
                requests: request_rx,
                responses: Some(response_tx),
            })
            .map_err(|_| NetworkError::ServiceUnavailable("local listen server is gone".to_string()))?;

        let responses = UnboundedReceiverStream::new(response_rx).map(|item| item.map_err(Error::from));
        Ok(ListenStream::new(request_tx, responses))
    }
}

impl LocalListenServer {
    /// Waits for the client to open the next stream.
    pub async fn accept(&mut self) -> Option<ServerStream> {
        self.incoming.recv().await
    }

    /// Rejects the client's next `open` with `status`. Calls queue up.
    pub fn fail_next_open(
        &self,
        status: Status,
    ) {
        self.failures.lock().push_back(status);
    }
}

impl ServerStream {
    /// Next client message; `None` after the client ended or dropped the call.
    pub async fn request(&mut self) -> Option<ListenRequest> {
        self.requests.recv().await
    }

    /// Returns `false` when the client is no longer listening.
    pub fn send(
        &self,
        response: ListenResponse,
    ) -> bool {
        match &self.responses {
            Some(responses) => responses.send(Ok(response)).is_ok(),
            None => false,
        }
    }

    /// Terminates the call with `status`.
    pub fn fail(
        &mut self,
        status: Status,
    ) {
        if let Some(responses) = self.responses.take() {
            let _ = responses.send(Err(status));
        }
    }

    /// Terminates the call cleanly; the client sees end of stream.
    pub fn close(&mut self) {
        self.responses.take();
    }

    /// Resolves once the client has ended or dropped the call.
    pub async fn closed(&mut self) {
        while self.requests.recv().await.is_some() {}
    }
}
