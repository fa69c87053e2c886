use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::async_trait;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::metadata::AsciiMetadataValue;
use tonic::transport::Channel;
use tonic::transport::Endpoint;
use tonic::Request;
use tonic::Status;
use tracing::debug;

use crate::constants::LISTEN_METHOD_PATH;
use crate::constants::RESOURCE_PREFIX_HEADER;
use crate::network::ListenStream;
use crate::network::ListenTransport;
use crate::proto::ListenRequest;
use crate::proto::ListenResponse;
use crate::DatabaseConfig;
use crate::Error;
use crate::NetworkConfig;
use crate::NetworkError;
use crate::Result;
use crate::StreamError;

#[derive(Clone, Debug)]
pub struct GrpcListenTransport {
    channel: Channel,
    /// `projects/{p}/databases/{d}`, sent as the resource prefix header
    database: String,
    request_buffer_size: usize,
}

impl GrpcListenTransport {
    /// Builds the transport without connecting; the first `open` dials the
    /// endpoint. Must be called from within a tokio runtime.
    pub fn connect_lazy(
        network: &NetworkConfig,
        database: &DatabaseConfig,
    ) -> Result<Self> {
        let endpoint = Endpoint::from_shared(network.endpoint.clone())
            .map_err(|e| NetworkError::InvalidURI(format!("{}: {}", network.endpoint, e)))?
            .connect_timeout(Duration::from_millis(network.connect_timeout_in_ms))
            .tcp_keepalive(Some(Duration::from_secs(network.tcp_keepalive_in_secs)))
            .http2_keep_alive_interval(Duration::from_secs(network.http2_keep_alive_interval_in_secs))
            .keep_alive_timeout(Duration::from_secs(network.http2_keep_alive_timeout_in_secs))
            .keep_alive_while_idle(true)
            .initial_connection_window_size(network.connection_window_size)
            .initial_stream_window_size(network.stream_window_size);

        debug!(endpoint = %network.endpoint, "listen channel configured");

        Ok(Self {
            channel: endpoint.connect_lazy(),
            database: database.formatted_name(),
            request_buffer_size: network.request_buffer_size,
        })
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub(crate) fn resource_prefix(&self) -> Result<AsciiMetadataValue> {
        AsciiMetadataValue::try_from(self.database.as_str())
            .map_err(|e| NetworkError::InvalidMetadata(format!("{}: {}", self.database, e)).into())
    }
}

#[async_trait]
impl ListenTransport for GrpcListenTransport {
    async fn open(
        &self,
        request: ListenRequest,
    ) -> Result<ListenStream> {
        let (request_tx, request_rx) = mpsc::channel(self.request_buffer_size);
        request_tx.send(request).await.map_err(|_| StreamError::Ended)?;

        let mut grpc = tonic::client::Grpc::new(self.channel.clone());
        grpc.ready()
            .await
            .map_err(|e| Status::unknown(format!("Service was not ready: {}", e)))?;

        let mut call = Request::new(ReceiverStream::new(request_rx));
        call.metadata_mut().insert(RESOURCE_PREFIX_HEADER, self.resource_prefix()?);

        let codec: ProstCodec<ListenRequest, ListenResponse> = ProstCodec::default();
        let path = PathAndQuery::from_static(LISTEN_METHOD_PATH);
        let response = grpc.streaming(call, path, codec).await?;

        let responses = response.into_inner().map(|item| item.map_err(Error::from));
        Ok(ListenStream::new(request_tx, responses))
    }
}
