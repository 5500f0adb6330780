//! NetworkSink - UDP datagram per publication, best effort

use std::collections::HashMap;
use std::net::SocketAddr;

use contracts::{ContractError, Publication, PublicationSink};
use tokio::net::UdpSocket;
use tracing::{debug, instrument, warn};

/// Wire encoding of a datagram
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WireFormat {
    #[default]
    Json,
    Bincode,
}

/// NetworkSink settings, read from the sink's `params`
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkSinkConfig {
    /// `addr`: receiver address
    pub addr: SocketAddr,
    /// `format`: "json" (default) or "bincode"
    pub format: WireFormat,
    /// `max_packet_size`: larger datagrams are skipped
    pub max_packet_size: usize,
}

impl NetworkSinkConfig {
    pub const DEFAULT_MAX_PACKET_SIZE: usize = 65_000;

    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let raw = params.get("addr").ok_or("missing 'addr' parameter")?;
        let addr = raw
            .parse()
            .map_err(|e| format!("invalid address '{raw}': {e}"))?;

        let format = match params.get("format").map(String::as_str) {
            None | Some("json") => WireFormat::Json,
            Some("bincode") => WireFormat::Bincode,
            Some(other) => return Err(format!("unknown format '{other}'")),
        };

        let max_packet_size = match params.get("max_packet_size") {
            Some(s) => s
                .parse()
                .map_err(|e| format!("invalid max_packet_size '{s}': {e}"))?,
            None => Self::DEFAULT_MAX_PACKET_SIZE,
        };

        Ok(Self {
            addr,
            format,
            max_packet_size,
        })
    }
}

pub struct NetworkSink {
    name: String,
    config: NetworkSinkConfig,
    socket: Option<UdpSocket>,
}

impl NetworkSink {
    #[instrument(name = "network_sink_connect", skip(name, config), fields(target = %config.addr))]
    pub async fn connect(name: impl Into<String>, config: NetworkSinkConfig) -> std::io::Result<Self> {
        let name = name.into();
        let bind: SocketAddr = if config.addr.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            ([0u16; 8], 0).into()
        };
        let socket = UdpSocket::bind(bind).await?;
        socket.connect(config.addr).await?;
        debug!(sink = %name, "NetworkSink connected");

        Ok(Self {
            name,
            config,
            socket: Some(socket),
        })
    }

    pub async fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config = NetworkSinkConfig::from_params(params)
            .map_err(|e| ContractError::sink_write(&name, e))?;
        Self::connect(name.clone(), config)
            .await
            .map_err(|e| ContractError::SinkConnection {
                sink_name: name,
                message: e.to_string(),
            })
    }

    fn encode(&self, publication: &Publication) -> Result<Vec<u8>, ContractError> {
        match self.config.format {
            WireFormat::Json => serde_json::to_vec(publication)
                .map_err(|e| ContractError::sink_write(&self.name, format!("json: {e}"))),
            WireFormat::Bincode => bincode::serialize(publication)
                .map_err(|e| ContractError::sink_write(&self.name, format!("bincode: {e}"))),
        }
    }
}

impl PublicationSink for NetworkSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "network_sink_write",
        skip(self, publication),
        fields(sink = %self.name, topic = %publication.topic())
    )]
    async fn write(&mut self, publication: &Publication) -> Result<(), ContractError> {
        let data = self.encode(publication)?;
        if data.len() > self.config.max_packet_size {
            warn!(
                size = data.len(),
                max = self.config.max_packet_size,
                "Datagram too large, skipped"
            );
            return Ok(());
        }

        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| ContractError::sink_write(&self.name, "socket closed"))?;
        // UDP is best effort; a refused send is logged, not failed
        if let Err(e) = socket.send(&data).await {
            warn!(error = %e, "UDP send failed");
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        self.socket = None;
        Ok(())
    }
}
