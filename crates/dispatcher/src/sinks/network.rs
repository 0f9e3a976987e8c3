//! NetworkSink - UDP fire-and-forget JSON datagrams

use contracts::{ContractError, DataSink, Record};
use std::collections::HashMap;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{debug, instrument, warn};

/// Largest UDP payload over IPv4
const MAX_UDP_PAYLOAD: usize = 65507;

/// Configuration for NetworkSink
#[derive(Debug, Clone)]
pub struct NetworkSinkConfig {
    /// Target address
    pub addr: SocketAddr,
    /// Max datagram size; larger records are rejected
    pub max_packet_size: usize,
}

impl NetworkSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let addr_str = params
            .get("addr")
            .ok_or_else(|| "missing 'addr' parameter".to_string())?;

        let addr: SocketAddr = addr_str
            .parse()
            .map_err(|e| format!("invalid address '{addr_str}': {e}"))?;

        let max_packet_size = match params.get("max_packet_size") {
            Some(raw) => raw
                .parse::<usize>()
                .map_err(|e| format!("invalid max_packet_size '{raw}': {e}"))?
                .min(MAX_UDP_PAYLOAD),
            None => MAX_UDP_PAYLOAD,
        };

        Ok(Self {
            addr,
            max_packet_size,
        })
    }
}

/// Sink that sends one JSON datagram per record
pub struct NetworkSink {
    name: String,
    config: NetworkSinkConfig,
    socket: Option<UdpSocket>,
    sent: u64,
}

impl NetworkSink {
    /// Bind an ephemeral socket connected to the target
    #[instrument(name = "network_sink_new", skip(name, config), fields(target = %config.addr))]
    pub async fn new(name: impl Into<String>, config: NetworkSinkConfig) -> std::io::Result<Self> {
        let name = name.into();
        let bind_addr = if config.addr.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(&config.addr).await?;

        debug!(sink = %name, target = %config.addr, "network sink connected");

        Ok(Self {
            name,
            config,
            socket: Some(socket),
            sent: 0,
        })
    }

    /// Create from params (for factory)
    pub async fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config = NetworkSinkConfig::from_params(params)
            .map_err(|e| ContractError::config_validation(format!("sinks.{name}.params"), e))?;

        Self::new(name.clone(), config)
            .await
            .map_err(|e| ContractError::SinkConnection {
                sink_name: name,
                message: e.to_string(),
            })
    }

    fn prepare_payload(&self, record: &Record) -> Result<Vec<u8>, ContractError> {
        let data = serde_json::to_vec(record)
            .map_err(|e| ContractError::sink_write(&self.name, format!("json error: {e}")))?;

        if data.len() > self.config.max_packet_size {
            return Err(ContractError::sink_write(
                &self.name,
                format!(
                    "record of {} bytes exceeds max packet size {}",
                    data.len(),
                    self.config.max_packet_size
                ),
            ));
        }
        Ok(data)
    }
}

impl DataSink for NetworkSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "network_sink_write", level = "debug", skip(self, record), fields(sink = %self.name))]
    async fn write(&mut self, record: &Record) -> Result<(), ContractError> {
        let data = self.prepare_payload(record)?;
        let socket = self
            .socket
            .as_ref()
            .ok_or_else(|| ContractError::sink_unavailable(&self.name))?;

        match socket.send(&data).await {
            Ok(bytes) => {
                self.sent += 1;
                debug!(sink = %self.name, bytes, "datagram sent");
            }
            Err(e) => {
                // Best effort: a refused datagram is not a record failure
                warn!(sink = %self.name, error = %e, "udp send failed");
            }
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "network_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        self.socket = None;
        debug!(sink = %self.name, sent = self.sent, "network sink closed");
        Ok(())
    }
}
