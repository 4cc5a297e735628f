use crate::error::TransportError;
use crate::transport::ModbusTransport;

use clap::Args;
use std::net::SocketAddr;
use std::time::Duration;
use tokio_modbus::prelude::{tcp, Slave};
use tracing::info;

#[derive(Clone, Debug, Args)]
pub struct TcpConfig {
    /// The IP address of the device.
    #[arg(default_value = "127.0.0.1")]
    pub ip: String,

    /// The port of the device.
    #[arg(short, long, default_value_t = 502)]
    pub port: u16,

    /// The Modbus unit id to address.
    #[arg(short, long, default_value_t = 0)]
    pub unit_id: u8,

    /// Timeout of a single request in milliseconds.
    #[arg(short, long, default_value_t = 1500)]
    pub timeout_ms: u64,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            ip: String::from("127.0.0.1"),
            port: 502,
            unit_id: 0,
            timeout_ms: 1500,
        }
    }
}

impl TcpConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, TransportError> {
        format!("{}:{}", self.ip, self.port)
            .parse()
            .map_err(|e| {
                TransportError::Connection(format!(
                    "Invalid address {}:{} ({e})",
                    self.ip, self.port
                ))
            })
    }
}

/// Connect to a Modbus TCP device.
pub async fn connect(config: &TcpConfig) -> Result<ModbusTransport, TransportError> {
    let addr = config.socket_addr()?;
    let context = tokio::time::timeout(
        Duration::from_millis(config.timeout_ms),
        tcp::connect_slave(addr, Slave(config.unit_id)),
    )
    .await
    .map_err(|_| TransportError::Timeout(config.timeout_ms))?
    .map_err(|e| TransportError::Connection(format!("Failed to connect to {addr} ({e})")))?;

    info!("Modbus TCP connected to {addr}");
    Ok(ModbusTransport::new(context, config.timeout_ms))
}
