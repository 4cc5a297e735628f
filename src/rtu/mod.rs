use crate::error::TransportError;
use crate::transport::ModbusTransport;

use clap::{Args, ValueEnum};
use std::fmt::Display;
use tokio_modbus::prelude::{rtu, Slave};
use tokio_serial::{DataBits, Parity as SerialParity, SerialPortBuilder, SerialStream, StopBits};
use tracing::info;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum FlowControl {
    #[default]
    None,
    Software,
    Hardware,
}

impl Display for FlowControl {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlowControl::None => fmt.write_str("NONE"),
            FlowControl::Software => fmt.write_str("SOFTWARE"),
            FlowControl::Hardware => fmt.write_str("HARDWARE"),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

impl Display for Parity {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Parity::None => fmt.write_str("NONE"),
            Parity::Odd => fmt.write_str("ODD"),
            Parity::Even => fmt.write_str("EVEN"),
        }
    }
}

#[derive(Clone, Debug, Args)]
pub struct RtuConfig {
    /// The device path to use for communication.
    pub path: String,

    /// The baud rate to use for the serial connection.
    #[arg(short, long, default_value_t = 115200)]
    pub baud_rate: u32,

    /// The Modbus slave id to use.
    #[arg(short = 'i', long, default_value_t = 1)]
    pub slave_id: u8,

    /// The parity of the serial connection.
    #[arg(short, long, value_enum, default_value_t = Parity::None)]
    pub parity: Parity,

    /// The data bits [values: 5, 6, 7, 8]
    #[arg(short, long, default_value_t = 8)]
    pub data_bits: u8,

    /// The stop bits [values: 1, 2]
    #[arg(short, long, default_value_t = 1)]
    pub stop_bits: u8,

    /// The flow control of the serial connection.
    #[arg(short, long, value_enum, default_value_t = FlowControl::None)]
    pub flow_control: FlowControl,

    /// Timeout of a single request in milliseconds.
    #[arg(short, long, default_value_t = 1500)]
    pub timeout_ms: u64,
}

impl Default for RtuConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            baud_rate: 115200,
            slave_id: 1,
            parity: Parity::None,
            data_bits: 8,
            stop_bits: 1,
            flow_control: FlowControl::None,
            timeout_ms: 1500,
        }
    }
}

impl Display for RtuConfig {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            fmt,
            "{}, baud rate: {}, data bits: {}, parity: {}, stop bits: {}, flow control: {}",
            self.path, self.baud_rate, self.data_bits, self.parity, self.stop_bits, self.flow_control
        )
    }
}

impl RtuConfig {
    fn serial_builder(&self) -> Result<SerialPortBuilder, TransportError> {
        let data_bits = match self.data_bits {
            5 => DataBits::Five,
            6 => DataBits::Six,
            7 => DataBits::Seven,
            8 => DataBits::Eight,
            v => {
                return Err(TransportError::Connection(format!(
                    "Invalid data bits specified ({v})"
                )))
            }
        };
        let stop_bits = match self.stop_bits {
            1 => StopBits::One,
            2 => StopBits::Two,
            v => {
                return Err(TransportError::Connection(format!(
                    "Invalid stop bits specified ({v})"
                )))
            }
        };
        let parity = match self.parity {
            Parity::None => SerialParity::None,
            Parity::Odd => SerialParity::Odd,
            Parity::Even => SerialParity::Even,
        };
        let flow_control = match self.flow_control {
            FlowControl::None => tokio_serial::FlowControl::None,
            FlowControl::Software => tokio_serial::FlowControl::Software,
            FlowControl::Hardware => tokio_serial::FlowControl::Hardware,
        };

        Ok(tokio_serial::new(self.path.clone(), self.baud_rate)
            .data_bits(data_bits)
            .stop_bits(stop_bits)
            .parity(parity)
            .flow_control(flow_control))
    }
}

/// Open the serial device and attach a Modbus RTU client to it.
pub async fn connect(config: &RtuConfig) -> Result<ModbusTransport, TransportError> {
    let builder = config.serial_builder()?;
    let port = SerialStream::open(&builder).map_err(|e| {
        TransportError::Connection(format!("Failed to open {} ({e})", config.path))
    })?;
    let context = rtu::attach_slave(port, Slave(config.slave_id));

    info!("Modbus RTU connected to {config}");
    Ok(ModbusTransport::new(context, config.timeout_ms))
}

#[cfg(test)]
mod tests {
    use super::{FlowControl, Parity, RtuConfig};
    use crate::error::TransportError;

    #[test]
    fn ut_rtu_display() {
        let config = RtuConfig {
            path: String::from("/dev/ttyUSB0"),
            parity: Parity::Even,
            flow_control: FlowControl::Hardware,
            ..Default::default()
        };
        assert_eq!(
            config.to_string(),
            "/dev/ttyUSB0, baud rate: 115200, data bits: 8, parity: EVEN, stop bits: 1, flow control: HARDWARE"
        );
    }

    #[test]
    fn ut_rtu_invalid_serial_settings() {
        let config = RtuConfig {
            data_bits: 9,
            ..Default::default()
        };
        assert!(matches!(
            config.serial_builder(),
            Err(TransportError::Connection(_))
        ));

        let config = RtuConfig {
            stop_bits: 3,
            ..Default::default()
        };
        assert!(matches!(
            config.serial_builder(),
            Err(TransportError::Connection(_))
        ));
        assert!(RtuConfig::default().serial_builder().is_ok());
    }
}
