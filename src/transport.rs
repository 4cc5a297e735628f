use crate::error::TransportError;
use crate::mem::buffer::{bytes_to_words, pack_bits, words_to_bytes};
use crate::mem::layout::Category;
use crate::mem::range::Range;

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::error::Elapsed;
use tokio_modbus::client::{Client, Context, Reader, Writer};
use tracing::debug;

/// Maximum number of registers a single read request may ask for.
pub const MAX_REGISTERS_PER_READ: usize = 125;

/// Maximum number of coils a single read request may ask for.
pub const MAX_COILS_PER_READ: usize = 2000;

/// Request/response access to a device.
///
/// Reads return the raw buffer of the requested range: bit-packed (least significant bit
/// first) for coils and discrete inputs, big-endian words for registers.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn read(&self, category: Category, range: &Range) -> Result<Vec<u8>, TransportError>;

    async fn write_single_coil(&self, address: u16, value: bool) -> Result<(), TransportError>;

    async fn write_multiple_registers(
        &self,
        address: u16,
        bytes: &[u8],
    ) -> Result<(), TransportError>;

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Transport over a connected tokio-modbus client context (TCP or RTU).
pub struct ModbusTransport {
    context: Mutex<Context>,
    timeout_ms: u64,
}

impl ModbusTransport {
    pub fn new(context: Context, timeout_ms: u64) -> Self {
        Self {
            context: Mutex::new(context),
            timeout_ms,
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    fn flatten<T>(
        &self,
        result: Result<tokio_modbus::Result<T>, Elapsed>,
    ) -> Result<T, TransportError> {
        match result {
            Err(_) => Err(TransportError::Timeout(self.timeout_ms)),
            Ok(Err(e)) => Err(TransportError::Request(e.to_string())),
            Ok(Ok(Err(e))) => Err(TransportError::Exception(e.to_string())),
            Ok(Ok(Ok(v))) => Ok(v),
        }
    }
}

/// Split a range into consecutive requests of at most `max` units.
pub fn split(range: &Range, max: usize) -> Result<Vec<(u16, u16)>, TransportError> {
    let overflow = || TransportError::AddressOverflow {
        start: range.start,
        end: range.end,
    };
    if range.end > u16::MAX as usize + 1 {
        return Err(overflow());
    }

    (range.start..range.end)
        .step_by(max)
        .map(|start| {
            let count = std::cmp::min(max, range.end - start);
            Ok((
                u16::try_from(start).map_err(|_| overflow())?,
                u16::try_from(count).map_err(|_| overflow())?,
            ))
        })
        .collect()
}

#[async_trait]
impl Transport for ModbusTransport {
    async fn read(&self, category: Category, range: &Range) -> Result<Vec<u8>, TransportError> {
        let max = if category.is_bit() {
            MAX_COILS_PER_READ
        } else {
            MAX_REGISTERS_PER_READ
        };
        let requests = split(range, max)?;
        let mut context = self.context.lock().await;

        if category.is_bit() {
            let mut bits = Vec::with_capacity(range.length());
            for (addr, cnt) in requests {
                debug!("Read {category} [ {addr:#06X} ({addr}), +{cnt} )");
                let result = match category {
                    Category::Coils => {
                        tokio::time::timeout(self.timeout(), context.read_coils(addr, cnt)).await
                    }
                    _ => {
                        tokio::time::timeout(
                            self.timeout(),
                            context.read_discrete_inputs(addr, cnt),
                        )
                        .await
                    }
                };
                let mut chunk = self.flatten(result)?;
                chunk.truncate(cnt as usize);
                bits.extend(chunk);
            }
            Ok(pack_bits(&bits))
        } else {
            let mut words = Vec::with_capacity(range.length());
            for (addr, cnt) in requests {
                debug!("Read {category} [ {addr:#06X} ({addr}), +{cnt} )");
                let result = match category {
                    Category::Input => {
                        tokio::time::timeout(
                            self.timeout(),
                            context.read_input_registers(addr, cnt),
                        )
                        .await
                    }
                    _ => {
                        tokio::time::timeout(
                            self.timeout(),
                            context.read_holding_registers(addr, cnt),
                        )
                        .await
                    }
                };
                words.extend(self.flatten(result)?);
            }
            Ok(words_to_bytes(&words))
        }
    }

    async fn write_single_coil(&self, address: u16, value: bool) -> Result<(), TransportError> {
        let mut context = self.context.lock().await;
        let result =
            tokio::time::timeout(self.timeout(), context.write_single_coil(address, value)).await;
        self.flatten(result)
    }

    async fn write_multiple_registers(
        &self,
        address: u16,
        bytes: &[u8],
    ) -> Result<(), TransportError> {
        let words = bytes_to_words(bytes);
        let mut context = self.context.lock().await;
        let result = tokio::time::timeout(
            self.timeout(),
            context.write_multiple_registers(address, &words),
        )
        .await;
        self.flatten(result)
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let mut context = self.context.lock().await;
        match tokio::time::timeout(self.timeout(), context.disconnect()).await {
            Err(_) => Err(TransportError::Timeout(self.timeout_ms)),
            Ok(Err(e)) => Err(TransportError::Connection(e.to_string())),
            Ok(Ok(())) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::split;
    use crate::error::TransportError;
    use crate::mem::range::Range;

    #[test]
    fn ut_split_single() {
        assert_eq!(split(&Range::new(10, 2), 125).unwrap(), vec![(10, 2)]);
    }

    #[test]
    fn ut_split_chunks() {
        assert_eq!(
            split(&Range::new(0, 300), 125).unwrap(),
            vec![(0, 125), (125, 125), (250, 50)]
        );
        assert_eq!(
            split(&Range::new(5, 2000), 2000).unwrap(),
            vec![(5, 2000)]
        );
    }

    #[test]
    fn ut_split_upper_bound() {
        assert_eq!(
            split(&Range::new(65534, 2), 125).unwrap(),
            vec![(65534, 2)]
        );
        assert_eq!(
            split(&Range::new(65535, 4), 125),
            Err(TransportError::AddressOverflow {
                start: 65535,
                end: 65539
            })
        );
    }
}
