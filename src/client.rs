use crate::error::ClientError;
use crate::mem::element::Element;
use crate::mem::layout::{Category, Layout};
use crate::mem::range::Range;
use crate::msg::Event;
use crate::transport::Transport;

use futures_util::future::try_join4;
use std::time::Duration;
use tokio::sync::mpsc::Sender;
use tracing::{debug, error, info, warn};

const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Data to write into an element.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Payload {
    /// Big-endian bytes written as is.
    Raw(Vec<u8>),
    /// Textual value, encoded with the register type.
    Value(String),
}

impl Payload {
    /// Coil state of the payload.
    ///
    /// Raw payloads are set if any byte is non-zero. Textual payloads are set unless they are
    /// empty, `0`, `false` or `off`.
    pub fn is_set(&self) -> bool {
        match self {
            Payload::Raw(bytes) => bytes.iter().any(|b| *b != 0),
            Payload::Value(value) => {
                let value = value.trim();
                !(value.is_empty()
                    || value == "0"
                    || value.eq_ignore_ascii_case("false")
                    || value.eq_ignore_ascii_case("off"))
            }
        }
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Payload::Value(value.to_owned())
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload::Raw(bytes)
    }
}

/// Outcome of a write request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Write {
    Done,
    /// The value could not be parsed for the register type, nothing was sent.
    Skipped,
}

/// Polls all categories of a layout through a transport and decodes the results.
pub struct Client<T: Transport> {
    layout: Layout,
    transport: Option<T>,
    events: Option<Sender<Event>>,
}

async fn read_range<T: Transport>(
    transport: &T,
    category: Category,
    range: Option<Range>,
) -> Result<Option<Vec<u8>>, ClientError> {
    let Some(range) = range else {
        return Ok(None);
    };
    transport
        .read(category, &range)
        .await
        .map(Some)
        .map_err(|source| ClientError::ReadFailure { category, source })
}

impl<T: Transport> Client<T> {
    pub fn new(layout: Layout) -> Self {
        Self {
            layout,
            transport: None,
            events: None,
        }
    }

    pub fn with_events(mut self, sender: Sender<Event>) -> Self {
        self.events = Some(sender);
        self
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_some()
    }

    async fn emit(&self, event: Event) {
        if let Some(ref sender) = self.events {
            if sender.send(event).await.is_err() {
                debug!("Event receiver is gone");
            }
        }
    }

    fn transport(&self) -> Result<&T, ClientError> {
        self.transport.as_ref().ok_or(ClientError::NotConnected)
    }

    /// Attach a connected transport, closing the previous one.
    pub async fn open(&mut self, transport: T) {
        self.close().await;
        self.transport = Some(transport);
        self.emit(Event::Open).await;
    }

    /// Disconnect the transport, a closed client stays closed.
    pub async fn close(&mut self) {
        let Some(transport) = self.transport.take() else {
            return;
        };
        if let Err(e) = transport.disconnect().await {
            warn!("Failed to disconnect: {e}");
        }
        self.emit(Event::Close).await;
    }

    /// Read all four categories and decode the values into the layout.
    ///
    /// The reads run concurrently. If any of them fails, no element is touched and the error
    /// is returned.
    pub async fn update(&mut self) -> Result<&Layout, ClientError> {
        let transport = match self.transport() {
            Ok(transport) => transport,
            Err(e) => {
                self.emit(Event::error(e.to_string())).await;
                return Err(e);
            }
        };

        let result = try_join4(
            read_range(transport, Category::Coils, self.layout.range(Category::Coils)),
            read_range(transport, Category::Discrete, self.layout.range(Category::Discrete)),
            read_range(transport, Category::Input, self.layout.range(Category::Input)),
            read_range(transport, Category::Holding, self.layout.range(Category::Holding)),
        )
        .await;

        let (coils, discrete, input, holding) = match result {
            Ok(buffers) => buffers,
            Err(e) => {
                error!("Update failed: {e}");
                self.emit(Event::error(e.to_string())).await;
                return Err(e);
            }
        };

        self.layout.apply(Category::Coils, coils.as_deref());
        self.layout.apply(Category::Discrete, discrete.as_deref());
        self.layout.apply(Category::Input, input.as_deref());
        self.layout.apply(Category::Holding, holding.as_deref());

        self.emit(Event::Update(self.layout.clone())).await;
        Ok(&self.layout)
    }

    /// Write a payload into a coil or register element.
    pub async fn write(&self, element: &Element, payload: Payload) -> Result<Write, ClientError> {
        if element.is_coil() {
            self.write_coil(element, payload.is_set()).await
        } else {
            self.write_register(element, payload).await
        }
    }

    pub async fn write_coil(&self, element: &Element, value: bool) -> Result<Write, ClientError> {
        if !element.is_coil() {
            return Err(ClientError::InvalidElementKind { expected: "coil" });
        }
        let address = element.address().ok_or(ClientError::InvalidAddress)?;
        let transport = self.transport()?;

        debug!("Write coil {address:#06X} ({address}) = {value}");
        match transport.write_single_coil(address, value).await {
            Ok(()) => Ok(Write::Done),
            Err(source) => {
                let e = ClientError::WriteFailure { address, source };
                self.emit(Event::error(e.to_string())).await;
                Err(e)
            }
        }
    }

    pub async fn write_register(
        &self,
        element: &Element,
        payload: Payload,
    ) -> Result<Write, ClientError> {
        let Some(r#type) = element.r#type() else {
            return Err(ClientError::InvalidElementKind {
                expected: "register",
            });
        };
        let address = element.address().ok_or(ClientError::InvalidAddress)?;
        let transport = self.transport()?;

        let bytes = match payload {
            Payload::Raw(bytes) => bytes,
            Payload::Value(value) => match r#type.encode(&value)? {
                Some(bytes) => bytes,
                None => {
                    warn!(
                        "Skip write of `{value}` to register {address}, not a valid {}",
                        r#type
                    );
                    return Ok(Write::Skipped);
                }
            },
        };

        debug!("Write register {address:#06X} ({address}) = {bytes:02X?}");
        match transport.write_multiple_registers(address, &bytes).await {
            Ok(()) => Ok(Write::Done),
            Err(source) => {
                let e = ClientError::WriteFailure { address, source };
                self.emit(Event::error(e.to_string())).await;
                Err(e)
            }
        }
    }

    /// Update every `interval` until `cycles` updates have been attempted, forever if `None`.
    ///
    /// Failed updates are logged and polling continues. Intervals below one millisecond are
    /// raised to one millisecond.
    pub async fn run(&mut self, interval: Duration, cycles: Option<usize>) {
        let mut ticker = tokio::time::interval(interval.max(MIN_INTERVAL));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let mut cycle = 0;
        while cycles.map_or(true, |c| cycle < c) {
            ticker.tick().await;
            cycle += 1;
            match self.update().await {
                Ok(layout) => info!("Update {cycle} read {} elements", layout.len()),
                Err(e) => warn!("Update {cycle} failed: {e}"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Payload;

    #[test]
    fn ut_payload_is_set() {
        assert!(Payload::from("1").is_set());
        assert!(Payload::from("true").is_set());
        assert!(Payload::from("42").is_set());
        assert!(!Payload::from("0").is_set());
        assert!(!Payload::from(" FALSE ").is_set());
        assert!(!Payload::from("off").is_set());
        assert!(!Payload::from("").is_set());
        assert!(Payload::from(vec![0, 1]).is_set());
        assert!(!Payload::from(vec![0, 0]).is_set());
        assert!(!Payload::Raw(Vec::new()).is_set());
    }
}
