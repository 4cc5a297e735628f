//! Typed access to the coils and registers of a Modbus device described by a declarative
//! layout.
//!
//! A [`Layout`] groups point descriptors into the four Modbus categories and derives one
//! contiguous address range per category. A [`Client`] reads those ranges through a
//! [`Transport`] and decodes the raw buffers into the elements of the layout.

pub mod client;
pub mod convert;
pub mod error;
pub mod mem;
pub mod msg;
pub mod rtu;
pub mod tcp;
pub mod transport;


pub use client::{Client, Payload, Write};
pub use error::{ClientError, CodecError, LayoutError, TransportError};
pub use mem::data::{DataType, Value};
pub use mem::element::{Coil, Element, Register};
pub use mem::layout::{Category, Layout};
pub use mem::range::Range;
pub use msg::{Event, Message};
pub use transport::{ModbusTransport, Transport};
