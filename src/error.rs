use crate::mem::data::DataType;
use crate::mem::layout::Category;

use thiserror::Error;

/// Failures of the register codec.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Buffer of {len} bytes is too short to read {data_type} ({needed} bytes)")]
    InvalidInput {
        data_type: DataType,
        len: usize,
        needed: usize,
    },

    #[error("Type `{0}` is not supported for encoding")]
    UnsupportedType(DataType),

    #[error("Value `{value}` does not fit into {data_type}")]
    OutOfRange { data_type: DataType, value: String },
}

/// Failures while building or loading a layout.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("Invalid layout: {0}")]
    InvalidLayout(String),

    #[error("Failed to read layout file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON layout: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to parse TOML layout: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Failed to serialize TOML layout: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

/// Failures reported by a transport collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Request timed out after {0}ms")]
    Timeout(u64),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("Device answered with exception: {0}")]
    Exception(String),

    #[error("Address space [{start}, {end}) exceeds the 16-bit address range")]
    AddressOverflow { start: usize, end: usize },
}

/// Failures of the update orchestrator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("Client is not connected")]
    NotConnected,

    #[error("Reading {category} failed: {source}")]
    ReadFailure {
        category: Category,
        #[source]
        source: TransportError,
    },

    #[error("Writing address {address} failed: {source}")]
    WriteFailure {
        address: u16,
        #[source]
        source: TransportError,
    },

    #[error("Operation requires a {expected} element")]
    InvalidElementKind { expected: &'static str },

    #[error("Element has no valid address")]
    InvalidAddress,

    #[error(transparent)]
    Codec(#[from] CodecError),
}
