pub mod buffer;
pub mod data;
pub mod element;
pub mod layout;
pub mod range;
