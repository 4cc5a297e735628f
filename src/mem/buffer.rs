//! Distribution of raw read buffers onto the elements of a category.
//!
//! Elements that are not covered by the buffer (no address, below the range start or beyond
//! the bytes actually read) lose their value instead of failing the whole update.

use crate::mem::data::Value;
use crate::mem::element::Element;

use byteorder::{BigEndian, ByteOrder};
use tracing::warn;

/// Set the value of every coil from a bit-packed buffer starting at `start`.
///
/// Bit 0 of byte 0 is the coil at `start`.
pub fn parse_coils(start: usize, bytes: Option<&[u8]>, elements: &mut [Element]) {
    let Some(bytes) = bytes else {
        return;
    };

    for element in elements.iter_mut() {
        let bit = element
            .address()
            .and_then(|address| (address as usize).checked_sub(start))
            .and_then(|offset| {
                bytes
                    .get(offset / 8)
                    .map(|byte| byte & (1 << (offset % 8)) != 0)
            });
        if bit.is_none() {
            warn!(
                "Coil {:?} is outside of the {} bytes read from {}",
                element.address(),
                bytes.len(),
                start
            );
        }
        element.set_value(bit.map(Value::Bit));
    }
}

/// Decode every register from a big-endian word buffer starting at `start`.
pub fn parse_registers(start: usize, bytes: Option<&[u8]>, elements: &mut [Element]) {
    let Some(bytes) = bytes else {
        return;
    };

    for element in elements.iter_mut() {
        let Some(r#type) = element.r#type().cloned() else {
            continue;
        };
        let slice = element
            .address()
            .and_then(|address| (address as usize).checked_sub(start))
            .and_then(|offset| {
                let end = offset.checked_add(r#type.word_size())?.checked_mul(2)?;
                bytes.get(offset * 2..end)
            });

        let value = match slice {
            Some(slice) => r#type.decode(slice).unwrap_or_else(|e| {
                warn!("Failed to decode register {:?}: {}", element.address(), e);
                None
            }),
            None => {
                warn!(
                    "Register {:?} ({}) is outside of the {} bytes read from {}",
                    element.address(),
                    r#type,
                    bytes.len(),
                    start
                );
                None
            }
        };
        element.set_value(value);
    }
}

/// Pack coil states into bytes, least significant bit first.
pub fn pack_bits(bits: &[bool]) -> Vec<u8> {
    bits.chunks(8)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u8, |byte, (idx, bit)| byte | (u8::from(*bit) << idx))
        })
        .collect()
}

pub fn words_to_bytes(words: &[u16]) -> Vec<u8> {
    let mut bytes = vec![0u8; words.len() * 2];
    BigEndian::write_u16_into(words, &mut bytes);
    bytes
}

/// Convert a big-endian buffer into words, a trailing odd byte is padded with zero.
pub fn bytes_to_words(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks(2)
        .map(|chunk| match chunk {
            [hi, lo] => u16::from_be_bytes([*hi, *lo]),
            [hi] => u16::from_be_bytes([*hi, 0]),
            _ => 0,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{bytes_to_words, pack_bits, parse_coils, parse_registers, words_to_bytes};
    use crate::mem::data::{DataType, Value};
    use crate::mem::element::{Coil, Element, Register};

    fn coils(addresses: &[u16]) -> Vec<Element> {
        addresses.iter().map(|a| Coil::new(*a).into()).collect()
    }

    fn values(elements: &[Element]) -> Vec<Option<Value>> {
        elements.iter().map(|e| e.value().cloned()).collect()
    }

    #[test]
    fn ut_parse_coils() {
        let mut elements = coils(&[0, 1, 9]);
        parse_coils(0, Some(&[0b0000_0011, 0b0000_0010]), &mut elements);
        assert_eq!(
            values(&elements),
            vec![
                Some(Value::Bit(true)),
                Some(Value::Bit(true)),
                Some(Value::Bit(true))
            ]
        );

        parse_coils(0, Some(&[0b0000_0001, 0b0000_0000]), &mut elements);
        assert_eq!(
            values(&elements),
            vec![
                Some(Value::Bit(true)),
                Some(Value::Bit(false)),
                Some(Value::Bit(false))
            ]
        );
    }

    #[test]
    fn ut_parse_coils_offset() {
        let mut elements = coils(&[100, 107, 108]);
        parse_coils(100, Some(&[0b1000_0000, 0b0000_0001]), &mut elements);
        assert_eq!(
            values(&elements),
            vec![
                Some(Value::Bit(false)),
                Some(Value::Bit(true)),
                Some(Value::Bit(true))
            ]
        );
    }

    #[test]
    fn ut_parse_coils_without_buffer() {
        let mut elements = coils(&[0]);
        elements[0].set_value(Some(Value::Bit(true)));
        parse_coils(0, None, &mut elements);
        assert_eq!(values(&elements), vec![Some(Value::Bit(true))]);
    }

    #[test]
    fn ut_parse_coils_out_of_bounds() {
        let mut elements = coils(&[0, 16]);
        elements[1].set_value(Some(Value::Bit(true)));
        parse_coils(0, Some(&[0xFF, 0xFF]), &mut elements);
        assert_eq!(values(&elements), vec![Some(Value::Bit(true)), None]);
    }

    #[test]
    fn ut_parse_registers() {
        let mut elements: Vec<Element> = vec![
            Register::new(10, DataType::UInt16).into(),
            Register::new(11, DataType::UInt32).into(),
            Register::new(14, DataType::Text(2)).into(),
        ];
        let bytes = [0x00, 0x2A, 0x00, 0x01, 0x00, 0x00, 0xAA, 0xAA, b'o', b'k'];
        parse_registers(10, Some(&bytes), &mut elements);
        assert_eq!(
            values(&elements),
            vec![
                Some(Value::U16(42)),
                Some(Value::U32(0x10000)),
                Some(Value::Text("ok".to_owned()))
            ]
        );
    }

    #[test]
    fn ut_parse_registers_out_of_bounds() {
        let mut elements: Vec<Element> = vec![
            Register::new(0, DataType::UInt16).into(),
            Register::new(1, DataType::Double).into(),
            Register::new(9, DataType::UInt16).into(),
        ];
        elements[1].set_value(Some(Value::F64(1.0)));
        parse_registers(0, Some(&[0x00, 0x07, 0x00, 0x00]), &mut elements);
        assert_eq!(values(&elements), vec![Some(Value::U16(7)), None, None]);
    }

    #[test]
    fn ut_parse_registers_oversized_text() {
        let mut elements: Vec<Element> = vec![
            Register::new(0, DataType::UInt16).into(),
            Register::new(1, DataType::Text(usize::MAX)).into(),
        ];
        parse_registers(0, Some(&[0x00, 0x01, b'a', b'b']), &mut elements);
        assert_eq!(values(&elements), vec![Some(Value::U16(1)), None]);
    }

    #[test]
    fn ut_parse_registers_unknown_type() {
        let mut elements: Vec<Element> =
            vec![Register::new(0, "bcd".parse().unwrap()).into()];
        parse_registers(0, Some(&[0x12, 0x34]), &mut elements);
        assert_eq!(values(&elements), vec![None]);
    }

    #[test]
    fn ut_pack_bits() {
        assert_eq!(pack_bits(&[]), Vec::<u8>::new());
        assert_eq!(pack_bits(&[true, true, false]), vec![0b0000_0011]);
        let mut bits = vec![false; 10];
        bits[9] = true;
        bits[0] = true;
        assert_eq!(pack_bits(&bits), vec![0b0000_0001, 0b0000_0010]);
    }

    #[test]
    fn ut_word_conversion() {
        assert_eq!(words_to_bytes(&[0x1234, 0xABCD]), vec![0x12, 0x34, 0xAB, 0xCD]);
        assert_eq!(bytes_to_words(&[0x12, 0x34, 0xAB]), vec![0x1234, 0xAB00]);
    }
}
