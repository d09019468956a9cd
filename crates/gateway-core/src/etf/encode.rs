//! Term encoder

use super::tags::{
    ATOM_UTF8_EXT, BINARY_EXT, INTEGER_EXT, LIST_EXT, MAP_EXT, NEW_FLOAT_EXT, NIL_EXT,
    SMALL_ATOM_UTF8_EXT, SMALL_BIG_EXT, SMALL_INTEGER_EXT, VERSION,
};
use super::Element;

/// Encode an element into a fresh buffer, version byte first
#[must_use]
pub fn encode(element: &Element) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64);
    buf.push(VERSION);
    write_element(&mut buf, element);
    buf
}

fn write_element(buf: &mut Vec<u8>, element: &Element) {
    match element {
        Element::Nil => write_atom(buf, "nil"),
        Element::Bool(true) => write_atom(buf, "true"),
        Element::Bool(false) => write_atom(buf, "false"),
        Element::Atom(name) => write_atom(buf, name),
        Element::SmallInt(value) => {
            buf.push(SMALL_INTEGER_EXT);
            buf.push(*value);
        }
        Element::Int(value) => {
            buf.push(INTEGER_EXT);
            buf.extend_from_slice(&value.to_be_bytes());
        }
        Element::BigInt(value) => write_big(buf, *value),
        Element::Float(value) => {
            buf.push(NEW_FLOAT_EXT);
            buf.extend_from_slice(&value.to_be_bytes());
        }
        Element::String(value) => write_binary(buf, value),
        Element::List(items) => {
            if items.is_empty() {
                buf.push(NIL_EXT);
                return;
            }
            buf.push(LIST_EXT);
            buf.extend_from_slice(&(items.len() as u32).to_be_bytes());
            for item in items {
                write_element(buf, item);
            }
            buf.push(NIL_EXT);
        }
        Element::Map(map) => {
            buf.push(MAP_EXT);
            buf.extend_from_slice(&(map.len() as u32).to_be_bytes());
            for (key, value) in map {
                write_binary(buf, key);
                write_element(buf, value);
            }
        }
    }
}

/// Names too long for an atom header fall back to a binary
fn write_atom(buf: &mut Vec<u8>, name: &str) {
    let bytes = name.as_bytes();
    if let Ok(len) = u8::try_from(bytes.len()) {
        buf.push(SMALL_ATOM_UTF8_EXT);
        buf.push(len);
    } else if let Ok(len) = u16::try_from(bytes.len()) {
        buf.push(ATOM_UTF8_EXT);
        buf.extend_from_slice(&len.to_be_bytes());
    } else {
        write_binary(buf, name);
        return;
    }
    buf.extend_from_slice(bytes);
}

fn write_binary(buf: &mut Vec<u8>, value: &str) {
    buf.push(BINARY_EXT);
    buf.extend_from_slice(&(value.len() as u32).to_be_bytes());
    buf.extend_from_slice(value.as_bytes());
}

/// Sign byte followed by the little-endian magnitude with trailing zero bytes trimmed
fn write_big(buf: &mut Vec<u8>, value: i128) {
    let magnitude = value.unsigned_abs();
    let len = ((128 - magnitude.leading_zeros()) as usize).div_ceil(8);
    buf.push(SMALL_BIG_EXT);
    buf.push(len as u8);
    buf.push(u8::from(value < 0));
    buf.extend_from_slice(&magnitude.to_le_bytes()[..len]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::etf::ElementMap;

    #[test]
    fn test_encode_small_integer() {
        assert_eq!(encode(&Element::SmallInt(42)), vec![131, 97, 42]);
    }

    #[test]
    fn test_encode_integer() {
        assert_eq!(encode(&Element::Int(-1)), vec![131, 98, 255, 255, 255, 255]);
        assert_eq!(encode(&Element::Int(1024)), vec![131, 98, 0, 0, 4, 0]);
    }

    #[test]
    fn test_encode_big_integer() {
        assert_eq!(encode(&Element::BigInt(0)), vec![131, 110, 0, 0]);
        assert_eq!(
            encode(&Element::BigInt(i128::from(u64::MAX))),
            vec![131, 110, 8, 0, 255, 255, 255, 255, 255, 255, 255, 255]
        );
        assert_eq!(encode(&Element::BigInt(-256)), vec![131, 110, 2, 1, 0, 1]);
    }

    #[test]
    fn test_encode_atoms() {
        assert_eq!(encode(&Element::Bool(true)), vec![131, 119, 4, b't', b'r', b'u', b'e']);
        assert_eq!(encode(&Element::Nil), vec![131, 119, 3, b'n', b'i', b'l']);
    }

    #[test]
    fn test_encode_long_atoms() {
        let medium = "a".repeat(300);
        let encoded = encode(&Element::Atom(medium));
        assert_eq!(&encoded[..4], &[131, ATOM_UTF8_EXT, 1, 44]);
        assert_eq!(encoded.len(), 4 + 300);

        let oversized = "a".repeat(usize::from(u16::MAX) + 1);
        let encoded = encode(&Element::Atom(oversized.clone()));
        assert_eq!(&encoded[..6], &[131, BINARY_EXT, 0, 1, 0, 0]);
        assert_eq!(crate::etf::decode(&encoded), Ok(Element::String(oversized)));
    }

    #[test]
    fn test_encode_string() {
        assert_eq!(
            encode(&Element::from("hi")),
            vec![131, 109, 0, 0, 0, 2, b'h', b'i']
        );
    }

    #[test]
    fn test_encode_lists() {
        assert_eq!(encode(&Element::List(vec![])), vec![131, 106]);
        assert_eq!(
            encode(&Element::List(vec![Element::SmallInt(1)])),
            vec![131, 108, 0, 0, 0, 1, 97, 1, 106]
        );
    }

    #[test]
    fn test_encode_map() {
        let mut map = ElementMap::new();
        map.insert("op".to_string(), Element::SmallInt(1));
        assert_eq!(
            encode(&Element::Map(map)),
            vec![131, 116, 0, 0, 0, 1, 109, 0, 0, 0, 2, b'o', b'p', 97, 1]
        );
    }
}
