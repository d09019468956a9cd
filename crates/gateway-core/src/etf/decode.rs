//! Term decoder

use super::tags::{
    ATOM_EXT, ATOM_UTF8_EXT, BINARY_EXT, INTEGER_EXT, LARGE_BIG_EXT, LIST_EXT, MAP_EXT,
    NEW_FLOAT_EXT, NIL_EXT, SMALL_ATOM_EXT, SMALL_ATOM_UTF8_EXT, SMALL_BIG_EXT,
    SMALL_INTEGER_EXT, STRING_EXT, VERSION,
};
use super::{DecodeError, Element, ElementMap};

/// Maximum nesting of lists and maps
pub const MAX_DEPTH: usize = 256;

/// Decode one element from a complete buffer
///
/// The buffer must start with the version byte and contain exactly one term.
pub fn decode(bytes: &[u8]) -> Result<Element, DecodeError> {
    let mut reader = Reader::new(bytes);

    let version = reader.u8()?;
    if version != VERSION {
        return Err(DecodeError::MissingVersion(version));
    }

    let element = reader.element(0)?;

    match reader.remaining() {
        0 => Ok(element),
        n => Err(DecodeError::TrailingBytes(n)),
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, needed: usize) -> Result<&'a [u8], DecodeError> {
        let remaining = self.remaining();
        if remaining < needed {
            return Err(DecodeError::Truncated { needed, remaining });
        }
        let slice = &self.buf[self.pos..self.pos + needed];
        self.pos += needed;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, DecodeError> {
        self.array().map(u16::from_be_bytes)
    }

    fn u32(&mut self) -> Result<u32, DecodeError> {
        self.array().map(u32::from_be_bytes)
    }

    fn peek(&self) -> Option<u8> {
        self.buf.get(self.pos).copied()
    }

    fn element(&mut self, depth: usize) -> Result<Element, DecodeError> {
        if depth > MAX_DEPTH {
            return Err(DecodeError::TooDeep(MAX_DEPTH));
        }

        let tag = self.u8()?;
        match tag {
            SMALL_INTEGER_EXT => Ok(Element::SmallInt(self.u8()?)),
            INTEGER_EXT => Ok(Element::Int(self.array().map(i32::from_be_bytes)?)),
            SMALL_BIG_EXT => {
                let len = usize::from(self.u8()?);
                self.big(len)
            }
            LARGE_BIG_EXT => {
                let len = self.u32()? as usize;
                self.big(len)
            }
            NEW_FLOAT_EXT => Ok(Element::Float(self.array().map(f64::from_be_bytes)?)),
            ATOM_EXT | ATOM_UTF8_EXT => {
                let len = usize::from(self.u16()?);
                self.atom(len)
            }
            SMALL_ATOM_EXT | SMALL_ATOM_UTF8_EXT => {
                let len = usize::from(self.u8()?);
                self.atom(len)
            }
            BINARY_EXT => {
                let len = self.u32()? as usize;
                self.utf8(len).map(Element::String)
            }
            STRING_EXT => {
                let len = usize::from(self.u16()?);
                let bytes = self.take(len)?;
                Ok(Element::List(bytes.iter().copied().map(Element::SmallInt).collect()))
            }
            NIL_EXT => Ok(Element::List(Vec::new())),
            LIST_EXT => self.list(depth),
            MAP_EXT => self.map(depth),
            other => Err(DecodeError::UnknownTag(other)),
        }
    }

    fn utf8(&mut self, len: usize) -> Result<String, DecodeError> {
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|_| DecodeError::InvalidUtf8)
    }

    fn atom(&mut self, len: usize) -> Result<Element, DecodeError> {
        let name = self.utf8(len)?;
        Ok(match name.as_str() {
            "true" => Element::Bool(true),
            "false" => Element::Bool(false),
            "nil" | "null" => Element::Nil,
            _ => Element::Atom(name),
        })
    }

    fn big(&mut self, len: usize) -> Result<Element, DecodeError> {
        let negative = self.u8()? != 0;
        let digits = self.take(len)?;

        let mut magnitude: u128 = 0;
        for (i, digit) in digits.iter().enumerate() {
            if *digit == 0 {
                continue;
            }
            if i >= 16 {
                return Err(DecodeError::IntegerOverflow);
            }
            magnitude |= u128::from(*digit) << (8 * i);
        }

        let value = if negative {
            0i128
                .checked_sub_unsigned(magnitude)
                .ok_or(DecodeError::IntegerOverflow)?
        } else {
            i128::try_from(magnitude).map_err(|_| DecodeError::IntegerOverflow)?
        };
        Ok(Element::BigInt(value))
    }

    fn list(&mut self, depth: usize) -> Result<Element, DecodeError> {
        let len = self.u32()? as usize;
        // every element takes at least one byte
        let mut items = Vec::with_capacity(len.min(self.remaining()));
        for _ in 0..len {
            items.push(self.element(depth + 1)?);
        }

        match self.peek() {
            Some(NIL_EXT) => {
                self.pos += 1;
                Ok(Element::List(items))
            }
            Some(_) => Err(DecodeError::ImproperList),
            None => Err(DecodeError::Truncated {
                needed: 1,
                remaining: 0,
            }),
        }
    }

    fn map(&mut self, depth: usize) -> Result<Element, DecodeError> {
        let len = self.u32()? as usize;
        let mut map = ElementMap::new();
        for _ in 0..len {
            let key = match self.element(depth + 1)? {
                Element::String(key) | Element::Atom(key) => key,
                Element::Bool(flag) => flag.to_string(),
                Element::Nil => "nil".to_string(),
                other => return Err(DecodeError::InvalidMapKey(other.kind())),
            };
            let value = self.element(depth + 1)?;
            map.insert(key, value);
        }
        Ok(Element::Map(map))
    }
}
