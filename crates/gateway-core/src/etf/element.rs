//! Typed term values

use super::{decode, encode, ConversionError, DecodeError};
use std::collections::BTreeMap;
use std::fmt;

/// Mapping of string keys to elements
pub type ElementMap = BTreeMap<String, Element>;

static EMPTY_MAP: ElementMap = BTreeMap::new();

/// A single value of the binary term format
///
/// Each variant maps to exactly one tag on the wire, so a value survives an
/// encode/decode round trip unchanged. The exceptions are atoms spelled
/// `true`, `false` or `nil`, which decode as [`Element::Bool`] and
/// [`Element::Nil`], and NaN floats.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Nil,
    Bool(bool),
    Atom(String),
    /// Unsigned 8-bit integer
    SmallInt(u8),
    /// Fixed-width signed 32-bit integer
    Int(i32),
    /// Arbitrary-precision integer; snowflakes land here
    BigInt(i128),
    Float(f64),
    String(String),
    List(Vec<Element>),
    Map(ElementMap),
}

impl Element {
    /// Build an integer element using the narrowest kind that holds `value`
    #[must_use]
    pub fn integer(value: impl Into<i128>) -> Self {
        let value = value.into();
        if let Ok(small) = u8::try_from(value) {
            Self::SmallInt(small)
        } else if let Ok(int) = i32::try_from(value) {
            Self::Int(int)
        } else {
            Self::BigInt(value)
        }
    }

    /// Create an empty map element
    #[must_use]
    pub fn map() -> Self {
        Self::Map(ElementMap::new())
    }

    /// Name of this element's kind, for error messages and logs
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Bool(_) => "bool",
            Self::Atom(_) => "atom",
            Self::SmallInt(_) => "small integer",
            Self::Int(_) => "integer",
            Self::BigInt(_) => "big integer",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::List(_) => "list",
            Self::Map(_) => "map",
        }
    }

    #[must_use]
    pub const fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    /// Integer value of any integer-shaped element
    #[must_use]
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            Self::SmallInt(v) => Some(i128::from(*v)),
            Self::Int(v) => Some(i128::from(*v)),
            Self::BigInt(v) => Some(*v),
            _ => None,
        }
    }

    /// Convert an integer-shaped element into `T`
    ///
    /// # Errors
    /// [`ConversionError::NotAnInteger`] for non-integer kinds,
    /// [`ConversionError::Overflow`] when the value does not fit `T`.
    pub fn to_int<T>(&self) -> Result<T, ConversionError>
    where
        T: TryFrom<i128>,
    {
        let value = self
            .as_i128()
            .ok_or(ConversionError::NotAnInteger(self.kind()))?;
        T::try_from(value).map_err(|_| ConversionError::Overflow {
            value,
            target: std::any::type_name::<T>(),
        })
    }

    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) | Self::Atom(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            other => other.as_i128().map(|v| v as f64),
        }
    }

    #[must_use]
    pub fn as_list(&self) -> Option<&[Element]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_map(&self) -> Option<&ElementMap> {
        match self {
            Self::Map(map) => Some(map),
            _ => None,
        }
    }

    /// The map entries, or an empty map for every other kind
    #[must_use]
    pub fn fields(&self) -> &ElementMap {
        self.as_map().unwrap_or(&EMPTY_MAP)
    }

    /// Look up a key if this element is a map
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Element> {
        self.as_map().and_then(|map| map.get(key))
    }

    /// Encode this element, version byte included
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        encode(self)
    }

    /// Decode one element from a complete buffer
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        decode(bytes)
    }
}

impl Default for Element {
    fn default() -> Self {
        Self::map()
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => f.write_str("nil"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Atom(a) => write!(f, ":{a}"),
            Self::SmallInt(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::BigInt(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Map(map) => {
                f.write_str("{")?;
                for (i, (key, value)) in map.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key:?}: {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}

impl From<bool> for Element {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

macro_rules! impl_from_integer {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Element {
                fn from(value: $ty) -> Self {
                    Self::integer(value)
                }
            }
        )*
    };
}

impl_from_integer!(u8, u16, u32, u64, i8, i16, i32, i64);

impl From<f64> for Element {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Element {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Element {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<Element>> for Element {
    fn from(value: Vec<Element>) -> Self {
        Self::List(value)
    }
}

impl From<ElementMap> for Element {
    fn from(value: ElementMap) -> Self {
        Self::Map(value)
    }
}

impl<T: Into<Element>> From<Option<T>> for Element {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Nil, Into::into)
    }
}
