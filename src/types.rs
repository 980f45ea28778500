//! Core scalar types: `Symbol`, `Weight`, trading-day indices.

use std::fmt;

/// Maximum number of bytes a [`Symbol`] can hold inline.
const SYMBOL_CAP: usize = 15;

/// A short asset identifier, stored inline (no heap allocation).
///
/// Mirrors the crate's `Price`/`OrderId` newtype idiom: `Copy`, `Ord`, `Hash`,
/// cheap to move through `BTreeMap`/`FxHashMap` keys without cloning a `String`
/// per lookup. Symbols longer than 15 bytes are truncated — real tickers never
/// approach that length.
#[derive(Clone, Copy, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub struct Symbol {
    bytes: [u8; SYMBOL_CAP],
    len: u8,
}

impl Symbol {
    /// Build a symbol from a string slice, truncating to `SYMBOL_CAP` bytes.
    pub fn new(s: &str) -> Self {
        let mut bytes = [0u8; SYMBOL_CAP];
        let n = s.len().min(SYMBOL_CAP);
        bytes[..n].copy_from_slice(&s.as_bytes()[..n]);
        Self {
            bytes,
            len: n as u8,
        }
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or("")
    }
}

impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl std::hash::Hash for Symbol {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl PartialOrd for Symbol {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Symbol {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_str().cmp(other.as_str())
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({})", self.as_str())
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Symbol::new(s)
    }
}

impl From<Symbol> for String {
    fn from(s: Symbol) -> Self {
        s.as_str().to_owned()
    }
}

impl TryFrom<String> for Symbol {
    type Error = std::convert::Infallible;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Ok(Symbol::new(&s))
    }
}

/// A trading-day index into a [`crate::data::PriceMatrix`]'s chronological row order.
///
/// The panel's own row index IS the calendar; no on-disk date parsing is in
/// scope for this crate.
pub type DayIndex = u32;

/// A portfolio weight, finite in `[0, 1]`.
pub type Weight = f64;
