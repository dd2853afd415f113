//! Timestamped control messages.
//!
//! A [`Message`] is a short, heterogeneous tuple of [`Element`]s plus the
//! absolute sample time at which it should be delivered. Element storage is an
//! inline fixed-size array, so building a message never touches the heap
//! unless it carries a symbol.
//!
//! Element accessors follow the runtime's contract model: the caller is
//! expected to know the message layout (usually via [`Message::has_format`]).
//! Reading an element as the wrong type is a contract violation that trips a
//! debug assertion; release builds return a neutral value instead.

#[cfg(not(feature = "std"))]
use alloc::{string::String, sync::Arc};
#[cfg(feature = "std")]
use std::sync::Arc;

use core::fmt::{self, Write as _};

/// Maximum number of elements a single message can carry.
pub const MAX_ELEMENTS: usize = 16;

/// Bytes charged against the message pool for a message header.
pub const MESSAGE_HEADER_BYTES: usize = 16;

/// Bytes charged against the message pool for each element slot.
pub const ELEMENT_BYTES: usize = 16;

/// Errors raised while building messages.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MessageError {
    /// The requested element count exceeds [`MAX_ELEMENTS`].
    #[error("message has {0} elements, maximum is {MAX_ELEMENTS}")]
    TooManyElements(usize),
    /// A message must carry at least one element.
    #[error("message must have at least one element")]
    Empty,
}

/// 32-bit digest of a symbol, used for receiver lookup and hash elements.
///
/// MurmurHash2 with the string length as seed.
pub fn symbol_hash(s: &str) -> u32 {
    const M: u32 = 0x5bd1_e995;
    const R: u32 = 24;

    let bytes = s.as_bytes();
    let mut h = bytes.len() as u32;

    let mut chunks = bytes.chunks_exact(4);
    for chunk in &mut chunks {
        let mut k = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        k = k.wrapping_mul(M);
        k ^= k >> R;
        k = k.wrapping_mul(M);
        h = h.wrapping_mul(M);
        h ^= k;
    }

    let tail = chunks.remainder();
    if tail.len() >= 3 {
        h ^= u32::from(tail[2]) << 16;
    }
    if tail.len() >= 2 {
        h ^= u32::from(tail[1]) << 8;
    }
    if !tail.is_empty() {
        h ^= u32::from(tail[0]);
        h = h.wrapping_mul(M);
    }

    h ^= h >> 13;
    h = h.wrapping_mul(M);
    h ^= h >> 15;
    h
}

/// Shared, immutable symbol string.
///
/// Cloning a symbol only bumps a reference count, so copying a message into the
/// pool or handing it to a hook never duplicates string data.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(Arc<str>);

impl Symbol {
    /// Creates a symbol from a string slice.
    pub fn new(s: &str) -> Self {
        Self(Arc::from(s))
    }

    /// Returns the symbol text.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the 32-bit digest of the symbol text.
    pub fn hash(&self) -> u32 {
        symbol_hash(&self.0)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One element of a message.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Element {
    /// A bare trigger with no value.
    #[default]
    Bang,
    /// A single-precision number.
    Float(f32),
    /// A symbol (string).
    Symbol(Symbol),
    /// A precomputed [`symbol_hash`] digest.
    Hash(u32),
}

impl Element {
    /// Returns the type tag of this element.
    pub fn element_type(&self) -> ElementType {
        match self {
            Element::Bang => ElementType::Bang,
            Element::Float(_) => ElementType::Float,
            Element::Symbol(_) => ElementType::Symbol,
            Element::Hash(_) => ElementType::Hash,
        }
    }

    /// Pool bytes charged for this element beyond its fixed slot.
    fn extra_bytes(&self) -> usize {
        match self {
            Element::Symbol(s) => s.as_str().len() + 1,
            Element::Bang | Element::Float(_) | Element::Hash(_) => 0,
        }
    }
}

impl From<f32> for Element {
    fn from(value: f32) -> Self {
        Element::Float(value)
    }
}

impl From<&str> for Element {
    fn from(value: &str) -> Self {
        Element::Symbol(Symbol::new(value))
    }
}

impl From<Symbol> for Element {
    fn from(value: Symbol) -> Self {
        Element::Symbol(value)
    }
}

/// Type tag of an [`Element`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ElementType {
    /// [`Element::Bang`]
    Bang,
    /// [`Element::Float`]
    Float,
    /// [`Element::Symbol`]
    Symbol,
    /// [`Element::Hash`]
    Hash,
}

impl ElementType {
    /// Returns the single-character format code (`b`, `f`, `s`, `h`).
    pub fn code(self) -> char {
        match self {
            ElementType::Bang => 'b',
            ElementType::Float => 'f',
            ElementType::Symbol => 's',
            ElementType::Hash => 'h',
        }
    }

    /// Parses a format code. Returns `None` for unknown codes.
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'b' => Some(ElementType::Bang),
            'f' => Some(ElementType::Float),
            's' => Some(ElementType::Symbol),
            'h' => Some(ElementType::Hash),
            _ => None,
        }
    }
}

/// A timestamped control message.
///
/// The timestamp is an absolute sample index on the owning context's clock.
#[derive(Clone, PartialEq)]
pub struct Message {
    timestamp: u64,
    len: u8,
    elements: [Element; MAX_ELEMENTS],
}

impl Message {
    /// Creates a message with `num_elements` elements, all initialised to bang.
    pub fn new(num_elements: usize, timestamp: u64) -> Result<Self, MessageError> {
        if num_elements == 0 {
            return Err(MessageError::Empty);
        }
        if num_elements > MAX_ELEMENTS {
            return Err(MessageError::TooManyElements(num_elements));
        }
        Ok(Self {
            timestamp,
            len: num_elements as u8,
            elements: core::array::from_fn(|_| Element::Bang),
        })
    }

    /// Creates a message from a slice of elements.
    pub fn from_elements(timestamp: u64, elements: &[Element]) -> Result<Self, MessageError> {
        let mut m = Self::new(elements.len(), timestamp)?;
        m.elements[..elements.len()].clone_from_slice(elements);
        Ok(m)
    }

    /// Creates a single-bang message.
    pub fn bang(timestamp: u64) -> Self {
        Self {
            timestamp,
            len: 1,
            elements: core::array::from_fn(|_| Element::Bang),
        }
    }

    /// Creates a single-float message.
    pub fn float(timestamp: u64, value: f32) -> Self {
        let mut m = Self::bang(timestamp);
        m.elements[0] = Element::Float(value);
        m
    }

    /// Creates a single-symbol message.
    pub fn symbol(timestamp: u64, value: &str) -> Self {
        let mut m = Self::bang(timestamp);
        m.elements[0] = Element::Symbol(Symbol::new(value));
        m
    }

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Always false; messages carry at least one element.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Delivery time in samples.
    #[inline]
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Sets the delivery time in samples.
    #[inline]
    pub fn set_timestamp(&mut self, timestamp: u64) {
        self.timestamp = timestamp;
    }

    /// The populated elements.
    #[inline]
    pub fn elements(&self) -> &[Element] {
        &self.elements[..self.len()]
    }

    /// Returns the element at `index`.
    #[inline]
    pub fn element(&self, index: usize) -> &Element {
        debug_assert!(index < self.len(), "element index {index} out of range");
        &self.elements[index]
    }

    /// Returns the type of the element at `index`.
    pub fn element_type(&self, index: usize) -> ElementType {
        self.element(index).element_type()
    }

    /// True if the element at `index` is a bang.
    pub fn is_bang(&self, index: usize) -> bool {
        matches!(self.element(index), Element::Bang)
    }

    /// True if the element at `index` is a float.
    pub fn is_float(&self, index: usize) -> bool {
        matches!(self.element(index), Element::Float(_))
    }

    /// True if the element at `index` is a symbol.
    pub fn is_symbol(&self, index: usize) -> bool {
        matches!(self.element(index), Element::Symbol(_))
    }

    /// True if the element at `index` is a hash.
    pub fn is_hash(&self, index: usize) -> bool {
        matches!(self.element(index), Element::Hash(_))
    }

    /// True if the element at `index` is the symbol `s`.
    pub fn is_symbol_eq(&self, index: usize, s: &str) -> bool {
        matches!(self.element(index), Element::Symbol(sym) if sym.as_str() == s)
    }

    /// Sets the element at `index` to a bang.
    pub fn set_bang(&mut self, index: usize) {
        self.set(index, Element::Bang);
    }

    /// Sets the element at `index` to a float.
    pub fn set_float(&mut self, index: usize, value: f32) {
        self.set(index, Element::Float(value));
    }

    /// Sets the element at `index` to a symbol.
    pub fn set_symbol(&mut self, index: usize, value: &str) {
        self.set(index, Element::Symbol(Symbol::new(value)));
    }

    /// Sets the element at `index` to a hash digest.
    pub fn set_hash(&mut self, index: usize, value: u32) {
        self.set(index, Element::Hash(value));
    }

    /// Sets the element at `index`.
    pub fn set(&mut self, index: usize, element: Element) {
        debug_assert!(index < self.len(), "element index {index} out of range");
        self.elements[index] = element;
    }

    /// Reads the element at `index` as a float.
    pub fn get_float(&self, index: usize) -> f32 {
        match self.element(index) {
            Element::Float(f) => *f,
            other => {
                debug_assert!(false, "element {index} is {other:?}, not a float");
                0.0
            }
        }
    }

    /// Reads the element at `index` as a symbol.
    pub fn get_symbol(&self, index: usize) -> &str {
        match self.element(index) {
            Element::Symbol(s) => s.as_str(),
            other => {
                debug_assert!(false, "element {index} is {other:?}, not a symbol");
                ""
            }
        }
    }

    /// Reads the element at `index` as a hash.
    ///
    /// Symbols are hashed on the fly and floats hash their bit pattern, so any
    /// element can act as a routing key.
    pub fn get_hash(&self, index: usize) -> u32 {
        match self.element(index) {
            Element::Hash(h) => *h,
            Element::Symbol(s) => s.hash(),
            Element::Float(f) => f.to_bits(),
            Element::Bang => symbol_hash("bang"),
        }
    }

    /// True iff the element types match `fmt` exactly, one code per element.
    ///
    /// Codes: `b` bang, `f` float, `s` symbol, `h` hash.
    pub fn has_format(&self, fmt: &str) -> bool {
        if fmt.len() != self.len() {
            return false;
        }
        fmt.chars()
            .zip(self.elements())
            .all(|(code, e)| ElementType::from_code(code) == Some(e.element_type()))
    }

    /// Bytes this message occupies when copied into the message pool.
    pub fn byte_size(&self) -> usize {
        MESSAGE_HEADER_BYTES
            + ELEMENT_BYTES * self.len()
            + self.elements().iter().map(Element::extra_bytes).sum::<usize>()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.elements().iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            match e {
                Element::Bang => f.write_str("bang")?,
                Element::Float(v) => write_float(f, *v)?,
                Element::Symbol(s) => f.write_str(s.as_str())?,
                Element::Hash(h) => write!(f, "0x{h:08x}")?,
            }
        }
        Ok(())
    }
}

/// Writes `v` the way C's `%g` does: six significant digits, trailing zeros
/// dropped, exponent form below `1e-4` and from `1e6` up.
fn write_float(f: &mut fmt::Formatter<'_>, v: f32) -> fmt::Result {
    if v.is_nan() {
        return f.write_str("nan");
    }
    if v.is_infinite() {
        return f.write_str(if v > 0.0 { "inf" } else { "-inf" });
    }
    if v == 0.0 {
        return f.write_str(if v.is_sign_negative() { "-0" } else { "0" });
    }

    let v = f64::from(v);
    // rounding to six digits can carry into the exponent, so take it from
    // the rounded scientific form
    let mut sci = DigitBuf::new();
    write!(sci, "{v:.5e}")?;
    let (mantissa, exp) = sci.as_str().split_once('e').ok_or(fmt::Error)?;
    let exp: i32 = exp.parse().map_err(|_| fmt::Error)?;
    if !(-4..6).contains(&exp) {
        let sign = if exp < 0 { '-' } else { '+' };
        return write!(f, "{}e{sign}{:02}", trim_zeros(mantissa), exp.unsigned_abs());
    }

    let precision = usize::try_from(5 - exp).unwrap_or(0);
    let mut fixed = DigitBuf::new();
    write!(fixed, "{v:.precision$}")?;
    f.write_str(trim_zeros(fixed.as_str()))
}

fn trim_zeros(digits: &str) -> &str {
    if digits.contains('.') {
        digits.trim_end_matches('0').trim_end_matches('.')
    } else {
        digits
    }
}

/// Stack buffer for formatting one number without touching the heap.
struct DigitBuf {
    buf: [u8; 32],
    len: usize,
}

impl DigitBuf {
    fn new() -> Self {
        Self {
            buf: [0; 32],
            len: 0,
        }
    }

    fn as_str(&self) -> &str {
        core::str::from_utf8(&self.buf[..self.len]).unwrap_or("")
    }
}

impl fmt::Write for DigitBuf {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let end = self.len + s.len();
        let dst = self.buf.get_mut(self.len..end).ok_or(fmt::Error)?;
        dst.copy_from_slice(s.as_bytes());
        self.len = end;
        Ok(())
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("timestamp", &self.timestamp)
            .field("elements", &self.elements())
            .finish()
    }
}
