//! Bounded JSON encoder
//!
//! Builds a JSON object directly into a caller-owned byte buffer. Nothing is
//! allocated and nothing is ever written past the buffer.
//!
//! Overflow policy: every member is measured before it is written. If the
//! member, the closing braces of all open objects and the trailing 0 byte
//! do not fit, the member is skipped whole. The object still closes, so the
//! output is always valid JSON, just possibly missing trailing members.
//!
//! Limitations: only `"` and `\` are escaped in string values, keys are
//! written verbatim, and at most one nested object level is supported.

/// Decimal places used when a [`Reading::Float`] is encoded
pub const DEFAULT_DECIMALS: u8 = 2;

/// Fractional digits are capped here
pub const MAX_DECIMALS: u8 = 9;

/// Written in place of a positive or negative infinity
const INFINITY_SENTINEL: &str = "9999999";

/// Outer object plus one nested object
const MAX_DEPTH: u8 = 2;

/// A telemetry value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading<'a> {
    Float(f64),
    Int(i64),
    Unsigned(u64),
    Bool(bool),
    Text(&'a str),
}

impl From<f64> for Reading<'_> {
    fn from(v: f64) -> Self {
        Reading::Float(v)
    }
}

impl From<f32> for Reading<'_> {
    fn from(v: f32) -> Self {
        Reading::Float(v as f64)
    }
}

impl From<i64> for Reading<'_> {
    fn from(v: i64) -> Self {
        Reading::Int(v)
    }
}

impl From<i32> for Reading<'_> {
    fn from(v: i32) -> Self {
        Reading::Int(v as i64)
    }
}

impl From<u64> for Reading<'_> {
    fn from(v: u64) -> Self {
        Reading::Unsigned(v)
    }
}

impl From<u32> for Reading<'_> {
    fn from(v: u32) -> Self {
        Reading::Unsigned(v as u64)
    }
}

impl From<bool> for Reading<'_> {
    fn from(v: bool) -> Self {
        Reading::Bool(v)
    }
}

impl<'a> From<&'a str> for Reading<'a> {
    fn from(v: &'a str) -> Self {
        Reading::Text(v)
    }
}

/// Incremental JSON object writer over a fixed buffer
pub struct JsonEncoder<'a> {
    buf: &'a mut [u8],
    pos: usize,
    first: bool,
    /// Objects opened and not yet closed
    depth: u8,
    /// Objects refused for lack of space or depth; their members are dropped
    suppressed: u8,
}

impl<'a> JsonEncoder<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        if let Some(b) = buf.first_mut() {
            *b = 0;
        }
        Self {
            buf,
            pos: 0,
            first: true,
            depth: 0,
            suppressed: 0,
        }
    }

    /// Discard everything written so far
    pub fn reset(&mut self) {
        self.pos = 0;
        self.first = true;
        self.depth = 0;
        self.suppressed = 0;
        if let Some(b) = self.buf.first_mut() {
            *b = 0;
        }
    }

    pub fn start_object(&mut self) {
        if self.suppressed > 0 || self.depth > 0 || !self.fits(2) {
            self.suppressed += 1;
            return;
        }
        self.push(b'{');
        self.depth = 1;
        self.first = true;
        self.terminate();
    }

    pub fn end_object(&mut self) {
        if self.suppressed > 0 {
            self.suppressed -= 1;
            return;
        }
        if self.depth == 0 {
            return;
        }
        // Space for every closer was reserved when its object opened
        self.push(b'}');
        self.depth -= 1;
        self.first = false;
        self.terminate();
    }

    /// Open `"key":{`; only valid directly inside the outer object
    pub fn start_nested_object(&mut self, key: &str) {
        if self.suppressed > 0 || self.depth == 0 || self.depth >= MAX_DEPTH {
            self.suppressed += 1;
            return;
        }
        // member prefix, '{', and the new closer
        if !self.fits(self.comma_len() + key.len() + 3 + 2) {
            self.suppressed += 1;
            return;
        }
        self.write_key(key);
        self.push(b'{');
        self.depth += 1;
        self.first = true;
        self.terminate();
    }

    pub fn add_str(&mut self, key: &str, value: &str) {
        if !self.begin_member(key, escaped_len(value) + 2) {
            return;
        }
        self.push(b'"');
        for &b in value.as_bytes() {
            if b == b'"' || b == b'\\' {
                self.push(b'\\');
            }
            self.push(b);
        }
        self.push(b'"');
        self.terminate();
    }

    pub fn add_i32(&mut self, key: &str, value: i32) {
        self.add_i64(key, value as i64);
    }

    pub fn add_i64(&mut self, key: &str, value: i64) {
        let mut num = Scratch::new();
        num.write_i64(value);
        self.add_raw(key, num.as_bytes());
    }

    pub fn add_u64(&mut self, key: &str, value: u64) {
        let mut num = Scratch::new();
        num.write_u64(value);
        self.add_raw(key, num.as_bytes());
    }

    pub fn add_f32(&mut self, key: &str, value: f32, decimals: u8) {
        self.add_f64(key, value as f64, decimals);
    }

    /// Fixed-point number with `decimals` truncated fractional digits
    pub fn add_f64(&mut self, key: &str, value: f64, decimals: u8) {
        let mut num = Scratch::new();
        num.write_f64(value, decimals);
        self.add_raw(key, num.as_bytes());
    }

    pub fn add_bool(&mut self, key: &str, value: bool) {
        let text: &[u8] = if value { b"true" } else { b"false" };
        self.add_raw(key, text);
    }

    pub fn add_reading(&mut self, key: &str, value: &Reading<'_>) {
        match *value {
            Reading::Float(v) => self.add_f64(key, v, DEFAULT_DECIMALS),
            Reading::Int(v) => self.add_i64(key, v),
            Reading::Unsigned(v) => self.add_u64(key, v),
            Reading::Bool(v) => self.add_bool(key, v),
            Reading::Text(v) => self.add_str(key, v),
        }
    }

    /// True if `needed` more bytes fit alongside the pending closers
    pub fn has_space(&self, needed: usize) -> bool {
        self.fits(needed)
    }

    pub fn len(&self) -> usize {
        self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.pos == 0
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Encoded bytes; the byte after them in the buffer is 0
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.pos]
    }

    pub fn as_str(&self) -> &str {
        // Only whole &str values and ASCII punctuation are ever written
        core::str::from_utf8(self.as_bytes()).unwrap_or("")
    }

    fn fits(&self, n: usize) -> bool {
        self.pos + n + self.depth as usize + 1 <= self.buf.len()
    }

    fn comma_len(&self) -> usize {
        usize::from(!self.first)
    }

    fn begin_member(&mut self, key: &str, value_len: usize) -> bool {
        if self.suppressed > 0 || self.depth == 0 {
            return false;
        }
        if !self.fits(self.comma_len() + key.len() + 3 + value_len) {
            return false;
        }
        self.write_key(key);
        true
    }

    fn add_raw(&mut self, key: &str, value: &[u8]) {
        if !self.begin_member(key, value.len()) {
            return;
        }
        self.push_bytes(value);
        self.terminate();
    }

    fn write_key(&mut self, key: &str) {
        if !self.first {
            self.push(b',');
        }
        self.first = false;
        self.push(b'"');
        self.push_bytes(key.as_bytes());
        self.push_bytes(b"\":");
    }

    fn push(&mut self, b: u8) {
        self.buf[self.pos] = b;
        self.pos += 1;
    }

    fn push_bytes(&mut self, bytes: &[u8]) {
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }

    fn terminate(&mut self) {
        if let Some(b) = self.buf.get_mut(self.pos) {
            *b = 0;
        }
    }
}

fn escaped_len(s: &str) -> usize {
    s.len() + s.bytes().filter(|&b| b == b'"' || b == b'\\').count()
}

/// Stack space for one formatted number
struct Scratch {
    bytes: [u8; 40],
    len: usize,
}

impl Scratch {
    fn new() -> Self {
        Self {
            bytes: [0; 40],
            len: 0,
        }
    }

    fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    fn push(&mut self, b: u8) {
        if self.len < self.bytes.len() {
            self.bytes[self.len] = b;
            self.len += 1;
        }
    }

    fn push_str(&mut self, s: &str) {
        for &b in s.as_bytes() {
            self.push(b);
        }
    }

    fn write_u64(&mut self, mut value: u64) {
        let mut digits = [0u8; 20];
        let mut n = 0;
        loop {
            digits[n] = b'0' + (value % 10) as u8;
            n += 1;
            value /= 10;
            if value == 0 {
                break;
            }
        }
        for &d in digits[..n].iter().rev() {
            self.push(d);
        }
    }

    fn write_i64(&mut self, value: i64) {
        if value < 0 {
            self.push(b'-');
        }
        self.write_u64(value.unsigned_abs());
    }

    fn write_f64(&mut self, value: f64, decimals: u8) {
        if value.is_nan() {
            self.push_str("null");
            return;
        }
        if value.is_infinite() {
            if value < 0.0 {
                self.push(b'-');
            }
            self.push_str(INFINITY_SENTINEL);
            return;
        }

        let mut value = value;
        if value < 0.0 {
            self.push(b'-');
            value = -value;
        }

        // `as` saturates, so absurd magnitudes stay bounded
        let int_part = value as u64;
        self.write_u64(int_part);

        let decimals = decimals.min(MAX_DECIMALS);
        if decimals > 0 {
            self.push(b'.');
            let mut frac = value - int_part as f64;
            for _ in 0..decimals {
                frac *= 10.0;
                let digit = (frac as u8).min(9);
                self.push(b'0' + digit);
                frac -= digit as f64;
            }
        }
    }
}
