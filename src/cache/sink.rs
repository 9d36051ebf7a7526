//! Destinations for values produced by a group fetch.

use bytes::Bytes;

/// Receives the value of a successful `Group::get`.
pub trait Sink: Send {
    fn set_bytes(&mut self, value: Bytes);
}

/// Keeps the value as `Bytes`.
#[derive(Debug, Default)]
pub struct BytesSink {
    value: Option<Bytes>,
}

impl BytesSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self) -> Option<&Bytes> {
        self.value.as_ref()
    }

    /// The stored value, empty if nothing was written.
    pub fn into_bytes(self) -> Bytes {
        self.value.unwrap_or_default()
    }
}

impl Sink for BytesSink {
    fn set_bytes(&mut self, value: Bytes) {
        self.value = Some(value);
    }
}

/// Decodes the value as UTF-8, replacing invalid sequences.
#[derive(Debug, Default)]
pub struct StringSink {
    value: Option<String>,
}

impl StringSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn into_string(self) -> String {
        self.value.unwrap_or_default()
    }
}

impl Sink for StringSink {
    fn set_bytes(&mut self, value: Bytes) {
        self.value = Some(String::from_utf8_lossy(&value).into_owned());
    }
}
