//! Values exchanged with the sanitizer through its callbacks.

use std::fmt;
use std::sync::Arc;

/// A 4-byte SFNT table tag such as `head` or `glyf`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(pub [u8; 4]);

impl Tag {
    /// Create a tag from its four bytes.
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Unpack a tag the guest packed into an integer.
    ///
    /// The most significant byte is the first character of the tag.
    pub const fn from_packed(packed: u32) -> Self {
        Self(packed.to_be_bytes())
    }

    /// Pack the tag the way the guest does.
    pub const fn to_packed(self) -> u32 {
        u32::from_be_bytes(self.0)
    }

    /// Get the raw tag bytes.
    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl From<[u8; 4]> for Tag {
    fn from(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }
}

impl PartialEq<[u8; 4]> for Tag {
    fn eq(&self, other: &[u8; 4]) -> bool {
        &self.0 == other
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{:02x}", b)?;
            }
        }
        Ok(())
    }
}

/// What the sanitizer should do with a table.
///
/// The discriminants are the codes the guest expects back from the
/// table-action callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u32)]
pub enum TableAction {
    /// Let the sanitizer decide.
    #[default]
    Default = 0,
    /// Sanitize the table, possibly dropping it.
    Sanitize = 1,
    /// Serialize the table unchanged.
    PassThru = 2,
    /// Drop the table.
    Drop = 3,
}

impl TableAction {
    /// The code returned to the guest.
    pub const fn code(self) -> u32 {
        self as u32
    }
}

/// Severity of a diagnostic emitted by the sanitizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageLevel {
    Error,
    Warning,
}

impl MessageLevel {
    /// Map the guest's level argument. Anything that is not an error is
    /// reported as a warning.
    pub const fn from_raw(level: u32) -> Self {
        match level {
            0 => MessageLevel::Error,
            _ => MessageLevel::Warning,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MessageLevel::Error => "error",
            MessageLevel::Warning => "warning",
        }
    }
}

impl fmt::Display for MessageLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-table policy callback.
pub type TableActionFn = Arc<dyn Fn(Tag) -> TableAction + Send + Sync>;

/// Diagnostic message callback.
pub type MessageFn = Arc<dyn Fn(MessageLevel, &str) + Send + Sync>;
