//! Font container detection by magic number.

/// Font container formats recognized from their leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontFormat {
    /// OpenType with CFF outlines (`OTTO`).
    OpenType,
    /// TrueType outlines (`00 01 00 00` or Apple's `true`).
    TrueType,
    /// Font collection (`ttcf`).
    Collection,
    /// WOFF 1.0. Only ever seen on input; the sanitizer unpacks it.
    Woff,
    /// WOFF 2.0. Only ever seen on input; the sanitizer unpacks it.
    Woff2,
}

const MAGIC: [(&[u8; 4], FontFormat); 6] = [
    (b"OTTO", FontFormat::OpenType),
    (b"true", FontFormat::TrueType),
    (&[0x00, 0x01, 0x00, 0x00], FontFormat::TrueType),
    (b"ttcf", FontFormat::Collection),
    (b"wOFF", FontFormat::Woff),
    (b"wOF2", FontFormat::Woff2),
];

impl FontFormat {
    /// Classify a buffer, returning `None` if it does not start with a known
    /// magic number.
    pub fn detect(data: &[u8]) -> Option<Self> {
        MAGIC
            .iter()
            .find(|(magic, _)| data.starts_with(&magic[..]))
            .map(|&(_, format)| format)
    }

    /// Lowercase file extension including the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            FontFormat::OpenType => ".otf",
            FontFormat::TrueType => ".ttf",
            FontFormat::Collection => ".ttc",
            FontFormat::Woff => ".woff",
            FontFormat::Woff2 => ".woff2",
        }
    }
}

/// File extension for a font file, or an empty string if it is not
/// recognized.
///
/// Successfully processed fonts always have an extension, since the sanitizer
/// only accepts known SFNT versions.
pub fn extension(data: &[u8]) -> &'static str {
    FontFormat::detect(data).map_or("", |format| format.extension())
}
