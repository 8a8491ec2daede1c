//! Prelude module for convenient imports.

pub use crate::error::{Result, SanitizerError};
pub use crate::format::{extension, FontFormat};
pub use crate::sandbox::{
    config::{ProcessOptions, SanitizerConfig},
    executor::Sanitizer,
};
pub use crate::types::{MessageLevel, TableAction, Tag};
