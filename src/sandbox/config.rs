//! Sanitizer configuration with builder pattern.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::types::{MessageFn, MessageLevel, TableAction, TableActionFn, Tag};

/// Sub-font index meaning "return the whole collection".
pub const WHOLE_COLLECTION: u32 = 0xFFFF_FFFF;

/// Default output bound, as a multiple of the input length.
pub const DEFAULT_MAX_SIZE_FACTOR: usize = 8;

/// Engine-level configuration for a [`Sanitizer`](crate::Sanitizer).
#[derive(Debug, Clone)]
pub struct SanitizerConfig {
    /// Maximum linear memory of a single instance, in bytes.
    pub max_memory: u64,
    /// Alternate build of the sanitizer module. `None` uses the embedded one.
    pub module_path: Option<PathBuf>,
}

impl Default for SanitizerConfig {
    fn default() -> Self {
        Self {
            max_memory: 1024 * 1024 * 1024, // 1GB
            module_path: None,
        }
    }
}

impl SanitizerConfig {
    /// Create a new builder for SanitizerConfig.
    pub fn builder() -> SanitizerConfigBuilder {
        SanitizerConfigBuilder::default()
    }
}

/// Builder for creating SanitizerConfig instances.
#[derive(Debug, Clone, Default)]
pub struct SanitizerConfigBuilder {
    max_memory: Option<u64>,
    module_path: Option<PathBuf>,
}

impl SanitizerConfigBuilder {
    /// Set the per-instance memory limit in bytes.
    pub fn max_memory(mut self, bytes: u64) -> Self {
        self.max_memory = Some(bytes);
        self
    }

    /// Load the sanitizer module from a file instead of the embedded copy.
    pub fn module_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.module_path = Some(path.into());
        self
    }

    /// Build the SanitizerConfig.
    pub fn build(self) -> SanitizerConfig {
        let default = SanitizerConfig::default();
        SanitizerConfig {
            max_memory: self.max_memory.unwrap_or(default.max_memory),
            module_path: self.module_path.or(default.module_path),
        }
    }
}

/// Per-call options for [`Sanitizer::process`](crate::Sanitizer::process).
///
/// Every option is independent; unset options fall back to the sanitizer's
/// defaults.
///
/// ```rust,ignore
/// let options = ProcessOptions::new()
///     .index(0)
///     .table_action(|tag| if tag == *b"DSIG" { TableAction::Drop } else { TableAction::Default })
///     .messages(|level, msg| eprintln!("{level}: {msg}"));
/// ```
#[derive(Clone, Default)]
pub struct ProcessOptions {
    index: Option<u32>,
    table_action: Option<TableActionFn>,
    messages: Option<MessageFn>,
    max_size: Option<usize>,
}

impl ProcessOptions {
    /// Options with every setting at its default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract a single font from a collection. Ignored for other inputs.
    pub fn index(mut self, index: u32) -> Self {
        self.index = Some(index);
        self
    }

    /// Decide what to do with each table.
    pub fn table_action<F>(mut self, f: F) -> Self
    where
        F: Fn(Tag) -> TableAction + Send + Sync + 'static,
    {
        self.table_action = Some(Arc::new(f));
        self
    }

    /// Receive the sanitizer's errors and warnings.
    pub fn messages<F>(mut self, f: F) -> Self
    where
        F: Fn(MessageLevel, &str) + Send + Sync + 'static,
    {
        self.messages = Some(Arc::new(f));
        self
    }

    /// Set the maximum output length. Zero keeps the default of eight times
    /// the input length.
    pub fn max_size(mut self, bytes: usize) -> Self {
        self.max_size = (bytes != 0).then_some(bytes);
        self
    }

    /// Fill in defaults for an input of `input_len` bytes.
    pub(crate) fn resolve(&self, input_len: usize) -> ResolvedOptions {
        let max_size = self
            .max_size
            .unwrap_or_else(|| input_len.saturating_mul(DEFAULT_MAX_SIZE_FACTOR));
        let table_action: TableActionFn = match &self.table_action {
            Some(f) => Arc::clone(f),
            None => Arc::new(|_: Tag| TableAction::Default),
        };
        let messages: MessageFn = match &self.messages {
            Some(f) => Arc::clone(f),
            None => Arc::new(|_: MessageLevel, _: &str| {}),
        };
        ResolvedOptions {
            index: self.index.unwrap_or(WHOLE_COLLECTION),
            table_action,
            messages,
            max_size: u32::try_from(max_size).unwrap_or(u32::MAX),
        }
    }
}

impl fmt::Debug for ProcessOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessOptions")
            .field("index", &self.index)
            .field("table_action", &self.table_action.as_ref().map(|_| "<fn>"))
            .field("messages", &self.messages.as_ref().map(|_| "<fn>"))
            .field("max_size", &self.max_size)
            .finish()
    }
}

/// Options with every default applied, ready to hand to a session.
pub(crate) struct ResolvedOptions {
    pub index: u32,
    pub table_action: TableActionFn,
    pub messages: MessageFn,
    pub max_size: u32,
}
