//! Error types for the font sanitizer host.

use thiserror::Error;

/// Errors that can occur while sanitizing a font.
///
/// [`SanitizerError::Sanitize`] is the only expected outcome of a bad font.
/// Everything else means the host and the guest module disagree about the
/// ABI, or the runtime itself is broken; see [`SanitizerError::is_fatal`].
#[derive(Error, Debug)]
pub enum SanitizerError {
    /// The guest rejected the font as unsafe or unrepairable.
    #[error("failed to sanitize font")]
    Sanitize,

    /// Failed to initialize the Wasm runtime.
    #[error("failed to initialize runtime: {0}")]
    RuntimeInit(#[source] anyhow::Error),

    /// Failed to compile or link the sanitizer module.
    #[error("failed to load sanitizer module: {0}")]
    ModuleLoad(#[source] anyhow::Error),

    /// The sanitizer wasm file was not found.
    #[error("sanitizer wasm not found at: {0}")]
    ModuleNotFound(String),

    /// Failed to instantiate the compiled module for a call.
    #[error("failed to instantiate sanitizer module: {0}")]
    Instantiate(#[source] anyhow::Error),

    /// The guest broke the host/guest calling convention.
    #[error("guest ABI violation: {0}")]
    Abi(String),

    /// A callback arrived for a session that is not registered.
    #[error("callback for unknown session id={0}")]
    UnknownSession(u32),

    /// The guest reported an output length larger than the bound it was given.
    #[error("guest reported output length {length} exceeding the bound of {max} bytes")]
    OutputTooLarge {
        /// Length written into the output-size cell.
        length: u32,
        /// Bound written into the cell before the call.
        max: u32,
    },

    /// The guest trapped while processing.
    #[error("guest trapped: {0}")]
    Trap(#[source] anyhow::Error),

    /// The instance tried to grow its memory past the configured cap.
    #[error("memory limit exceeded: {0}")]
    MemoryLimitExceeded(String),

    /// The input does not fit into the 32-bit guest address space.
    #[error("input of {0} bytes is too large for the sandbox")]
    InputTooLarge(usize),

    /// I/O error while loading a module.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SanitizerError {
    /// Check if this error is a sanitization failure.
    pub fn is_sanitize(&self) -> bool {
        matches!(self, SanitizerError::Sanitize)
    }

    /// Check if this error represents a memory limit exceeded.
    pub fn is_memory_limit(&self) -> bool {
        matches!(self, SanitizerError::MemoryLimitExceeded(_))
    }

    /// Check if this error indicates a broken runtime or a host/guest mismatch.
    ///
    /// Fatal errors are never caused by the font alone and retrying the call
    /// will not help.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SanitizerError::RuntimeInit(_)
                | SanitizerError::ModuleLoad(_)
                | SanitizerError::ModuleNotFound(_)
                | SanitizerError::Instantiate(_)
                | SanitizerError::Abi(_)
                | SanitizerError::UnknownSession(_)
                | SanitizerError::OutputTooLarge { .. }
                | SanitizerError::Trap(_)
                | SanitizerError::MemoryLimitExceeded(_)
        )
    }

    /// Recover a host error that travelled through a guest trap.
    ///
    /// Callback failures are returned to wasmtime as `anyhow` errors, which
    /// surface again from the guest call. Anything that is not one of ours is
    /// a genuine trap.
    pub(crate) fn from_guest_call(err: anyhow::Error) -> Self {
        match err.downcast::<SanitizerError>() {
            Ok(err) => err,
            Err(err) => SanitizerError::Trap(err),
        }
    }
}

/// Result type alias for sanitizer operations.
pub type Result<T> = std::result::Result<T, SanitizerError>;
