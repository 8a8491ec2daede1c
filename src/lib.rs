//! # OTS Sandbox
//!
//! Font sanitization using the OpenType Sanitizer compiled to WebAssembly,
//! running in the Wasmtime runtime.
//!
//! Fonts are untrusted input. Instead of parsing them in-process, this crate
//! hands them to a sanitizer module that runs in an isolated Wasm instance
//! and re-serializes only what it could validate:
//!
//! - **Instance per call**: every font gets a fresh instance with private
//!   linear memory, discarded afterwards
//! - **Compile once**: the module is compiled and linked once per process
//! - **Bounded output**: output larger than a configurable bound is rejected
//! - **Memory limits**: each instance's linear memory is capped
//! - **No capabilities**: the guest sees no filesystem, environment or network
//!
//! ## Example
//!
//! ```rust,ignore
//! use ots_sandbox::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let input = std::fs::read("font.woff2")?;
//!     let options = ProcessOptions::new()
//!         .table_action(|tag| if tag == *b"DSIG" { TableAction::Drop } else { TableAction::Default })
//!         .messages(|level, msg| eprintln!("ots: {level}: {msg}"));
//!
//!     let output = ots_sandbox::process(&input, &options)?;
//!     std::fs::write(format!("font{}", extension(&output)), output)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Callbacks
//!
//! While a font is processed the sanitizer calls back into the host to ask
//! what to do with each table and to report errors and warnings. Each call
//! is registered under a session id that the guest passes back, so the
//! callbacks of concurrent calls never mix.

pub mod error;
pub mod format;
pub mod prelude;
pub mod sandbox;
pub mod types;

// Re-export main types at crate root for convenience
pub use error::{Result, SanitizerError};
pub use format::{extension, FontFormat};
pub use sandbox::config::{ProcessOptions, SanitizerConfig, SanitizerConfigBuilder};
pub use sandbox::executor::Sanitizer;
pub use sandbox::module::compile;
pub use types::{MessageLevel, TableAction, Tag};

/// Process a font with the process-wide sanitizer built from the embedded
/// module.
///
/// See [`Sanitizer::process`].
pub fn process(input: &[u8], options: &ProcessOptions) -> Result<Vec<u8>> {
    compile()?.process(input, options)
}
