//! Running a single font through the sandboxed sanitizer.

use wasmtime::{Store, TypedFunc};

use crate::error::{Result, SanitizerError};
use crate::sandbox::config::{ProcessOptions, SanitizerConfig};
use crate::sandbox::limits::HostState;
use crate::sandbox::memory::{guest_len, GuestMemory};
use crate::sandbox::module::CompiledModule;
use crate::sandbox::session::sessions;

/// Name of the guest's processing entry point.
pub const PROCESS_EXPORT: &str = "gots_process";

/// Name of the WASI reactor initializer, called when present.
const INITIALIZE_EXPORT: &str = "_initialize";

/// `gots_process(id, input, input_len, index, output_size_cell) -> output`
type ProcessFn = TypedFunc<(u32, u32, u32, u32, u32), u32>;

/// A compiled font sanitizer.
///
/// Cloning is cheap and clones share the compiled module. Every call to
/// [`process`](Self::process) runs in its own fresh instance, so a sanitizer
/// can be used from many threads at once.
#[derive(Debug, Clone)]
pub struct Sanitizer {
    config: SanitizerConfig,
    module: CompiledModule,
}

impl Sanitizer {
    /// Create a sanitizer from the configured module.
    pub fn new(config: SanitizerConfig) -> Result<Self> {
        let module = CompiledModule::from_config(&config)?;
        Ok(Self { config, module })
    }

    /// Create a sanitizer from an in-memory build of the module.
    pub fn from_bytes(wasm: &[u8], config: SanitizerConfig) -> Result<Self> {
        let module = CompiledModule::new(wasm)?;
        Ok(Self { config, module })
    }

    /// Get the configuration.
    pub fn config(&self) -> &SanitizerConfig {
        &self.config
    }

    /// Sanitize and re-serialize a TTF/OTF/TTC font, decompressing WOFF and
    /// WOFF2 input.
    ///
    /// Returns [`SanitizerError::Sanitize`] if the font was rejected. Any
    /// other error means the sandbox itself failed; see
    /// [`SanitizerError::is_fatal`].
    pub fn process(&self, input: &[u8], options: &ProcessOptions) -> Result<Vec<u8>> {
        let input_len = guest_len(input.len())?;
        let resolved = options.resolve(input.len());
        let index = resolved.index;
        let max_size = resolved.max_size;

        let guard = sessions().open(&resolved);
        let id = guard.id();
        let session = guard
            .session()
            .ok_or(SanitizerError::UnknownSession(id))?;
        tracing::debug!(session = id, input_len, max_size, index, "processing font");

        let mut store = HostState::new(id, self.config.max_memory).into_store(self.module.engine());

        let instance = self
            .module
            .instance_pre()
            .instantiate(&mut store)
            .map_err(|e| {
                if store.data().limiter.memory_denied() {
                    return SanitizerError::MemoryLimitExceeded(
                        "memory limit exceeded during instantiation".to_string(),
                    );
                }
                SanitizerError::Instantiate(e)
            })?;

        let memory = GuestMemory::from_instance(&mut store, &instance)?;
        session.attach_memory(memory.memory());

        if let Some(init) = instance.get_func(&mut store, INITIALIZE_EXPORT) {
            init.typed::<(), ()>(&store)
                .map_err(|e| SanitizerError::Abi(format!("bad `{INITIALIZE_EXPORT}` export: {e}")))?
                .call(&mut store, ())
                .map_err(|e| limit_error(&store, SanitizerError::from_guest_call(e)))?;
        }

        let process: ProcessFn = instance
            .get_typed_func(&mut store, PROCESS_EXPORT)
            .map_err(|e| SanitizerError::Abi(format!("bad `{PROCESS_EXPORT}` export: {e}")))?;

        let input_ptr = memory
            .alloc_bytes(&mut store, input)
            .map_err(|e| limit_error(&store, e))?;
        let size_cell = memory
            .alloc(&mut store, 4)
            .map_err(|e| limit_error(&store, e))?;
        memory.write_u32_le(&mut store, size_cell, max_size)?;

        let output_ptr = process
            .call(&mut store, (id, input_ptr, input_len, index, size_cell))
            .map_err(|e| limit_error(&store, SanitizerError::from_guest_call(e)))?;

        if output_ptr == 0 {
            tracing::debug!(session = id, "font rejected");
            return Err(SanitizerError::Sanitize);
        }

        let output_len = memory.read_u32_le(&store, size_cell)?;
        if output_len > max_size {
            tracing::error!(session = id, output_len, max_size, "output length exceeds bound");
            return Err(SanitizerError::OutputTooLarge {
                length: output_len,
                max: max_size,
            });
        }

        let output = memory.read_bytes(&store, output_ptr, output_len)?;
        tracing::debug!(
            session = id,
            output_len,
            peak_memory = store.data().limiter.peak_memory(),
            "font sanitized"
        );
        Ok(output)
    }

    /// Process a font on tokio's blocking pool.
    ///
    /// The guest call cannot be interrupted; dropping the returned future
    /// detaches the call but does not stop it.
    pub async fn process_async(&self, input: Vec<u8>, options: ProcessOptions) -> Result<Vec<u8>> {
        let sanitizer = self.clone();
        tokio::task::spawn_blocking(move || sanitizer.process(&input, &options))
            .await
            .map_err(|e| SanitizerError::Trap(anyhow::anyhow!("task panicked: {}", e)))?
    }
}

/// Attribute a guest trap to a refused growth, if one happened.
///
/// Host errors raised by callbacks are passed through untouched; only a
/// genuine trap is blamed on the limiter.
fn limit_error(store: &Store<HostState>, err: SanitizerError) -> SanitizerError {
    let limiter = &store.data().limiter;
    match err {
        SanitizerError::Trap(_) if limiter.memory_denied() => SanitizerError::MemoryLimitExceeded(
            format!("guest trapped after a refused memory growth (peak {} bytes)", limiter.peak_memory()),
        ),
        SanitizerError::Trap(trap) if limiter.table_denied() => {
            SanitizerError::Trap(trap.context("guest trapped after a refused table growth"))
        }
        err => err,
    }
}
