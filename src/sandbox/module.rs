//! Compiling and linking the sanitizer module.
//!
//! Compilation and linking happen once per [`Sanitizer`]; every call then
//! only instantiates the pre-linked module. The process-wide sanitizer built
//! from the embedded module lives behind [`compile`].

use std::sync::OnceLock;

use wasmtime::{Engine, InstancePre, Linker, Module};

use crate::error::{Result, SanitizerError};
use crate::sandbox::callbacks;
use crate::sandbox::config::SanitizerConfig;
use crate::sandbox::executor::Sanitizer;
use crate::sandbox::limits::HostState;

/// The sanitizer module embedded at build time.
pub static EMBEDDED_MODULE: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/ots.wasm"));

/// A compiled sanitizer module with the host callbacks already linked.
#[derive(Clone)]
pub struct CompiledModule {
    engine: Engine,
    pre: InstancePre<HostState>,
}

impl std::fmt::Debug for CompiledModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledModule")
            .field("engine", &"<wasmtime::Engine>")
            .finish()
    }
}

impl CompiledModule {
    /// Compile a module from wasm bytes (or WAT text) and link it.
    pub fn new(wasm: &[u8]) -> Result<Self> {
        let engine = Engine::new(&wasmtime::Config::new())
            .map_err(|e| SanitizerError::RuntimeInit(anyhow::anyhow!("failed to create engine: {}", e)))?;

        if wasm.is_empty() {
            return Err(SanitizerError::ModuleLoad(anyhow::anyhow!(
                "no sanitizer module was embedded in this build"
            )));
        }

        let module = Module::new(&engine, wasm)
            .map_err(|e| SanitizerError::ModuleLoad(anyhow::anyhow!("failed to compile module: {}", e)))?;

        let mut linker = Linker::new(&engine);
        wasmtime_wasi::preview1::add_to_linker_sync(&mut linker, |data: &mut HostState| &mut data.wasi)
            .map_err(|e| SanitizerError::RuntimeInit(anyhow::anyhow!("failed to link WASI: {}", e)))?;
        callbacks::register(&mut linker)?;

        let pre = linker
            .instantiate_pre(&module)
            .map_err(|e| SanitizerError::ModuleLoad(anyhow::anyhow!("failed to link module: {}", e)))?;

        tracing::info!(bytes = wasm.len(), "compiled sanitizer module");
        Ok(Self { engine, pre })
    }

    /// Load and compile the module at the configured path, or the embedded
    /// module if none is set.
    pub fn from_config(config: &SanitizerConfig) -> Result<Self> {
        let Some(path) = &config.module_path else {
            return Self::new(EMBEDDED_MODULE);
        };
        let wasm = std::fs::read(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                SanitizerError::ModuleNotFound(path.display().to_string())
            } else {
                SanitizerError::Io(e)
            }
        })?;
        Self::new(&wasm)
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub(crate) fn instance_pre(&self) -> &InstancePre<HostState> {
        &self.pre
    }
}

static GLOBAL: OnceLock<std::result::Result<Sanitizer, String>> = OnceLock::new();

/// Get the process-wide sanitizer, compiling the embedded module on first use.
///
/// Concurrent first callers block until compilation finishes. A failure is
/// captured and every later call reports the same error without retrying,
/// since it means the build itself is unusable.
pub fn compile() -> Result<&'static Sanitizer> {
    GLOBAL
        .get_or_init(|| {
            Sanitizer::new(SanitizerConfig::default()).map_err(|e| {
                tracing::error!(error = %e, "failed to compile embedded sanitizer module");
                e.to_string()
            })
        })
        .as_ref()
        .map_err(|msg| SanitizerError::ModuleLoad(anyhow::anyhow!("{}", msg)))
}
