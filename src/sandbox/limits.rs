//! Per-instance resource caps and the store data of a sanitizer call.

use wasmtime::{Engine, ResourceLimiter, Store};
use wasmtime_wasi::preview1::WasiP1Ctx;
use wasmtime_wasi::WasiCtxBuilder;

/// Table elements an instance may grow to. The sanitizer only needs a
/// function table for its C++ vtables.
const MAX_TABLE_ELEMENTS: usize = 100_000;

/// Caps linear memory and table growth, remembering which cap was hit.
///
/// Growth past a cap is refused rather than failed, so the guest sees
/// `memory.grow` return -1 and may recover. The flags let the host tell a
/// trap caused by a refused growth apart from any other trap.
#[derive(Debug)]
pub struct SandboxLimiter {
    max_memory: u64,
    peak_memory: u64,
    memory_denied: bool,
    table_denied: bool,
}

impl SandboxLimiter {
    pub fn new(max_memory: u64) -> Self {
        Self {
            max_memory,
            peak_memory: 0,
            memory_denied: false,
            table_denied: false,
        }
    }

    /// Whether a memory growth was refused at some point.
    pub fn memory_denied(&self) -> bool {
        self.memory_denied
    }

    /// Whether a table growth was refused at some point.
    pub fn table_denied(&self) -> bool {
        self.table_denied
    }

    /// Largest memory size granted, in bytes.
    pub fn peak_memory(&self) -> u64 {
        self.peak_memory
    }
}

impl ResourceLimiter for SandboxLimiter {
    fn memory_growing(
        &mut self,
        current: usize,
        desired: usize,
        _maximum: Option<usize>,
    ) -> anyhow::Result<bool> {
        let desired = desired as u64;
        if desired > self.max_memory {
            tracing::debug!(current, desired, max = self.max_memory, "memory growth refused");
            self.memory_denied = true;
            return Ok(false);
        }
        self.peak_memory = self.peak_memory.max(desired);
        Ok(true)
    }

    fn table_growing(
        &mut self,
        current: usize,
        desired: usize,
        _maximum: Option<usize>,
    ) -> anyhow::Result<bool> {
        if desired > MAX_TABLE_ELEMENTS {
            tracing::debug!(current, desired, "table growth refused");
            self.table_denied = true;
            return Ok(false);
        }
        Ok(true)
    }
}

/// Data owned by the store of a single sanitizer call.
pub struct HostState {
    /// Session this instance serves. Callbacks under any other id are refused.
    pub session: u32,
    pub limiter: SandboxLimiter,
    /// WASI Preview 1 context for the guest's libc.
    pub wasi: WasiP1Ctx,
}

impl HostState {
    /// The WASI context grants nothing: no arguments, environment,
    /// preopened directories or inherited stdio.
    pub fn new(session: u32, max_memory: u64) -> Self {
        Self {
            session,
            limiter: SandboxLimiter::new(max_memory),
            wasi: WasiCtxBuilder::new().build_p1(),
        }
    }

    /// Create a store for one call with the limiter installed.
    pub fn into_store(self, engine: &Engine) -> Store<HostState> {
        let mut store = Store::new(engine, self);
        store.limiter(|data| &mut data.limiter);
        store
    }
}
