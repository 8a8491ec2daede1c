//! Marshaling buffers across the host/guest memory boundary.
//!
//! Guest memory is only touched through these bounds-checked primitives.
//! Any failure means the guest does not follow the expected ABI and is
//! reported as [`SanitizerError::Abi`].

use wasmtime::{AsContext, AsContextMut, Instance, Memory, TypedFunc};

use crate::error::{Result, SanitizerError};

/// Name of the guest's exported linear memory.
pub const MEMORY_EXPORT: &str = "memory";

/// Name of the guest's exported allocator.
pub const MALLOC_EXPORT: &str = "gots_malloc";

/// The guest's linear memory together with its allocator.
#[derive(Clone)]
pub struct GuestMemory {
    memory: Memory,
    malloc: TypedFunc<u32, u32>,
}

impl GuestMemory {
    /// Resolve the memory and allocator exports of an instance.
    pub fn from_instance(mut store: impl AsContextMut, instance: &Instance) -> Result<Self> {
        let memory = instance
            .get_memory(&mut store, MEMORY_EXPORT)
            .ok_or_else(|| SanitizerError::Abi(format!("missing `{MEMORY_EXPORT}` export")))?;
        let malloc = instance
            .get_typed_func::<u32, u32>(&mut store, MALLOC_EXPORT)
            .map_err(|e| SanitizerError::Abi(format!("bad `{MALLOC_EXPORT}` export: {e}")))?;
        Ok(Self { memory, malloc })
    }

    /// The underlying wasmtime memory handle.
    pub fn memory(&self) -> Memory {
        self.memory
    }

    /// Allocate `len` bytes inside the guest.
    pub fn alloc(&self, mut store: impl AsContextMut, len: u32) -> Result<u32> {
        let ptr = self
            .malloc
            .call(&mut store, len)
            .map_err(SanitizerError::from_guest_call)?;
        if ptr == 0 {
            return Err(SanitizerError::Abi(format!(
                "allocation of {len} bytes returned null"
            )));
        }
        Ok(ptr)
    }

    /// Allocate a buffer inside the guest and copy `data` into it.
    pub fn alloc_bytes(&self, mut store: impl AsContextMut, data: &[u8]) -> Result<u32> {
        let len = guest_len(data.len())?;
        let ptr = self.alloc(&mut store, len)?;
        self.write_bytes(&mut store, ptr, data)?;
        Ok(ptr)
    }

    pub fn write_bytes(&self, store: impl AsContextMut, ptr: u32, data: &[u8]) -> Result<()> {
        write_bytes(self.memory, store, ptr, data)
    }

    pub fn read_bytes(&self, store: impl AsContext, ptr: u32, len: u32) -> Result<Vec<u8>> {
        read_bytes(self.memory, store, ptr, len)
    }

    pub fn write_u32_le(&self, store: impl AsContextMut, ptr: u32, value: u32) -> Result<()> {
        write_bytes(self.memory, store, ptr, &value.to_le_bytes())
    }

    pub fn read_u32_le(&self, store: impl AsContext, ptr: u32) -> Result<u32> {
        let mut buf = [0u8; 4];
        read_into(self.memory, store, ptr, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }
}

/// Length of a host buffer as seen by the 32-bit guest.
pub fn guest_len(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| SanitizerError::InputTooLarge(len))
}

/// Copy `len` bytes out of guest memory.
pub fn read_bytes(memory: Memory, store: impl AsContext, ptr: u32, len: u32) -> Result<Vec<u8>> {
    let data = memory.data(store.as_context());
    let start = ptr as usize;
    start
        .checked_add(len as usize)
        .and_then(|end| data.get(start..end))
        .map(<[u8]>::to_vec)
        .ok_or_else(|| {
            SanitizerError::Abi(format!(
                "read of {len} bytes at {ptr:#x} is out of bounds (memory is {} bytes)",
                data.len()
            ))
        })
}

fn read_into(memory: Memory, store: impl AsContext, ptr: u32, buf: &mut [u8]) -> Result<()> {
    memory.read(&store, ptr as usize, buf).map_err(|_| {
        SanitizerError::Abi(format!(
            "read of {} bytes at {ptr:#x} is out of bounds (memory is {} bytes)",
            buf.len(),
            memory.data_size(&store)
        ))
    })
}

fn write_bytes(memory: Memory, mut store: impl AsContextMut, ptr: u32, data: &[u8]) -> Result<()> {
    memory.write(&mut store, ptr as usize, data).map_err(|_| {
        SanitizerError::Abi(format!(
            "write of {} bytes at {ptr:#x} is out of bounds (memory is {} bytes)",
            data.len(),
            memory.data_size(&store)
        ))
    })
}
