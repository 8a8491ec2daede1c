//! Host functions imported by the sanitizer guest.
//!
//! The guest calls back into the host while `gots_process` runs, passing the
//! session id it was given. Both imports resolve that id through the
//! process-wide [`SessionRegistry`](super::session::SessionRegistry) and
//! forward to the caller's handlers.
//!
//! ```wat
//! (import "env" "gots_get_table_action" (func (param i32 i32) (result i32)))
//! (import "env" "gots_message" (func (param i32 i32 i32 i32)))
//! ```

use std::sync::Arc;

use wasmtime::{Caller, Linker};

use crate::error::{Result, SanitizerError};
use crate::sandbox::limits::HostState;
use crate::sandbox::memory;
use crate::sandbox::session::{sessions, Session};
use crate::types::{MessageLevel, Tag};

/// Import module of both callbacks.
pub const IMPORT_MODULE: &str = "env";

/// Import name of the table-action callback.
pub const GET_TABLE_ACTION: &str = "gots_get_table_action";

/// Import name of the message callback.
pub const MESSAGE: &str = "gots_message";

/// Register both callbacks with the linker.
pub fn register(linker: &mut Linker<HostState>) -> Result<()> {
    linker
        .func_wrap(IMPORT_MODULE, GET_TABLE_ACTION, get_table_action)
        .map_err(|e| {
            SanitizerError::RuntimeInit(anyhow::anyhow!("failed to register {GET_TABLE_ACTION}: {e}"))
        })?;
    linker
        .func_wrap(IMPORT_MODULE, MESSAGE, message)
        .map_err(|e| {
            SanitizerError::RuntimeInit(anyhow::anyhow!("failed to register {MESSAGE}: {e}"))
        })?;
    Ok(())
}

/// Resolve the session a callback names.
///
/// An instance may only call back under the id of the call it serves. A
/// foreign id is refused even when that session is live, since its handlers
/// and memory belong to another store.
fn lookup(caller: &Caller<'_, HostState>, id: u32) -> anyhow::Result<Arc<Session>> {
    let own = caller.data().session;
    if id != own {
        tracing::error!(session = own, claimed = id, "callback under a foreign session id");
        return Err(SanitizerError::UnknownSession(id).into());
    }
    sessions().lookup(id).ok_or_else(|| {
        tracing::error!(session = id, "callback for unregistered session");
        SanitizerError::UnknownSession(id).into()
    })
}

fn get_table_action(caller: Caller<'_, HostState>, id: u32, tag: u32) -> anyhow::Result<u32> {
    let session = lookup(&caller, id)?;
    let tag = Tag::from_packed(tag);
    let action = session.table_action(tag);
    tracing::trace!(session = id, %tag, ?action, "table action");
    Ok(action.code())
}

fn message(
    caller: Caller<'_, HostState>,
    id: u32,
    level: u32,
    ptr: u32,
    len: u32,
) -> anyhow::Result<()> {
    let session = lookup(&caller, id)?;
    let guest_memory = session.memory().ok_or_else(|| {
        SanitizerError::Abi(format!("message for session {id} before its instance existed"))
    })?;
    let text = memory::read_bytes(guest_memory, &caller, ptr, len)?;
    let text = String::from_utf8_lossy(&text);
    let level = MessageLevel::from_raw(level);
    tracing::debug!(session = id, %level, message = %text, "sanitizer message");
    session.message(level, &text);
    Ok(())
}
