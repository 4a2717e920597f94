use aya_ebpf::{programs::TracePointContext, EbpfContext};
use hdas_common::OpenEvent;

use crate::{read_at, read_user_str};

/// `args[1]` of `syscalls/sys_enter_openat`: 8-byte common header, then
/// `__syscall_nr` padded to 8, then `dfd`.
const FILENAME_OFFSET: usize = 24;

/// Fills `event` from the current task and the tracepoint arguments. The path
/// is copied into the record; the user pointer is not kept.
pub fn capture(ctx: &TracePointContext, event: &mut OpenEvent) -> Result<(), i64> {
    event.pid = ctx.tgid();
    event.comm = ctx.command().unwrap_or_default();
    let filename: *const u8 = read_at!(ctx, FILENAME_OFFSET);
    if filename.is_null() {
        return Err(crate::tools::ERROR_FAULT);
    }
    read_user_str!(filename, &mut event.path);
    Ok(())
}
