#![no_std]
#![no_main]
use aya_ebpf::macros::{map, tracepoint};
use aya_ebpf::maps::{Array, PerfEventArray};
use aya_ebpf::programs::TracePointContext;
use aya_log_ebpf::debug;

use hdas_common::{OpenEvent, Rules};

mod capture;
mod tools;

#[map]
static EVENTS: PerfEventArray<OpenEvent> = PerfEventArray::new(0);
#[map]
static RULES: Array<Rules> = Array::with_max_entries(1, 0);

#[tracepoint]
pub fn trace_openat(ctx: TracePointContext) -> u32 {
    try_trace_openat(&ctx).unwrap_or(0)
}

fn try_trace_openat(ctx: &TracePointContext) -> Result<u32, i64> {
    // nothing is reported until the collector has written the rule set
    let Some(rules) = RULES.get(0) else {
        return Ok(0);
    };
    let mut event = OpenEvent::EMPTY;
    capture::capture(ctx, &mut event)?;
    if !rules.is_interesting(&event.path) {
        return Ok(0);
    }
    if rules.is_excluded(&event.path) {
        debug!(ctx, "excluded open from pid {}", event.pid);
        return Ok(0);
    }
    EVENTS.output(ctx, &event, 0);
    Ok(0)
}

#[cfg(target_arch = "bpf")]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    unsafe { core::hint::unreachable_unchecked() }
}

#[unsafe(link_section = "license")]
#[unsafe(no_mangle)]
static LICENSE: [u8; 4] = *b"GPL\0";
