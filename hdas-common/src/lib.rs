#![cfg_attr(not(test), no_std)]

mod classify;
mod event;
mod rule;

pub use event::OpenEvent;
pub use rule::{Anchor, Rule, RuleError, RuleTable, Rules};

/// Width of the kernel's `task_struct::comm`.
pub const TASK_COMM_LEN: usize = 16;
/// Capacity of the path copy taken from the open call.
pub const PATH_CAP: usize = 256;
/// Number of path positions the matchers will visit.
pub const SCAN_LIMIT: usize = 240;
/// Longest literal a single rule can hold.
pub const PATTERN_CAP: usize = 16;
/// Rules per table.
pub const MAX_RULES: usize = 8;

pub type Path = [u8; PATH_CAP];
pub type Comm = [u8; TASK_COMM_LEN];

pub const EVENTS_MAP: &str = "EVENTS";
pub const RULES_MAP: &str = "RULES";
pub const PROGRAM_NAME: &str = "trace_openat";

/// Bytes up to the first NUL, or the whole slice when none is present.
pub fn trim_nul(bytes: &[u8]) -> &[u8] {
    let len = bytes.iter().position(|&c| c == 0).unwrap_or(bytes.len());
    &bytes[..len]
}
