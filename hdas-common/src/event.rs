use crate::{Comm, Path, PATH_CAP, TASK_COMM_LEN};

/// One reported open request, as written into the perf ring.
///
/// Layout on the wire: `pid` as little-endian `u32` at offset 0, `comm` at
/// offset 4, `path` at offset 20. No padding.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(C)]
pub struct OpenEvent {
    pub pid: u32,
    pub comm: Comm,
    pub path: Path,
}

#[cfg(feature = "user")]
unsafe impl aya::Pod for OpenEvent {}

impl OpenEvent {
    pub const SIZE: usize = core::mem::size_of::<Self>();
    const COMM_OFFSET: usize = 4;
    const PATH_OFFSET: usize = Self::COMM_OFFSET + TASK_COMM_LEN;

    pub const EMPTY: Self = Self {
        pid: 0,
        comm: [0; TASK_COMM_LEN],
        path: [0; PATH_CAP],
    };

    /// Builds a record from borrowed caller data the way the eBPF program does.
    /// `comm` is truncated to its width. `path` is copied up to the first NUL,
    /// at most `PATH_CAP - 1` bytes, and is always NUL-terminated like a kernel
    /// user-string read. Nothing is borrowed past the copy.
    pub fn capture(pid: u32, comm: &[u8], path: &[u8]) -> Self {
        let mut event = Self::EMPTY;
        event.pid = pid;
        let n = comm.len().min(TASK_COMM_LEN);
        event.comm[..n].copy_from_slice(&comm[..n]);
        let path = crate::trim_nul(path);
        let n = path.len().min(PATH_CAP - 1);
        event.path[..n].copy_from_slice(&path[..n]);
        event
    }

    /// Decodes a record from the collector side of the ring. Trailing bytes
    /// beyond `SIZE` are ignored; short buffers yield `None`.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE {
            return None;
        }
        let mut event = Self::EMPTY;
        let mut pid = [0u8; 4];
        pid.copy_from_slice(&bytes[..Self::COMM_OFFSET]);
        event.pid = u32::from_le_bytes(pid);
        event
            .comm
            .copy_from_slice(&bytes[Self::COMM_OFFSET..Self::PATH_OFFSET]);
        event
            .path
            .copy_from_slice(&bytes[Self::PATH_OFFSET..Self::PATH_OFFSET + PATH_CAP]);
        Some(event)
    }

    pub fn comm_bytes(&self) -> &[u8] {
        crate::trim_nul(&self.comm)
    }

    pub fn path_bytes(&self) -> &[u8] {
        crate::trim_nul(&self.path)
    }
}
