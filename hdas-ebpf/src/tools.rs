/// `-EFAULT`, returned for every failed read so callers drop the event.
pub const ERROR_FAULT: i64 = -14;

#[macro_export]
macro_rules! read_at {
    ($ctx: expr, $offset: expr) => {
        unsafe { $ctx.read_at($offset).map_err(|_| $crate::tools::ERROR_FAULT)? }
    };
}
#[macro_export]
macro_rules! read_user_str {
    ($src: expr, $dest: expr) => {{
        unsafe {
            aya_ebpf::helpers::bpf_probe_read_user_str_bytes($src, $dest)
                .map_err(|_| $crate::tools::ERROR_FAULT)?
        }
    }};
}
