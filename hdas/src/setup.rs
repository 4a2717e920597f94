use std::env;
use std::path::PathBuf;
use std::process;

use aya::maps::{Array, MapData};
use aya::programs::TracePoint;
use aya::Ebpf;
use clap::Parser;
use log::{debug, info, warn};
use users::os::unix::UserExt;

use hdas_common::{Rules, PROGRAM_NAME, RULES_MAP};

use crate::config::DEFAULT_CONFIG_PATH;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// configuration file, built-in defaults are used when it is missing
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,
    /// classify a path with the configured rules and exit
    #[arg(short, long, value_name = "PATH")]
    pub explain: Option<String>,
    /// print the active rule tables and exit
    #[arg(short = 'r', long, default_value_t = false)]
    pub print_rules: bool,
    /// print events, explanations and rules as JSON
    #[arg(short, long, default_value_t = false)]
    pub json: bool,
    /// home directory that dot-directories are tracked under
    #[arg(long, value_name = "DIR")]
    pub home: Option<PathBuf>,
}

/// The invoking user's home: `--home`, then the account behind `sudo`, then `$HOME`.
pub fn user_home(home: Option<PathBuf>) -> PathBuf {
    if let Some(home) = home {
        return home;
    }
    if let Ok(name) = env::var("SUDO_USER") {
        match users::get_user_by_name(&name) {
            Some(user) => return user.home_dir().to_path_buf(),
            None => debug!("SUDO_USER {} has no passwd entry", name),
        }
    }
    match env::var_os("HOME") {
        Some(home) if !home.is_empty() => PathBuf::from(home),
        _ => {
            warn!("could not determine home directory, using /tmp");
            PathBuf::from("/tmp")
        }
    }
}

pub fn check_permission() {
    if unsafe { libc::geteuid() } != 0 {
        eprintln!("currently only supports running as the root user.");
        process::exit(1);
    }
}

/// Older kernels account map memory against RLIMIT_MEMLOCK.
pub fn raise_memlock() {
    let rlim = libc::rlimit {
        rlim_cur: libc::RLIM_INFINITY,
        rlim_max: libc::RLIM_INFINITY,
    };
    let ret = unsafe { libc::setrlimit(libc::RLIMIT_MEMLOCK, &rlim) };
    if ret != 0 {
        debug!("remove limit on locked memory failed, ret is: {}", ret);
    }
}

/// Must run before `attach`: nothing is reported while the map is empty.
pub fn install_rules(bpf: &mut Ebpf, rules: &Rules) -> Result<(), anyhow::Error> {
    let map = bpf
        .map_mut(RULES_MAP)
        .ok_or_else(|| anyhow::anyhow!("map {} not found", RULES_MAP))?;
    let mut table: Array<&mut MapData, Rules> = Array::try_from(map)?;
    table.set(0, rules, 0)?;
    info!(
        "{} interesting rule(s), {} exclusion rule(s) installed",
        rules.interesting.len(),
        rules.excluded.len()
    );
    Ok(())
}

pub fn attach(bpf: &mut Ebpf) -> Result<(), anyhow::Error> {
    let program: &mut TracePoint = bpf
        .program_mut(PROGRAM_NAME)
        .ok_or_else(|| anyhow::anyhow!("program {} not found", PROGRAM_NAME))?
        .try_into()?;
    program.load()?;
    program.attach("syscalls", "sys_enter_openat")?;
    debug!("{} attached to syscalls/sys_enter_openat", PROGRAM_NAME);
    Ok(())
}
