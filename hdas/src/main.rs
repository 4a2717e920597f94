use std::sync::Arc;

use aya::{include_bytes_aligned, Ebpf};
use aya_log::EbpfLogger;
use clap::Parser;
use log::{info, warn};
use tokio::io::unix::AsyncFd;
use tokio::signal;

use hdas::config::Config;
use hdas::event::{wait_events, Collector};
use hdas::report;
use hdas::setup::{attach, check_permission, install_rules, raise_memlock, user_home, Args};
use hdas::track::Tracker;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    env_logger::init();
    let args = Args::parse();
    let config = Config::load(&args.config)?;
    let rules = config.rules()?;
    let tracker = Tracker::new(&config, user_home(args.home.clone()))?;
    if args.print_rules {
        return report::print_rules(&rules, args.json);
    }
    if let Some(path) = &args.explain {
        return report::explain(&rules, &tracker, path, args.json);
    }

    check_permission();
    raise_memlock();

    #[cfg(debug_assertions)]
    let mut bpf = Ebpf::load(include_bytes_aligned!(
        "../../target/bpfel-unknown-none/debug/hdas"
    ))?;
    #[cfg(not(debug_assertions))]
    let mut bpf = Ebpf::load(include_bytes_aligned!(
        "../../target/bpfel-unknown-none/release/hdas"
    ))?;
    match EbpfLogger::init(&mut bpf) {
        // This can happen if you remove all log statements from your eBPF program.
        Err(e) => warn!("failed to initialize eBPF logger: {}", e),
        Ok(logger) => {
            let mut logger = AsyncFd::new(logger)?;
            tokio::task::spawn(async move {
                while let Ok(mut guard) = logger.readable_mut().await {
                    guard.get_inner_mut().flush();
                    guard.clear_ready();
                }
            });
        }
    }

    install_rules(&mut bpf, &rules)?;
    attach(&mut bpf)?;
    info!(
        "tracking under {} with depth {}",
        tracker.home().display(),
        config.tracking_depth
    );
    let collector = Arc::new(Collector::new(config.ignored_processes, tracker, args.json));
    wait_events(&mut bpf, collector.clone())?;
    info!("Waiting for Ctrl-C...");
    signal::ctrl_c().await?;
    info!("Exiting...");
    collector.stats().log_summary();
    Ok(())
}
