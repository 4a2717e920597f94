use std::collections::HashSet;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use aya::maps::AsyncPerfEventArray;
use aya::util::online_cpus;
use aya::Ebpf;
use bytes::BytesMut;
use log::{debug, error, info, warn};
use prettytable::{color, row, Attr, Cell, Row, Table};
use serde::Serialize;

use hdas_common::{OpenEvent, EVENTS_MAP};

use crate::track::Tracker;

/// Counters shared by every per-cpu reader. Loss is expected under load and
/// only ever shows up here.
#[derive(Debug, Default)]
pub struct CollectorStats {
    received: AtomicU64,
    lost: AtomicU64,
    ignored: AtomicU64,
}

impl CollectorStats {
    pub fn received(&self) -> u64 {
        self.received.load(Ordering::Relaxed)
    }

    pub fn lost(&self) -> u64 {
        self.lost.load(Ordering::Relaxed)
    }

    pub fn ignored(&self) -> u64 {
        self.ignored.load(Ordering::Relaxed)
    }

    fn add_lost(&self, lost: usize, cpu: u32) {
        if lost == 0 {
            return;
        }
        let total = self.lost.fetch_add(lost as u64, Ordering::Relaxed) + lost as u64;
        warn!("perf buffer overflow on cpu {}: {} event(s) lost, {} in total", cpu, lost, total);
    }

    pub fn log_summary(&self) {
        info!(
            "{} event(s) received, {} ignored, {} lost",
            self.received(),
            self.ignored(),
            self.lost()
        );
    }
}

/// One shown record, as printed with `--json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Line {
    pub cpu: u32,
    pub pid: u32,
    pub command: String,
    pub path: String,
    pub tracked: Option<String>,
}

pub struct Collector {
    ignored_processes: HashSet<String>,
    tracker: Tracker,
    json: bool,
    stats: CollectorStats,
}

impl Collector {
    pub fn new(ignored_processes: impl IntoIterator<Item = String>, tracker: Tracker, json: bool) -> Self {
        Self {
            ignored_processes: ignored_processes.into_iter().collect(),
            tracker,
            json,
            stats: CollectorStats::default(),
        }
    }

    pub fn stats(&self) -> &CollectorStats {
        &self.stats
    }

    /// Counts the record and reports whether it should be shown.
    pub fn accept(&self, event: &OpenEvent) -> bool {
        self.stats.received.fetch_add(1, Ordering::Relaxed);
        let comm = lossy(event.comm_bytes());
        if self.ignored_processes.contains(&comm) {
            self.stats.ignored.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        true
    }

    pub fn line(&self, event: &OpenEvent, cpu: u32) -> Line {
        let path = lossy(event.path_bytes());
        Line {
            cpu,
            pid: event.pid,
            command: lossy(event.comm_bytes()),
            tracked: self.tracker.track(&path).map(|tracked| tracked.path),
            path,
        }
    }

    fn show(&self, event: &OpenEvent, cpu: u32) {
        let line = self.line(event, cpu);
        match self.json {
            true => match serde_json::to_string(&line) {
                Ok(json) => println!("{}", json),
                Err(err) => error!("failed to encode event: {}", err),
            },
            false => print_event(&line),
        }
    }
}

pub fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

pub fn wait_events(bpf: &mut Ebpf, collector: Arc<Collector>) -> Result<(), anyhow::Error> {
    let cpus = online_cpus().map_err(|err| anyhow::anyhow!("{:?}", err))?;
    let map = bpf
        .take_map(EVENTS_MAP)
        .ok_or_else(|| anyhow::anyhow!("map {} not found", EVENTS_MAP))?;
    let mut events = AsyncPerfEventArray::try_from(map)?;
    for cpu in cpus {
        let mut buf = events.open(cpu, None)?;
        let collector = collector.clone();
        tokio::task::spawn(async move {
            let mut buffers = vec![BytesMut::with_capacity(OpenEvent::SIZE); 10];
            loop {
                match buf.read_events(&mut buffers).await {
                    Ok(events) => {
                        debug!(
                            "fetch {} entries, lost {} entries on cpu {}",
                            events.read, events.lost, cpu
                        );
                        collector.stats().add_lost(events.lost, cpu);
                        for raw in &buffers[..events.read] {
                            match OpenEvent::from_bytes(raw) {
                                Some(event) if collector.accept(&event) => collector.show(&event, cpu),
                                Some(_) => {}
                                None => warn!("short record ({} bytes) on cpu {}", raw.len(), cpu),
                            }
                        }
                    }
                    Err(err) => error!("failed to fetch events: {}", err),
                }
            }
        });
    }
    Ok(())
}

fn print_event(line: &Line) {
    let mut table = Table::new();
    table.set_titles(row!["cpu", "pid", "command", "path", "tracked"]);
    table.add_row(Row::new(vec![
        Cell::new(&line.cpu.to_string()).with_style(Attr::ForegroundColor(color::BLUE)),
        Cell::new(&line.pid.to_string()).with_style(Attr::ForegroundColor(color::BRIGHT_YELLOW)),
        Cell::new(&line.command).with_style(Attr::ForegroundColor(color::GREEN)),
        Cell::new(&line.path).with_style(Attr::ForegroundColor(color::BRIGHT_WHITE)),
        Cell::new(line.tracked.as_deref().unwrap_or("-")),
    ]));
    {
        //prevent overprinting when using multithreading
        let _stdout = io::stdout().lock();
        if let Err(err) = table.print_tty(true) {
            error!("failed to print event: {}", err);
        }
    }
}
