mod build_ebpf;
mod run;

use clap::Parser;

#[derive(Debug, Parser)]
pub struct Options {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Parser)]
enum Command {
    /// Build the eBPF object embedded by the loader
    BuildEbpf(build_ebpf::Options),
    /// Build everything and run the monitor
    Run(run::Options),
}

fn main() -> Result<(), anyhow::Error> {
    let opts = Options::parse();

    match opts.command {
        Command::BuildEbpf(opts) => build_ebpf::build_ebpf(opts),
        Command::Run(opts) => run::run(opts),
    }
}
