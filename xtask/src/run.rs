use std::process::Command;

use clap::Parser;

use crate::build_ebpf::{build_ebpf, Architecture, Options as BuildOptions};

#[derive(Debug, Parser)]
pub struct Options {
    /// Set the endianness of the BPF target
    #[clap(default_value = "bpfel-unknown-none", long)]
    pub bpf_target: Architecture,
    /// Build and run the release target
    #[clap(long)]
    pub release: bool,
    /// The command used to wrap your application
    #[clap(short, long, default_value = "sudo -E")]
    pub runner: String,
    /// Arguments to pass to your application
    #[clap(name = "args", last = true)]
    pub run_args: Vec<String>,
}

fn build(opts: &Options) -> Result<(), anyhow::Error> {
    let mut args = vec!["build", "--package", "hdas"];
    if opts.release {
        args.push("--release")
    }
    let status = Command::new("cargo").args(&args).status()?;
    anyhow::ensure!(status.success(), "failed to build userspace: {}", status);
    Ok(())
}

pub fn run(opts: Options) -> Result<(), anyhow::Error> {
    build_ebpf(BuildOptions {
        target: opts.bpf_target,
        release: opts.release,
    })?;
    build(&opts)?;

    let profile = if opts.release { "release" } else { "debug" };
    let bin_path = format!("target/{profile}/hdas");

    let mut run_args: Vec<_> = opts.run_args.iter().map(String::as_str).collect();
    let mut args: Vec<_> = opts.runner.trim().split_terminator(' ').collect();
    args.push(bin_path.as_str());
    args.append(&mut run_args);

    let (program, rest) = args
        .split_first()
        .ok_or_else(|| anyhow::anyhow!("empty runner"))?;
    let status = Command::new(program).args(rest).status()?;
    anyhow::ensure!(status.success(), "hdas exited with {}", status);
    Ok(())
}
