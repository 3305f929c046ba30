use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use xdbg_core::{probe_architecture, Arch};

/// Debugger support utilities
#[derive(Parser)]
#[command(
    name = "xdbg",
    about = "Probe PE architectures and check the allocation tracker",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Detect whether each file is a 32-bit or 64-bit PE image
    Arch {
        /// Files to probe
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Allocate, reallocate and release buffers, then report leaks
    AllocCheck {
        /// Number of buffers
        #[arg(long, default_value_t = 64)]
        count: usize,

        /// Size of each buffer in bytes
        #[arg(long, default_value = "4096")]
        size: NonZeroUsize,
    },
}

#[derive(Serialize, Tabled)]
struct ProbeRow {
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "Arch")]
    arch: Arch,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Arch { paths, json } => {
            log::debug!("probing {} path(s)", paths.len());
            let rows: Vec<ProbeRow> = paths
                .iter()
                .map(|path| ProbeRow {
                    path: path.display().to_string(),
                    arch: probe_architecture(path),
                })
                .collect();

            if json {
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                println!("{}", Table::new(&rows).with(Style::sharp()));
                print_summary(&rows);
            }
        }

        Command::AllocCheck { count, size } => {
            let size = size.get();
            let tracker = xdbg_core::global();

            let mut buffers = Vec::with_capacity(count);
            for _ in 0..count {
                let buffer = tracker.allocate(size, "cli:alloc-check");
                if buffer.iter().any(|&b| b != 0) {
                    bail!("buffer at {:p} was not zeroed", buffer.as_ptr());
                }
                buffers.push(buffer);
            }
            println!(
                "Allocated {} x {} bytes, live: {}",
                count,
                size,
                tracker.leak_count()
            );

            let new_size = size.saturating_mul(2);
            let buffers: Vec<_> = buffers
                .into_iter()
                .map(|b| tracker.reallocate(Some(b), new_size, "cli:alloc-check"))
                .collect();
            println!(
                "Reallocated to {} bytes, live: {}",
                new_size,
                tracker.leak_count()
            );

            for buffer in buffers {
                tracker.release(buffer, "cli:alloc-check");
            }

            let report = tracker.checkpoint();
            if report.is_clean() {
                println!("{}", report.to_string().green());
            } else {
                println!("{}", report.to_string().red());
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn print_summary(rows: &[ProbeRow]) {
    let count = |wanted: fn(Arch) -> bool| rows.iter().filter(|r| wanted(r.arch)).count();
    let executables = count(Arch::is_executable);
    let invalid = count(|a| a == Arch::Invalid);
    let missing = count(|a| a == Arch::NotFound);

    println!(
        "{} executable, {} invalid, {} not found",
        executables.to_string().green(),
        invalid.to_string().yellow(),
        missing.to_string().red()
    );
}
