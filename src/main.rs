//! Command line entry point of the triage pipeline.

use std::process::exit;

use anyhow::{bail, Result};
use colored::Colorize;

use apkscope_core::{
    analyze_package, cli, initialize_config, initialize_logger, print_error, Benchmark, BANNER,
};

fn main() {
    if let Err(e) = run() {
        print_error(format!("{}", e));
        for cause in e.chain().skip(1) {
            eprintln!("\t{} {}", "Caused by:".bold(), cause);
        }
        exit(1);
    }
}

fn run() -> Result<()> {
    let cli = cli::generate_cli().get_matches();
    initialize_logger(cli.is_present("verbose"));

    let config = initialize_config(&cli)?;
    if !config.check() {
        for error in config.get_errors() {
            print_error(error);
        }
        bail!("there were errors in the configuration");
    }

    if !config.is_quiet() {
        println!("{}", BANNER.green().bold());
    }

    let package = config.get_apk_file().to_path_buf();
    let mut benchmarks: Vec<Benchmark> = Vec::new();
    analyze_package(&package, &config, &mut benchmarks)?;

    if config.is_bench() {
        println!();
        println!("{}", "Benchmarks:".bold());
        for benchmark in &benchmarks {
            println!("{}", benchmark);
        }
    }

    Ok(())
}
