//! APK triage orchestrator.
//!
//! Drives a locally running MobSF instance to statically analyze an Android
//! package, correlates the findings with the SuSi sensitive-API dataset and
//! delegates the risk narrative to a hosted language model, then renders
//! everything as a browsable report.

#![warn(missing_docs)]

#[macro_use]
extern crate clap;
#[macro_use]
extern crate lazy_static;
#[macro_use]
extern crate log;

pub mod analysis;
/// Command Line Interface
pub mod cli;
mod config;
pub mod llm;
pub mod mobsf;
mod results;
mod risk;
mod utils;

use std::{
    fs,
    path::{Path, PathBuf},
    time::Instant,
};

use anyhow::{bail, Context, Result};
use clap::ArgMatches;
use colored::Colorize;
use env_logger::Builder;
use log::{Level, LevelFilter};
use std::env;
use std::io::Write;

use crate::{llm::LlmClient, mobsf::MobSf};
pub use crate::{
    config::Config,
    results::{Benchmark, FingerPrint, Results},
    risk::RiskLevel,
    utils::{file_exists, get_package_name, print_error, print_warning},
};

/// Banner shown at startup.
pub static BANNER: &str = include_str!("banner.txt");

/// Initializes the config with the config files and command line options.
///
/// On UNIX, if the local file (`config.toml`) does not exist, but the global
/// one does (`/etc/apkscope/config.toml`), the latter is used. Otherwise, the
/// local file is used. Finally, if none of the files could be loaded, the
/// default config is used. The command line and the environment decorate
/// whatever was loaded.
pub fn initialize_config(cli: &ArgMatches<'static>) -> Result<Config> {
    let config_path = PathBuf::from("config.toml");
    let global_config_path = PathBuf::from("/etc/apkscope/config.toml");

    let mut config =
        if cfg!(target_family = "unix") && !config_path.exists() && global_config_path.exists() {
            Config::from_file(&global_config_path)
                .context("there was an error when reading the /etc/apkscope/config.toml file")?
        } else if config_path.exists() {
            Config::from_file(&config_path)
                .context("there was an error when reading the config.toml file")?
        } else {
            print_warning("Config file not found. Using default configuration");
            Config::default()
        };

    config.decorate_with_cli(cli);
    config.decorate_with_env();

    for file in config.get_loaded_config_files() {
        debug!("loaded configuration from {}", file.display());
    }

    Ok(config)
}

/// Analyzes the given package with the given config.
pub fn analyze_package<P: AsRef<Path>>(
    package: P,
    config: &Config,
    benchmarks: &mut Vec<Benchmark>,
) -> Result<()> {
    let package_name = get_package_name(&package);
    if !config.is_quiet() {
        println!();
        println!("Starting triage of {}.", package_name.italic());
    }
    let start_time = Instant::now();

    let mut results = match Results::init(config, &package) {
        Some(results) => results,
        None => return Ok(()),
    };

    fs::create_dir_all(config.get_output_folder()).with_context(|| {
        format!(
            "could not create the output folder at {}",
            config.get_output_folder().display()
        )
    })?;

    let mobsf = MobSf::from_config(config)?;

    // Upload to the static-analysis service.
    let upload_time = Instant::now();
    let upload = mobsf
        .upload(&package)
        .context("the package upload failed")?;
    if config.is_bench() {
        benchmarks.push(Benchmark::new("Upload", upload_time.elapsed()));
    }
    if config.is_verbose() {
        println!("The package has been uploaded with hash {}.", upload.hash);
    } else if !config.is_quiet() {
        println!("Package uploaded.");
    }

    // The service identifies uploads by their MD5. A mismatch means it did
    // not store what was sent, which is worth knowing but not fatal.
    if upload.hash != results.get_fingerprint().md5_hex() {
        print_warning(format!(
            "the hash reported by the service ({}) does not match the local MD5 ({})",
            upload.hash,
            results.get_fingerprint().md5_hex()
        ));
    }

    // Start the scan.
    let scan_time = Instant::now();
    mobsf.scan(&upload).context("the scan could not be started")?;
    if config.is_bench() {
        benchmarks.push(Benchmark::new("Scan", scan_time.elapsed()));
    }
    if !config.is_quiet() {
        println!("Scan started.");
    }

    // Poll for the report and persist it.
    let report_time = Instant::now();
    let report = mobsf.report_json(&upload.hash)?;
    if config.is_bench() {
        benchmarks.push(Benchmark::new("Report retrieval", report_time.elapsed()));
    }
    let report_path = config.get_output_folder().join("mobsf_report.json");
    report.save(&report_path)?;
    if config.is_verbose() {
        println!("The scan report has been saved to {}.", report_path.display());
    } else if !config.is_quiet() {
        println!("Scan report retrieved.");
    }
    results.set_app_metadata(&report);

    // LLM analysis of the findings.
    let llm = LlmClient::from_config(config)?;
    let analysis_time = Instant::now();
    analysis::analysis(config, &llm, &report, &mut results);
    if config.is_bench() {
        benchmarks.push(Benchmark::new("LLM analysis", analysis_time.elapsed()));
    }

    if !config.is_quiet() {
        println!();
    }

    // Report generation.
    let report_gen_time = Instant::now();
    results.generate_report(config).with_context(|| {
        format!(
            "there was an error generating the results report. Tried to generate at: {}",
            config.get_results_folder().join(&package_name).display()
        )
    })?;
    if config.is_bench() {
        benchmarks.push(Benchmark::new("Report generation", report_gen_time.elapsed()));
    }

    if config.is_open() {
        let open_path = if config.has_to_generate_html() {
            config
                .get_results_folder()
                .join(&package_name)
                .join("index.html")
        } else {
            config
                .get_results_folder()
                .join(&package_name)
                .join("results.json")
        };

        let status = open::that(open_path).context("the report could not be opened automatically")?;

        if !status.success() {
            bail!("report opening errored with status code: {}", status);
        }
    }

    if config.is_bench() {
        benchmarks.push(Benchmark::new(
            format!("Total time for {}", package_name),
            start_time.elapsed(),
        ));
    }

    Ok(())
}

/// Copies the contents of `from` to `to`.
///
/// If the destination folder doesn't exist it is created. Note that the
/// parent folder must exist. If files in the destination folder exist with
/// the same name as in the origin folder, they will be overwritten.
pub fn copy_folder<P: AsRef<Path>>(from: P, to: P) -> Result<()> {
    if !to.as_ref().exists() {
        fs::create_dir(to.as_ref())?;
    }

    for f in fs::read_dir(from)? {
        let f = f?;
        if f.path().is_dir() {
            copy_folder(f.path(), to.as_ref().join(f.path().file_name().unwrap()))?;
        } else {
            let _ = fs::copy(f.path(), to.as_ref().join(f.path().file_name().unwrap()))?;
        }
    }
    Ok(())
}

/// Initializes the logger with the given verbosity.
pub fn initialize_logger(is_verbose: bool) {
    let log_level = if is_verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut builder = Builder::new();
    let _ = builder.format(|buf, record| match record.level() {
        Level::Warn => writeln!(
            buf,
            "{}{}",
            "Warning: ".bold().yellow(),
            record.args().to_string().yellow()
        ),
        Level::Error => writeln!(
            buf,
            "{}{}",
            "Error: ".bold().red(),
            record.args().to_string().red()
        ),
        Level::Debug => writeln!(buf, "{}{}", "Debug: ".bold(), record.args().to_string().bold()),
        Level::Info => writeln!(buf, "{}", record.args()),
        Level::Trace => writeln!(buf, "{}: {}", record.level(), record.args()),
    });

    let builder_state = if let Ok(env_log) = env::var("RUST_LOG") {
        builder.parse_filters(&env_log).try_init()
    } else {
        builder.filter(None, log_level).try_init()
    };

    if let Err(e) = builder_state {
        println!("Could not initialize logger: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use crate::RiskLevel;
    use std::str::FromStr;

    #[test]
    fn it_risk_level() {
        assert_eq!(RiskLevel::from_str("low").unwrap(), RiskLevel::Low);
        assert_eq!(RiskLevel::from_str("Low").unwrap(), RiskLevel::Low);
        assert_eq!(RiskLevel::from_str("LOW").unwrap(), RiskLevel::Low);

        assert_eq!(RiskLevel::from_str("medium").unwrap(), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_str("Medium").unwrap(), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_str("MEDIUM").unwrap(), RiskLevel::Medium);

        assert_eq!(RiskLevel::from_str("high").unwrap(), RiskLevel::High);
        assert_eq!(RiskLevel::from_str("High").unwrap(), RiskLevel::High);
        assert_eq!(RiskLevel::from_str("HIGH").unwrap(), RiskLevel::High);

        assert!(RiskLevel::from_str("critical").is_err());

        assert!(RiskLevel::Low < RiskLevel::Medium);
        assert!(RiskLevel::Low < RiskLevel::High);
        assert!(RiskLevel::Medium < RiskLevel::High);

        assert_eq!(format!("{}", RiskLevel::Low).as_str(), "low");
        assert_eq!(format!("{}", RiskLevel::Medium).as_str(), "medium");
        assert_eq!(format!("{}", RiskLevel::High).as_str(), "high");

        assert_eq!(format!("{:?}", RiskLevel::Low).as_str(), "Low");
        assert_eq!(format!("{:?}", RiskLevel::Medium).as_str(), "Medium");
        assert_eq!(format!("{:?}", RiskLevel::High).as_str(), "High");

        assert_eq!(
            serde_json::to_value(RiskLevel::High).unwrap(),
            serde_json::json!("high")
        );
        assert_eq!(
            serde_json::from_str::<RiskLevel>("\"medium\"").unwrap(),
            RiskLevel::Medium
        );
    }
}
