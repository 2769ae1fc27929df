//! Results of the triage and report generation.

use std::{fs, path::Path, time::Duration};

use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;

mod handlebars_helpers;
mod report;
mod utils;

pub use self::utils::{html_escape, FingerPrint};

use crate::{
    analysis::sensitive_api::{RiskFinding, RiskStats, SuspiciousEntry},
    get_package_name,
    mobsf::Report as ScanReport,
    print_warning, Config,
};
use self::report::{Generator, HandlebarsReport, Json};

/// Duration of a phase of the pipeline.
#[derive(Debug)]
pub struct Benchmark {
    label: String,
    duration: Duration,
}

impl Benchmark {
    /// Creates a new benchmark.
    pub fn new<S: Into<String>>(label: S, duration: Duration) -> Self {
        Self {
            label: label.into(),
            duration,
        }
    }
}

impl std::fmt::Display for Benchmark {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}: {:.3} s", self.label, self.duration.as_secs_f64())
    }
}

/// Everything gathered during the triage of one package.
#[derive(Debug, Serialize)]
pub struct Results {
    package_name: String,
    app_file: String,
    app_name: String,
    app_package: String,
    app_version: String,
    app_size: String,
    scan_hash: String,
    fingerprint: FingerPrint,
    date: String,
    permissions: Vec<String>,
    permission_summary: Option<String>,
    suspicious_entries: Vec<SuspiciousEntry>,
    risk_findings: Vec<RiskFinding>,
    risk_stats: RiskStats,
    api_summary: Option<String>,
}

impl Results {
    /// Initializes the results for the given package.
    ///
    /// Returns `None` when the results folder for the package already exists
    /// and `--force` was not given, or when the package cannot be
    /// fingerprinted.
    pub fn init<P: AsRef<Path>>(config: &Config, package: P) -> Option<Self> {
        let package_name = get_package_name(package.as_ref());
        let path = config.get_results_folder().join(&package_name);
        if path.exists() && !config.is_force() {
            if config.is_verbose() {
                println!(
                    "The results for this application have already been generated. No need to \
                     generate them again."
                );
            } else {
                println!("Skipping result generation.");
            }
            return None;
        }

        if path.exists() {
            if let Err(e) = fs::remove_dir_all(&path) {
                print_warning(format!(
                    "an unknown error occurred when trying to delete the results folder: {}",
                    e
                ));
                return None;
            }
        }

        let fingerprint = match FingerPrint::new(package.as_ref()) {
            Ok(f) => f,
            Err(e) => {
                print_warning(format!(
                    "an error occurred when trying to fingerprint the application: {}",
                    e
                ));
                return None;
            }
        };

        if config.is_verbose() {
            println!(
                "The results struct has been created. Everything the services report will now \
                 be recorded and, when the triage ends, written to result files."
            );
        } else if !config.is_quiet() {
            println!("Results struct created.");
        }

        Some(Self {
            package_name,
            app_file: package
                .as_ref()
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            app_name: String::new(),
            app_package: String::new(),
            app_version: String::new(),
            app_size: String::new(),
            scan_hash: String::new(),
            fingerprint,
            date: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            permissions: Vec::new(),
            permission_summary: None,
            suspicious_entries: Vec::new(),
            risk_findings: Vec::new(),
            risk_stats: RiskStats::default(),
            api_summary: None,
        })
    }

    /// Gets the name the results are stored under.
    pub fn get_package_name(&self) -> &str {
        &self.package_name
    }

    /// Gets the fingerprint of the package.
    pub fn get_fingerprint(&self) -> &FingerPrint {
        &self.fingerprint
    }

    /// Copies the application metadata out of the scan report.
    pub fn set_app_metadata(&mut self, report: &ScanReport) {
        self.app_name = report.get_app_name().to_owned();
        self.app_package = report.get_package_name().to_owned();
        self.app_version = report.get_version_name().to_owned();
        self.app_size = report.get_size().to_owned();
        self.scan_hash = report.get_md5().to_owned();
    }

    /// Sets the permissions requested by the application.
    pub fn set_permissions(&mut self, permissions: Vec<String>) {
        self.permissions = permissions;
    }

    /// Sets the executive summary of the permission analysis.
    pub fn set_permission_summary<S: Into<String>>(&mut self, summary: S) {
        self.permission_summary = Some(summary.into());
    }

    /// Sets the suspicious entries matched against the dataset.
    pub fn set_suspicious_entries(&mut self, entries: Vec<SuspiciousEntry>) {
        self.suspicious_entries = entries;
    }

    /// Sets the outcome of the sensitive API risk assessment.
    pub fn set_api_risk(
        &mut self,
        findings: Vec<RiskFinding>,
        stats: RiskStats,
        summary: Option<String>,
    ) {
        self.risk_findings = findings;
        self.risk_stats = stats;
        self.api_summary = summary;
    }

    /// Generates the enabled reports for these results.
    pub fn generate_report(&self, config: &Config) -> Result<()> {
        let path = config.get_results_folder().join(&self.package_name);
        fs::create_dir_all(&path)
            .with_context(|| format!("could not create the results folder at {}", path.display()))?;

        if config.has_to_generate_json() {
            Json::new().generate(config, self)?;
            if !config.is_quiet() {
                println!("JSON report generated.");
            }
        }

        if config.has_to_generate_html() {
            let mut report =
                HandlebarsReport::from_path(config.get_template_path(), self.package_name.clone())?;
            report.generate(config, self)?;
            if !config.is_quiet() {
                println!("HTML report generated.");
            }
        }

        Ok(())
    }
}
