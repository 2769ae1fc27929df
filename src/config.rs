//! Configuration module.
//!
//! Loads `config.toml`, decorates it with the command line options and the
//! environment, and hands out the settings to the rest of the crate.

use std::{
    env, fs,
    path::{Path, PathBuf},
    slice::Iter as VecIter,
    time::Duration,
};

use anyhow::{Context, Result};
use clap::ArgMatches;
use serde::Deserialize;

use crate::file_exists;

/// Configuration for the whole triage run.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Path to the APK file to analyze.
    #[serde(skip)]
    apk_file: PathBuf,
    /// Whether the program is running in verbose mode.
    #[serde(skip)]
    verbose: bool,
    /// Whether the program is running in quiet mode.
    #[serde(skip)]
    quiet: bool,
    /// Whether previous results should be overwritten.
    #[serde(skip)]
    force: bool,
    /// Whether the pipeline phases should be timed.
    #[serde(skip)]
    bench: bool,
    /// Whether the report should be opened in the browser afterwards.
    #[serde(skip)]
    open: bool,
    /// Whether the HTML report should be generated.
    html_report: bool,
    /// Whether the JSON report should be generated.
    json_report: bool,
    /// Folder where the per-package reports are written.
    results_folder: PathBuf,
    /// Folder where the intermediate artifacts are written.
    output_folder: PathBuf,
    /// Base URL of the MobSF instance.
    mobsf_url: String,
    /// API key for the MobSF REST API.
    mobsf_api_key: String,
    /// Base URL of the Groq API.
    groq_url: String,
    /// API key for the Groq API.
    groq_api_key: String,
    /// Model requested from the chat-completions endpoint.
    groq_model: String,
    /// Number of permissions sent to the model per request.
    permission_chunk_size: usize,
    /// Number of suspicious-entry lines sent to the model per request.
    api_chunk_size: usize,
    /// Attempts per language model request.
    llm_retries: usize,
    /// Attempts when fetching the scan report.
    report_retries: usize,
    /// Delay, in seconds, between report fetch attempts.
    report_retry_delay: u64,
    /// Timeout, in seconds, for every HTTP request.
    request_timeout: u64,
    /// Folder containing the report templates.
    templates_folder: PathBuf,
    /// Name of the template used for the HTML report.
    template: String,
    /// Path to the SuSi sources dataset file.
    susi_sources_file: PathBuf,
    /// Path to the SuSi sinks dataset file.
    susi_sinks_file: PathBuf,
    /// Configuration files that have been loaded.
    #[serde(skip)]
    loaded_files: Vec<PathBuf>,
}

impl Config {
    /// Creates a new configuration from the given file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let toml = fs::read_to_string(path.as_ref()).with_context(|| {
            format!(
                "could not read the configuration file at {}",
                path.as_ref().display()
            )
        })?;
        let mut config: Self = toml::from_str(&toml).with_context(|| {
            format!(
                "could not parse the configuration file at {}",
                path.as_ref().display()
            )
        })?;
        config.loaded_files.push(path.as_ref().to_path_buf());

        Ok(config)
    }

    /// Decorates the configuration with the command line options.
    pub fn decorate_with_cli(&mut self, cli: &ArgMatches<'static>) {
        self.verbose = cli.is_present("verbose");
        self.quiet = cli.is_present("quiet");
        self.force = cli.is_present("force");
        self.bench = cli.is_present("bench");
        self.open = cli.is_present("open");
        if let Some(package) = cli.value_of("package") {
            self.apk_file = PathBuf::from(package);
        }
        if let Some(results) = cli.value_of("results") {
            self.results_folder = PathBuf::from(results);
        }
        if let Some(url) = cli.value_of("mobsf-url") {
            self.mobsf_url = url.to_owned();
        }
        // Selecting one report format on the command line deselects the rest.
        if cli.is_present("json") || cli.is_present("html") {
            self.json_report = cli.is_present("json");
            self.html_report = cli.is_present("html");
        }
    }

    /// Decorates the configuration with the environment.
    ///
    /// The environment wins over the configuration file, so that API keys do
    /// not have to be stored on disk.
    pub fn decorate_with_env(&mut self) {
        if let Ok(url) = env::var("MOBSF_URL") {
            self.mobsf_url = url;
        }
        if let Ok(key) = env::var("MOBSF_API_KEY") {
            self.mobsf_api_key = key;
        }
        if let Ok(key) = env::var("GROQ_API_KEY") {
            self.groq_api_key = key;
        }
    }

    /// Checks if the configuration is valid to start the analysis.
    pub fn check(&self) -> bool {
        self.get_errors().is_empty()
    }

    /// Gets the errors of an invalid configuration.
    pub fn get_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if !file_exists(&self.apk_file) {
            errors.push(format!(
                "the APK file `{}` does not exist",
                self.apk_file.display()
            ));
        } else if self.apk_file.extension().map_or(true, |e| e != "apk") {
            errors.push(format!(
                "the package file `{}` is not an APK file",
                self.apk_file.display()
            ));
        }
        if !file_exists(&self.susi_sources_file) {
            errors.push(format!(
                "the SuSi sources file `{}` does not exist",
                self.susi_sources_file.display()
            ));
        }
        if !file_exists(&self.susi_sinks_file) {
            errors.push(format!(
                "the SuSi sinks file `{}` does not exist",
                self.susi_sinks_file.display()
            ));
        }
        if self.html_report && !file_exists(self.get_template_path()) {
            errors.push(format!(
                "the template `{}` does not exist in the templates folder `{}`",
                self.template,
                self.templates_folder.display()
            ));
        }
        if !self.json_report && !self.html_report {
            errors.push(String::from("no report format is enabled"));
        }
        if self.mobsf_api_key.is_empty() {
            errors.push(String::from(
                "no MobSF API key was given, set it in config.toml or in the MOBSF_API_KEY \
                 environment variable",
            ));
        }
        if self.groq_api_key.is_empty() {
            errors.push(String::from(
                "no Groq API key was given, set it in config.toml or in the GROQ_API_KEY \
                 environment variable",
            ));
        }
        errors
    }

    /// Gets the configuration files that have been loaded.
    pub fn get_loaded_config_files(&self) -> VecIter<PathBuf> {
        self.loaded_files.iter()
    }

    /// Gets the path to the APK file.
    pub fn get_apk_file(&self) -> &Path {
        &self.apk_file
    }

    /// Returns true if the program is running in verbose mode.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Returns true if the program is running in quiet mode.
    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    /// Returns true if previous results should be overwritten.
    pub fn is_force(&self) -> bool {
        self.force
    }

    /// Returns true if the pipeline phases should be timed.
    pub fn is_bench(&self) -> bool {
        self.bench
    }

    /// Returns true if the report should be opened once generated.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Returns true if the HTML report has to be generated.
    pub fn has_to_generate_html(&self) -> bool {
        self.html_report
    }

    /// Returns true if the JSON report has to be generated.
    pub fn has_to_generate_json(&self) -> bool {
        self.json_report
    }

    /// Gets the folder where the per-package reports are written.
    pub fn get_results_folder(&self) -> &Path {
        &self.results_folder
    }

    /// Gets the folder where the intermediate artifacts are written.
    pub fn get_output_folder(&self) -> &Path {
        &self.output_folder
    }

    /// Gets the base URL of the MobSF instance, without a trailing slash.
    pub fn get_mobsf_url(&self) -> &str {
        self.mobsf_url.trim_end_matches('/')
    }

    /// Gets the API key for the MobSF REST API.
    pub fn get_mobsf_api_key(&self) -> &str {
        &self.mobsf_api_key
    }

    /// Gets the base URL of the Groq API, without a trailing slash.
    pub fn get_groq_url(&self) -> &str {
        self.groq_url.trim_end_matches('/')
    }

    /// Gets the API key for the Groq API.
    pub fn get_groq_api_key(&self) -> &str {
        &self.groq_api_key
    }

    /// Gets the model requested from the chat-completions endpoint.
    pub fn get_groq_model(&self) -> &str {
        &self.groq_model
    }

    /// Gets the number of permissions sent to the model per request.
    pub fn get_permission_chunk_size(&self) -> usize {
        self.permission_chunk_size
    }

    /// Gets the number of suspicious-entry lines sent to the model per request.
    pub fn get_api_chunk_size(&self) -> usize {
        self.api_chunk_size
    }

    /// Gets the number of attempts per language model request.
    pub fn get_llm_retries(&self) -> usize {
        self.llm_retries
    }

    /// Gets the number of attempts when fetching the scan report.
    pub fn get_report_retries(&self) -> usize {
        self.report_retries
    }

    /// Gets the delay between report fetch attempts.
    pub fn get_report_retry_delay(&self) -> Duration {
        Duration::from_secs(self.report_retry_delay)
    }

    /// Gets the timeout for every HTTP request.
    pub fn get_request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    /// Gets the path to the folder with the selected report template.
    pub fn get_template_path(&self) -> PathBuf {
        self.templates_folder.join(&self.template)
    }

    /// Gets the path to the SuSi sources dataset file.
    pub fn get_susi_sources_file(&self) -> &Path {
        &self.susi_sources_file
    }

    /// Gets the path to the SuSi sinks dataset file.
    pub fn get_susi_sinks_file(&self) -> &Path {
        &self.susi_sinks_file
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            apk_file: PathBuf::new(),
            verbose: false,
            quiet: false,
            force: false,
            bench: false,
            open: false,
            html_report: true,
            json_report: true,
            results_folder: PathBuf::from("results"),
            output_folder: PathBuf::from("output"),
            mobsf_url: String::from("http://localhost:8000"),
            mobsf_api_key: String::new(),
            groq_url: String::from("https://api.groq.com"),
            groq_api_key: String::new(),
            groq_model: String::from("llama3-70b-8192"),
            permission_chunk_size: 100,
            api_chunk_size: 150,
            llm_retries: 3,
            report_retries: 10,
            report_retry_delay: 20,
            request_timeout: 300,
            templates_folder: PathBuf::from("templates"),
            template: String::from("apkscope"),
            // The dataset ships with this spelling.
            susi_sources_file: PathBuf::from("susi/Ouput_CatSources_v0_9.txt"),
            susi_sinks_file: PathBuf::from("susi/Ouput_CatSinks_v0_9.txt"),
            loaded_files: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Config;
    use crate::cli::generate_cli;
    use std::{io::Write, path::Path, time::Duration};

    /// Test the default configuration values.
    #[test]
    fn it_default() {
        let config = Config::default();

        assert_eq!(config.get_mobsf_url(), "http://localhost:8000");
        assert_eq!(config.get_groq_url(), "https://api.groq.com");
        assert_eq!(config.get_groq_model(), "llama3-70b-8192");
        assert_eq!(config.get_permission_chunk_size(), 100);
        assert_eq!(config.get_api_chunk_size(), 150);
        assert_eq!(config.get_llm_retries(), 3);
        assert_eq!(config.get_report_retries(), 10);
        assert_eq!(config.get_report_retry_delay(), Duration::from_secs(20));
        assert_eq!(config.get_request_timeout(), Duration::from_secs(300));
        assert_eq!(
            config.get_template_path(),
            Path::new("templates").join("apkscope")
        );
        assert!(config.has_to_generate_html());
        assert!(config.has_to_generate_json());
        assert!(!config.is_verbose());
        assert!(!config.is_quiet());
        assert!(!config.is_force());
        assert!(!config.is_bench());
        assert!(!config.is_open());
    }

    /// Test loading a configuration file.
    #[test]
    fn it_from_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(
            br#"
            mobsf_url = "http://127.0.0.1:8080/"
            mobsf_api_key = "0123456789abcdef"
            groq_model = "llama3-8b-8192"
            permission_chunk_size = 25
            report_retry_delay = 5
            json_report = false
            "#,
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();

        assert_eq!(config.get_mobsf_url(), "http://127.0.0.1:8080");
        assert_eq!(config.get_mobsf_api_key(), "0123456789abcdef");
        assert_eq!(config.get_groq_model(), "llama3-8b-8192");
        assert_eq!(config.get_permission_chunk_size(), 25);
        assert_eq!(config.get_report_retry_delay(), Duration::from_secs(5));
        assert!(!config.has_to_generate_json());
        assert!(config.has_to_generate_html());
        assert_eq!(config.get_loaded_config_files().count(), 1);
        // Everything else keeps its default.
        assert_eq!(config.get_api_chunk_size(), 150);
    }

    /// Test an unparseable configuration file.
    #[test]
    fn it_from_file_invalid() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(b"mobsf_url = [not toml").unwrap();

        assert!(Config::from_file(file.path()).is_err());
    }

    /// Test the command line decoration.
    #[test]
    fn it_decorate_with_cli() {
        let cli = generate_cli().get_matches_from(vec![
            "apkscope",
            "downloads/test.apk",
            "-v",
            "--force",
            "--open",
            "--json",
            "--results",
            "other_results",
            "--mobsf-url",
            "http://10.0.0.2:8000",
        ]);

        let mut config = Config::default();
        config.decorate_with_cli(&cli);

        assert_eq!(config.get_apk_file(), Path::new("downloads/test.apk"));
        assert!(config.is_verbose());
        assert!(config.is_force());
        assert!(config.is_open());
        assert!(!config.is_quiet());
        assert_eq!(config.get_results_folder(), Path::new("other_results"));
        assert_eq!(config.get_mobsf_url(), "http://10.0.0.2:8000");
        // `--json` alone deselects the HTML report.
        assert!(config.has_to_generate_json());
        assert!(!config.has_to_generate_html());
    }

    /// Test the configuration error messages.
    #[test]
    fn it_get_errors() {
        let config = Config::default();
        let errors = config.get_errors();

        assert!(!config.check());
        assert!(errors.iter().any(|e| e.contains("APK file")));
        assert!(errors.iter().any(|e| e.contains("MobSF API key")));
        assert!(errors.iter().any(|e| e.contains("Groq API key")));
    }
}
