//! JSON report generation module.

use std::{fs::File, io::BufWriter};

use anyhow::{Context, Result};
use serde_json::ser;

use crate::{
    config::Config,
    results::{report::Generator, Results},
};

/// JSON report generator.
pub struct Json;

impl Json {
    /// Creates a new JSON report generator.
    pub fn new() -> Self {
        Self
    }
}

impl Default for Json {
    fn default() -> Self {
        Self::new()
    }
}

impl Generator for Json {
    fn generate(&mut self, config: &Config, results: &Results) -> Result<()> {
        if config.is_verbose() {
            println!("Starting JSON report generation. First we create the file.")
        }
        let path = config
            .get_results_folder()
            .join(results.get_package_name())
            .join("results.json");
        let mut f = BufWriter::new(
            File::create(&path)
                .with_context(|| format!("could not create the report file at {}", path.display()))?,
        );
        if config.is_verbose() {
            println!("The report file has been created. Now it's time to fill it.")
        }
        ser::to_writer_pretty(&mut f, results).context("could not serialize the results")?;

        Ok(())
    }
}
