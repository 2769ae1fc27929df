//! LLM-backed analysis of the scan findings.
//!
//! The findings of the static-analysis service are summarized by the hosted
//! language model in two passes: one over the requested permissions and one
//! over the sensitive API usage matched against the SuSi dataset.

pub mod permissions;
pub mod sensitive_api;

use crate::{llm::LlmClient, mobsf::Report, print_warning, results::Results, Config};

/// Runs both analysis passes over the scan report.
///
/// A failed pass is reported as a warning so that the other pass, and the
/// report generation, still happen with whatever was gathered.
pub fn analysis(config: &Config, llm: &LlmClient, report: &Report, results: &mut Results) {
    if config.is_verbose() {
        println!(
            "It's time to analyze the findings. The permissions and the sensitive API usage \
             will be sent to the language model for assessment. Let's start!"
        );
    }

    if let Err(e) = permissions::analysis(config, llm, report, results) {
        print_warning(format!(
            "there was an error analyzing the permissions: {}",
            e
        ));
    }

    if let Err(e) = sensitive_api::analysis(config, llm, report, results) {
        print_warning(format!(
            "there was an error analyzing the sensitive API usage: {}",
            e
        ));
    }
}

/// Joins the given lines in chunks of at most `chunk_size` lines.
pub(crate) fn chunk_lines(lines: &[String], chunk_size: usize) -> Vec<String> {
    lines
        .chunks(chunk_size.max(1))
        .map(|chunk| chunk.join("\n"))
        .collect()
}
