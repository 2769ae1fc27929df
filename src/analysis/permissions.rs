//! Permission analysis.
//!
//! Sends the permissions requested by the application to the language model
//! in chunks and asks for a plain-English assessment, then for an executive
//! summary of the combined assessments.

use anyhow::{bail, Context, Result};

use super::chunk_lines;
use crate::{llm::LlmClient, mobsf::Report, print_warning, results::Results, Config};

const TEMPERATURE: f32 = 0.3;
const MAX_TOKENS: u32 = 1024;

/// Runs the permission analysis and stores the outcome in the results.
pub fn analysis(
    config: &Config,
    llm: &LlmClient,
    report: &Report,
    results: &mut Results,
) -> Result<()> {
    let permissions = report.permission_names();
    results.set_permissions(permissions.clone());

    if permissions.is_empty() {
        if !config.is_quiet() {
            println!("The scan report contains no permissions, there is nothing to analyze.");
        }
        return Ok(());
    }
    if !config.is_quiet() {
        println!("Extracted {} permissions.", permissions.len());
    }

    let lines: Vec<String> = permissions
        .iter()
        .map(|permission| format!("- {}", permission))
        .collect();
    let chunks = chunk_lines(&lines, config.get_permission_chunk_size());

    if config.is_verbose() {
        println!("Analyzing {} permission chunk(s).", chunks.len());
    }

    let mut analyses = Vec::with_capacity(chunks.len());
    for (i, chunk) in chunks.iter().enumerate() {
        if config.is_verbose() {
            println!("Analyzing chunk {}/{}.", i + 1, chunks.len());
        }
        match llm.complete(&analysis_prompt(chunk), TEMPERATURE, MAX_TOKENS) {
            Ok(analysis) => analyses.push(analysis),
            Err(e) => print_warning(format!(
                "permission chunk {}/{} could not be analyzed: {}",
                i + 1,
                chunks.len(),
                e
            )),
        }
    }

    if analyses.is_empty() {
        bail!("none of the permission chunks could be analyzed");
    }

    let summary = llm
        .complete(&summary_prompt(&analyses), TEMPERATURE, MAX_TOKENS)
        .context("could not generate the permission executive summary")?;
    results.set_permission_summary(summary);

    if !config.is_quiet() {
        println!("Permission analysis done.");
    }

    Ok(())
}

/// Builds the per-chunk analysis prompt.
fn analysis_prompt(chunk: &str) -> String {
    format!(
        "You are a mobile security analyst. Analyze the following Android app permissions from \
         a security and privacy standpoint.\n\
         \n\
         For each permission:\n\
         - Explain its purpose in simple terms.\n\
         - Analyze how it can be abused or misused.\n\
         - Determine if it's sensitive or overprivileged.\n\
         \n\
         At the end, provide:\n\
         - A summary of risky combinations (e.g., Internet + SMS)\n\
         - An overall risk rating\n\
         - Recommendations to developers or users\n\
         \n\
         Write your analysis in plain English, no JSON.\n\
         \n\
         Permissions:\n\
         {}",
        chunk
    )
}

/// Builds the executive summary prompt from the combined chunk analyses.
fn summary_prompt(analyses: &[String]) -> String {
    format!(
        "You are an Android security consultant. Based on this analysis, give a plain-text \
         executive summary.\n\
         \n\
         Analysis:\n\
         {}\n\
         \n\
         Write 3 bullet points summarizing the overall security risks, user impact, and \
         developer recommendations.\n\
         Avoid using technical terms or JSON.",
        analyses.join("\n\n---\n\n")
    )
}

#[cfg(test)]
mod tests {
    use super::{analysis_prompt, summary_prompt};

    /// Test that the analysis prompt embeds the permission chunk.
    #[test]
    fn it_analysis_prompt() {
        let prompt = analysis_prompt("- android.permission.SEND_SMS");

        assert!(prompt.contains("mobile security analyst"));
        assert!(prompt.contains("- android.permission.SEND_SMS"));
        assert!(prompt.contains("no JSON"));
    }

    /// Test that the summary prompt separates the chunk analyses.
    #[test]
    fn it_summary_prompt() {
        let prompt = summary_prompt(&[
            "First chunk analysis.".to_owned(),
            "Second chunk analysis.".to_owned(),
        ]);

        assert!(prompt.contains("First chunk analysis.\n\n---\n\nSecond chunk analysis."));
        assert!(prompt.contains("3 bullet points"));
    }
}
