//! Sensitive API analysis.
//!
//! Matches the API usage found by the static-analysis service against the
//! SuSi source/sink dataset and asks the language model for a strict-JSON
//! risk assessment of the matches, chunk by chunk.

use std::{collections::BTreeMap, fmt, fs, path::Path};

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::chunk_lines;
use crate::{
    llm::LlmClient, mobsf::Report, print_warning, results::Results, Config, RiskLevel,
};

const TEMPERATURE: f32 = 0.2;
const MAX_TOKENS: u32 = 700;

lazy_static! {
    /// Matches a SuSi method signature such as
    /// `<android.telephony.SmsManager: void sendTextMessage(...)>` and
    /// captures the class and the method name.
    static ref SUSI_METHOD: Regex = Regex::new(r"<(.+?):\s.*?\s(\w+)\(.*\)>").unwrap();
}

/// Kind of a sensitive API method in the dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ApiKind {
    /// The method reads sensitive data.
    Source,
    /// The method lets data leave the device.
    Sink,
}

impl fmt::Display for ApiKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", format!("{:?}", self).to_lowercase())
    }
}

/// A scan report entry that matched the dataset, with its match counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuspiciousEntry {
    /// API category the scanner assigned to the entry.
    pub category: String,
    /// File where the usage was found.
    pub file: String,
    /// Number of source methods that matched.
    pub sources: usize,
    /// Number of sink methods that matched.
    pub sinks: usize,
}

/// Risk assessment of one chunk, as returned by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskFinding {
    /// Overall risk level of the chunk.
    pub risk_level: RiskLevel,
    /// Kinds of risk identified (obfuscation, data_leak…).
    #[serde(default)]
    pub risk_type: Vec<String>,
    /// Concrete indicators backing the assessment.
    #[serde(default)]
    pub key_indicators: Vec<String>,
    /// Short explanation of the assessment.
    #[serde(default)]
    pub summary: String,
    /// Suggested follow-ups.
    #[serde(default)]
    pub next_steps: Vec<String>,
}

/// Aggregated statistics over the risk assessments.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RiskStats {
    /// Chunks sent to the model.
    pub total_chunks: usize,
    /// Chunks assessed as high risk.
    pub high_risk: usize,
    /// Chunks assessed as medium risk.
    pub medium_risk: usize,
}

impl RiskStats {
    /// Computes the statistics for the given assessments.
    pub fn from_findings(total_chunks: usize, findings: &[RiskFinding]) -> Self {
        Self {
            total_chunks,
            high_risk: findings
                .iter()
                .filter(|f| f.risk_level == RiskLevel::High)
                .count(),
            medium_risk: findings
                .iter()
                .filter(|f| f.risk_level == RiskLevel::Medium)
                .count(),
        }
    }
}

/// Parses a SuSi dataset file into a method name to kind map.
///
/// Method names are lowercased; names of one or two characters are too
/// generic to fuzzy match and get dropped.
pub fn parse_susi_file<P: AsRef<Path>>(path: P, kind: ApiKind) -> Result<BTreeMap<String, ApiKind>> {
    let bytes = fs::read(path.as_ref()).with_context(|| {
        format!(
            "could not read the SuSi dataset file at {}",
            path.as_ref().display()
        )
    })?;
    // The dataset files are not entirely UTF-8 clean.
    let contents = String::from_utf8_lossy(&bytes);

    let mut methods = BTreeMap::new();
    for line in contents.lines() {
        let line = line.trim();
        if !line.starts_with('<') || !line.contains('>') {
            continue;
        }
        if let Some(captures) = SUSI_METHOD.captures(line) {
            let method = captures[2].to_lowercase();
            if method.len() > 2 {
                let _ = methods.insert(method, kind);
            }
        }
    }

    Ok(methods)
}

/// Matches the report entries against the dataset methods.
///
/// A method matches an entry when its name appears in the entry's category
/// or file path; matches are aggregated per (category, file) pair.
pub fn match_entries(
    entries: &[(String, String)],
    methods: &BTreeMap<String, ApiKind>,
) -> Vec<SuspiciousEntry> {
    let mut counts: BTreeMap<(&str, &str), (usize, usize)> = BTreeMap::new();
    for (category, file) in entries {
        for (method, kind) in methods {
            if category.contains(method.as_str()) || file.contains(method.as_str()) {
                let count = counts
                    .entry((category.as_str(), file.as_str()))
                    .or_default();
                match kind {
                    ApiKind::Source => count.0 += 1,
                    ApiKind::Sink => count.1 += 1,
                }
            }
        }
    }

    counts
        .into_iter()
        .map(|((category, file), (sources, sinks))| SuspiciousEntry {
            category: category.to_owned(),
            file: file.to_owned(),
            sources,
            sinks,
        })
        .collect()
}

/// Formats a suspicious entry the way the model sees it.
fn summary_line(entry: &SuspiciousEntry) -> String {
    format!(
        "- File: {} | Category: {} -> Sources: {}, Sinks: {}",
        entry.file, entry.category, entry.sources, entry.sinks
    )
}

/// Removes a markdown code fence around a model response, if present.
fn strip_code_fence(response: &str) -> &str {
    let trimmed = response.trim();
    if let Some(rest) = trimmed.strip_prefix("```") {
        let rest = rest.strip_prefix("json").unwrap_or(rest);
        let rest = rest.strip_suffix("```").unwrap_or(rest);
        return rest.trim();
    }
    trimmed
}

/// Parses a risk assessment response, dropping unparseable ones.
fn parse_finding(response: &str) -> Option<RiskFinding> {
    match serde_json::from_str(strip_code_fence(response)) {
        Ok(finding) => Some(finding),
        Err(e) => {
            print_warning(format!(
                "a risk assessment response could not be parsed and was dropped: {}",
                e
            ));
            None
        }
    }
}

/// Runs the sensitive API analysis and stores the outcome in the results.
pub fn analysis(
    config: &Config,
    llm: &LlmClient,
    report: &Report,
    results: &mut Results,
) -> Result<()> {
    if config.is_verbose() {
        println!("Loading the SuSi dataset.");
    }
    let mut methods = parse_susi_file(config.get_susi_sources_file(), ApiKind::Source)?;
    // Methods listed as both keep the sink kind, it is the riskier one.
    methods.extend(parse_susi_file(config.get_susi_sinks_file(), ApiKind::Sink)?);
    if !config.is_quiet() {
        println!("Loaded {} sensitive API methods.", methods.len());
    }

    let entries = report.api_entries();
    if config.is_verbose() {
        println!("Found {} API usage entries in the scan report.", entries.len());
    }

    let suspicious = match_entries(&entries, &methods);
    let lines: Vec<String> = suspicious.iter().map(summary_line).collect();

    let summary_path = config.get_output_folder().join("suspicious_summary.txt");
    let mut contents = lines.join("\n");
    if !contents.is_empty() {
        contents.push('\n');
    }
    fs::write(&summary_path, contents).with_context(|| {
        format!(
            "could not write the suspicious API summary to {}",
            summary_path.display()
        )
    })?;

    results.set_suspicious_entries(suspicious.clone());

    if suspicious.is_empty() {
        if !config.is_quiet() {
            println!("No sensitive API usage matched the dataset, skipping the risk assessment.");
        }
        return Ok(());
    }
    if !config.is_quiet() {
        println!("{} suspicious entries matched the dataset.", suspicious.len());
    }

    let chunks = chunk_lines(&lines, config.get_api_chunk_size());
    let mut findings = Vec::with_capacity(chunks.len());
    for (i, chunk) in chunks.iter().enumerate() {
        if config.is_verbose() {
            println!("Assessing chunk {}/{}.", i + 1, chunks.len());
        }
        match llm.complete(&assessment_prompt(chunk), TEMPERATURE, MAX_TOKENS) {
            Ok(response) => {
                if let Some(finding) = parse_finding(&response) {
                    findings.push(finding);
                }
            }
            Err(e) => print_warning(format!(
                "suspicious chunk {}/{} could not be assessed: {}",
                i + 1,
                chunks.len(),
                e
            )),
        }
    }

    let stats = RiskStats::from_findings(chunks.len(), &findings);
    if findings.is_empty() {
        print_warning("no valid risk assessments were produced, skipping the executive summary");
        results.set_api_risk(findings, stats, None);
        return Ok(());
    }

    let indicators: Vec<String> = findings
        .iter()
        .filter(|finding| finding.risk_level >= RiskLevel::Medium)
        .filter_map(|finding| finding.key_indicators.first().cloned())
        .collect();
    let summary = llm
        .complete(&executive_prompt(&stats, &indicators), TEMPERATURE, MAX_TOKENS)
        .context("could not generate the sensitive API executive summary")?;
    results.set_api_risk(findings, stats, Some(summary));

    if !config.is_quiet() {
        println!("Sensitive API analysis done.");
    }

    Ok(())
}

/// Builds the per-chunk risk assessment prompt.
///
/// The model is asked for bare JSON; fenced responses are tolerated by the
/// parser anyway.
fn assessment_prompt(chunk: &str) -> String {
    format!(
        "You are a senior Android malware analyst. Analyze this static code summary for \
         potential threats.\n\
         \n\
         Please examine the behavior of the app and provide a DETAILED assessment, \
         considering:\n\
         \n\
         - Usage of sensitive APIs (sources/sinks)\n\
         - Reflection, dynamic loading, obfuscation\n\
         - Data exfiltration or command-and-control (C2) behavior\n\
         - Privacy violations or system access abuse\n\
         \n\
         Respond ONLY with a valid JSON object in this format:\n\
         \n\
         {{\n\
         \x20 \"risk_level\": \"low\" | \"medium\" | \"high\",\n\
         \x20 \"risk_type\": [\"obfuscation\", \"data_leak\", \"c2_behavior\", \
         \"privilege_abuse\", \"...\"],\n\
         \x20 \"key_indicators\": [\n\
         \x20   \"DexClassLoader used with encrypted path\",\n\
         \x20   \"SMS read and send permissions together\",\n\
         \x20   \"Reflection used in native method invocation\"\n\
         \x20 ],\n\
         \x20 \"summary\": \"A few lines summarizing why this chunk is risky or not\",\n\
         \x20 \"next_steps\": [\n\
         \x20   \"Review obfuscated method chains in com.example.a.b\",\n\
         \x20   \"Check for encrypted network traffic endpoints\",\n\
         \x20   \"Correlate with dynamic analysis results\"\n\
         \x20 ]\n\
         }}\n\
         \n\
         Do NOT add any commentary outside the JSON. Focus on being concise but precise.\n\
         \n\
         Code under analysis:\n\
         {}",
        chunk
    )
}

/// Builds the executive summary prompt from the statistics and indicators.
fn executive_prompt(stats: &RiskStats, key_indicators: &[String]) -> String {
    format!(
        "You are a senior Android malware analyst.\n\
         \n\
         Based on the risk assessment findings below, generate a detailed summary of the \
         threats identified. Your output should be:\n\
         \n\
         - A clear bullet-point list (5-10 points)\n\
         - Each point should explain the specific risk, source/sink usage, and any \
         suspicious behavior.\n\
         - Highlight use of reflection, dynamic code loading, obfuscation, and potential \
         data exfiltration.\n\
         - End with 2 suggestions for further manual review.\n\
         \n\
         Do NOT include JSON or metadata. Just the summary in bullet format.\n\
         \n\
         Statistics:\n\
         - Total chunks assessed: {}\n\
         - High risk: {}\n\
         - Medium risk: {}\n\
         \n\
         Key Indicators:\n\
         {}",
        stats.total_chunks,
        stats.high_risk,
        stats.medium_risk,
        key_indicators.join("\n")
    )
}

#[cfg(test)]
mod tests {
    use super::{
        match_entries, parse_finding, parse_susi_file, strip_code_fence, summary_line,
        ApiKind, RiskFinding, RiskStats, SuspiciousEntry,
    };
    use crate::RiskLevel;
    use std::io::Write;

    /// Test parsing a SuSi dataset sample.
    #[test]
    fn it_parse_susi_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            b"% SuSi v0.9 output\n\
              <android.telephony.TelephonyManager: java.lang.String getDeviceId()> \
              (UNIQUE_IDENTIFIER)\n\
              <android.telephony.SmsManager: void sendTextMessage(java.lang.String, \
              java.lang.String, java.lang.String, android.app.PendingIntent, \
              android.app.PendingIntent)> (SMS_MMS)\n\
              <java.io.File: boolean b()> (FILE)\n\
              not a signature line\n",
        )
        .unwrap();

        let methods = parse_susi_file(file.path(), ApiKind::Source).unwrap();

        assert_eq!(methods.get("getdeviceid"), Some(&ApiKind::Source));
        assert_eq!(methods.get("sendtextmessage"), Some(&ApiKind::Source));
        // One-letter method names are dropped.
        assert!(!methods.contains_key("b"));
        assert_eq!(methods.len(), 2);
    }

    /// Test the fuzzy matching and aggregation.
    #[test]
    fn it_match_entries() {
        let mut methods = std::collections::BTreeMap::new();
        let _ = methods.insert("getdeviceid".to_owned(), ApiKind::Source);
        let _ = methods.insert("sendtextmessage".to_owned(), ApiKind::Sink);
        let entries = vec![
            (
                "api_getdeviceid_usage".to_owned(),
                "com/example/tracker.java".to_owned(),
            ),
            (
                "api_sms".to_owned(),
                "com/example/sendtextmessage_helper.java".to_owned(),
            ),
            ("api_camera".to_owned(), "com/example/photo.java".to_owned()),
        ];

        let suspicious = match_entries(&entries, &methods);

        assert_eq!(
            suspicious,
            vec![
                SuspiciousEntry {
                    category: "api_getdeviceid_usage".to_owned(),
                    file: "com/example/tracker.java".to_owned(),
                    sources: 1,
                    sinks: 0,
                },
                SuspiciousEntry {
                    category: "api_sms".to_owned(),
                    file: "com/example/sendtextmessage_helper.java".to_owned(),
                    sources: 0,
                    sinks: 1,
                },
            ]
        );
    }

    /// Test the summary line format.
    #[test]
    fn it_summary_line() {
        let entry = SuspiciousEntry {
            category: "api_sms".to_owned(),
            file: "com/example/sender.java".to_owned(),
            sources: 2,
            sinks: 1,
        };

        assert_eq!(
            summary_line(&entry),
            "- File: com/example/sender.java | Category: api_sms -> Sources: 2, Sinks: 1"
        );
    }

    /// Test the code fence stripping.
    #[test]
    fn it_strip_code_fence() {
        assert_eq!(strip_code_fence("{\"a\": 1}"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("```\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("  {\"a\": 1}  \n"), "{\"a\": 1}");
    }

    /// Test parsing risk assessment responses.
    #[test]
    fn it_parse_finding() {
        let finding = parse_finding(
            r#"{
                "risk_level": "high",
                "risk_type": ["data_leak"],
                "key_indicators": ["SMS read and send together"],
                "summary": "Exfiltration pattern.",
                "next_steps": ["Check network endpoints"]
            }"#,
        )
        .unwrap();
        assert_eq!(finding.risk_level, RiskLevel::High);
        assert_eq!(finding.key_indicators.len(), 1);

        // Fenced responses are tolerated.
        let fenced = parse_finding("```json\n{\"risk_level\": \"low\"}\n```").unwrap();
        assert_eq!(fenced.risk_level, RiskLevel::Low);
        assert!(fenced.risk_type.is_empty());

        // Anything else is dropped.
        assert!(parse_finding("I think this app is fine.").is_none());
        assert!(parse_finding("{\"risk_level\": \"catastrophic\"}").is_none());
    }

    /// Test the statistics aggregation.
    #[test]
    fn it_risk_stats() {
        let finding = |level| RiskFinding {
            risk_level: level,
            risk_type: Vec::new(),
            key_indicators: Vec::new(),
            summary: String::new(),
            next_steps: Vec::new(),
        };
        let findings = vec![
            finding(RiskLevel::High),
            finding(RiskLevel::Medium),
            finding(RiskLevel::Medium),
            finding(RiskLevel::Low),
        ];

        let stats = RiskStats::from_findings(5, &findings);

        assert_eq!(stats.total_chunks, 5);
        assert_eq!(stats.high_risk, 1);
        assert_eq!(stats.medium_risk, 2);
    }
}
