//! Command line interface definition.

use clap::{App, Arg};

/// Generates the clap `App` for the analyzer.
///
/// The same definition is used by `build.rs` to generate shell completion
/// scripts, so it must stay free of runtime-only state.
pub fn generate_cli() -> App<'static, 'static> {
    App::new("apkscope")
        .version(crate_version!())
        .author(crate_authors!())
        .about("Triages Android packages through MobSF, SuSi and a hosted LLM")
        .arg(
            Arg::with_name("package")
                .help("Path to the APK file to analyze")
                .value_name("PACKAGE")
                .required(true)
                .takes_value(true),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .conflicts_with("quiet")
                .help("Shows detailed information about the triage process"),
        )
        .arg(
            Arg::with_name("quiet")
                .short("q")
                .long("quiet")
                .conflicts_with("verbose")
                .help("Only shows warnings and errors"),
        )
        .arg(
            Arg::with_name("force")
                .long("force")
                .help("Overwrites previous results for the same package"),
        )
        .arg(
            Arg::with_name("bench")
                .long("bench")
                .help("Times each phase of the triage pipeline"),
        )
        .arg(
            Arg::with_name("open")
                .long("open")
                .help("Opens the generated report in the default browser"),
        )
        .arg(
            Arg::with_name("json")
                .long("json")
                .help("Generates the JSON report"),
        )
        .arg(
            Arg::with_name("html")
                .long("html")
                .help("Generates the HTML report"),
        )
        .arg(
            Arg::with_name("results")
                .long("results")
                .value_name("FOLDER")
                .takes_value(true)
                .help("Folder where the results will be stored"),
        )
        .arg(
            Arg::with_name("mobsf-url")
                .long("mobsf-url")
                .value_name("URL")
                .takes_value(true)
                .help("Base URL of the MobSF instance to use"),
        )
}
