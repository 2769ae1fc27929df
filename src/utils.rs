use std::{fs, io, io::Write, path::Path};

use colored::Colorize;

/// Prints an error message to stderr.
pub fn print_error<S: AsRef<str>>(error: S) {
    let _ = io::stderr().write_all(
        format!("{} {}\n", "Error:".bold().red(), error.as_ref().red()).as_bytes(),
    );
}

/// Prints a warning message to stderr.
pub fn print_warning<S: AsRef<str>>(warning: S) {
    let _ = io::stderr().write_all(
        format!(
            "{} {}\n",
            "Warning:".bold().yellow(),
            warning.as_ref().yellow()
        )
        .as_bytes(),
    );
}

/// Checks if the given path exists.
pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
    fs::metadata(path).is_ok()
}

/// Gets the name of the package from the path of the APK file.
///
/// The name is the file stem, so `downloads/app.apk` becomes `app`.
pub fn get_package_name<P: AsRef<Path>>(package: P) -> String {
    package
        .as_ref()
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}
