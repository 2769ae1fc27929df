//! Client for the MobSF REST API.
//!
//! The static analysis itself is delegated to a locally running MobSF
//! instance. This module only drives its upload/scan/report endpoints and
//! exposes the subset of the JSON report that the rest of the pipeline
//! consumes.

use std::{collections::BTreeMap, fs, path::Path, thread::sleep, time::Duration};

use anyhow::{anyhow, bail, Context, Result};
use reqwest::blocking::{
    multipart::{Form, Part},
    Client,
};
use serde::Deserialize;
use serde_json::Value;

use crate::{print_warning, Config};

/// MIME type for Android packages.
const APK_MIME: &str = "application/vnd.android.package-archive";

/// Client for a MobSF instance.
pub struct MobSf {
    /// Underlying HTTP client.
    client: Client,
    /// Base URL of the instance, without a trailing slash.
    base_url: String,
    /// API key, sent in the `Authorization` header.
    api_key: String,
    /// Attempts when fetching the scan report.
    report_retries: usize,
    /// Delay between report fetch attempts.
    report_retry_delay: Duration,
}

/// Response of the upload endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadResponse {
    /// Hash identifying the uploaded file in the instance.
    pub hash: String,
    /// Type of scan the instance selected for the file.
    pub scan_type: String,
    /// Name the instance stored the file under.
    pub file_name: String,
}

/// Details of a permission in the scan report.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PermissionInfo {
    /// Status assigned by the scanner (normal, dangerous…).
    #[serde(default)]
    pub status: String,
    /// Short description of the permission.
    #[serde(default)]
    pub info: String,
    /// Long description of the permission.
    #[serde(default)]
    pub description: String,
}

/// One category of the `android_api` section of the scan report.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiCategory {
    /// Files where the API usage was found, mapped to the matched lines.
    #[serde(default)]
    pub files: BTreeMap<String, String>,
}

/// Typed subset of the scan report.
///
/// The full report is kept around as raw JSON so that it can be persisted
/// verbatim, since downstream consumers may care about sections this crate
/// does not.
#[derive(Debug, Clone, Default)]
pub struct Report {
    /// Raw report, as returned by the instance.
    raw: Value,
    /// Typed fields extracted from the raw report.
    fields: ReportFields,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ReportFields {
    #[serde(default)]
    app_name: String,
    #[serde(default)]
    package_name: String,
    #[serde(default)]
    version_name: String,
    #[serde(default)]
    size: String,
    #[serde(default)]
    md5: String,
    #[serde(default)]
    permissions: BTreeMap<String, PermissionInfo>,
    #[serde(default)]
    android_api: BTreeMap<String, ApiCategory>,
}

impl Report {
    /// Creates a report from the raw JSON value.
    pub fn from_value(raw: Value) -> Result<Self> {
        let fields = serde_json::from_value(raw.clone())
            .context("the scan report did not have the expected structure")?;

        Ok(Self { raw, fields })
    }

    /// Persists the raw report, pretty-printed, to the given path.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.raw)?;
        fs::write(path.as_ref(), json).with_context(|| {
            format!(
                "could not write the scan report to {}",
                path.as_ref().display()
            )
        })
    }

    /// Gets the name of the application.
    pub fn get_app_name(&self) -> &str {
        &self.fields.app_name
    }

    /// Gets the package name of the application.
    pub fn get_package_name(&self) -> &str {
        &self.fields.package_name
    }

    /// Gets the version name of the application.
    pub fn get_version_name(&self) -> &str {
        &self.fields.version_name
    }

    /// Gets the size of the application, as reported by the scanner.
    pub fn get_size(&self) -> &str {
        &self.fields.size
    }

    /// Gets the MD5 hash the scanner computed for the application.
    pub fn get_md5(&self) -> &str {
        &self.fields.md5
    }

    /// Gets the permissions section of the report.
    pub fn get_permissions(&self) -> &BTreeMap<String, PermissionInfo> {
        &self.fields.permissions
    }

    /// Gets the names of the requested permissions.
    pub fn permission_names(&self) -> Vec<String> {
        self.fields.permissions.keys().cloned().collect()
    }

    /// Flattens the `android_api` section into (category, file) pairs.
    ///
    /// Both members are lowercased, since the sensitive-API matching is
    /// case-insensitive.
    pub fn api_entries(&self) -> Vec<(String, String)> {
        let mut entries = Vec::new();
        for (category, detail) in &self.fields.android_api {
            for file in detail.files.keys() {
                entries.push((category.to_lowercase(), file.to_lowercase()));
            }
        }
        entries
    }
}

/// Gets the error member of a response, if any.
///
/// MobSF reports failures for in-progress scans as a 200 response with an
/// `error` member instead of an HTTP error status.
fn response_error(response: &Value) -> Option<&str> {
    response.get("error").and_then(Value::as_str)
}

impl MobSf {
    /// Creates a client for the instance in the given configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.get_request_timeout())
            .build()
            .context("could not create the HTTP client for MobSF")?;

        Ok(Self {
            client,
            base_url: config.get_mobsf_url().to_owned(),
            api_key: config.get_mobsf_api_key().to_owned(),
            report_retries: config.get_report_retries(),
            report_retry_delay: config.get_report_retry_delay(),
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Uploads the given APK file to the instance.
    pub fn upload<P: AsRef<Path>>(&self, package: P) -> Result<UploadResponse> {
        let part = Part::file(package.as_ref())
            .with_context(|| {
                format!(
                    "could not read the APK file at {}",
                    package.as_ref().display()
                )
            })?
            .mime_str(APK_MIME)?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(&self.url("/api/v1/upload"))
            .header(reqwest::header::AUTHORIZATION, self.api_key.as_str())
            .multipart(form)
            .send()
            .context("could not connect to the MobSF instance")?
            .error_for_status()
            .context("the MobSF upload was rejected")?;

        response
            .json()
            .context("could not parse the MobSF upload response")
    }

    /// Starts a scan of a previously uploaded file.
    pub fn scan(&self, upload: &UploadResponse) -> Result<()> {
        let _: Value = self
            .client
            .post(&self.url("/api/v1/scan"))
            .header(reqwest::header::AUTHORIZATION, self.api_key.as_str())
            .form(&[
                ("hash", upload.hash.as_str()),
                ("scan_type", upload.scan_type.as_str()),
                ("file_name", upload.file_name.as_str()),
                ("re_scan", "0"),
            ])
            .send()
            .context("could not connect to the MobSF instance")?
            .error_for_status()
            .context("the MobSF scan request was rejected")?
            .json()
            .context("could not parse the MobSF scan response")?;

        Ok(())
    }

    /// Fetches the JSON report of a finished scan.
    ///
    /// The scan runs asynchronously in the instance, so the report is polled
    /// with the configured retry count and delay.
    pub fn report_json(&self, hash: &str) -> Result<Report> {
        let mut last_error = None;
        for attempt in 1..=self.report_retries {
            match self.fetch_report(hash) {
                Ok(report) => return Ok(report),
                Err(e) => {
                    if attempt < self.report_retries {
                        print_warning(format!(
                            "the scan report is not ready yet (attempt {}/{}): {}",
                            attempt, self.report_retries, e
                        ));
                        sleep(self.report_retry_delay);
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| anyhow!("no report fetch was attempted"))
            .context(format!(
                "could not fetch the scan report after {} attempts",
                self.report_retries
            )))
    }

    fn fetch_report(&self, hash: &str) -> Result<Report> {
        // Newer MobSF releases want a JSON body, older ones a form body. Try
        // the JSON body first and fall back on rejection.
        let json_attempt = self
            .client
            .post(&self.url("/api/v1/report_json"))
            .header(reqwest::header::AUTHORIZATION, self.api_key.as_str())
            .json(&serde_json::json!({ "hash": hash }))
            .send()
            .context("could not connect to the MobSF instance")?
            .error_for_status();

        let raw: Value = match json_attempt {
            Ok(response) => response
                .json()
                .context("could not parse the MobSF report response")?,
            Err(_) => self
                .client
                .post(&self.url("/api/v1/report_json"))
                .header(reqwest::header::AUTHORIZATION, self.api_key.as_str())
                .form(&[("hash", hash)])
                .send()
                .context("could not connect to the MobSF instance")?
                .error_for_status()
                .context("the MobSF report request was rejected")?
                .json()
                .context("could not parse the MobSF report response")?,
        };

        if let Some(error) = response_error(&raw) {
            bail!("the MobSF instance returned an error: {}", error);
        }

        Report::from_value(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::{response_error, Report};
    use serde_json::json;

    fn sample_report() -> Report {
        Report::from_value(json!({
            "app_name": "Test App",
            "package_name": "com.example.test",
            "version_name": "1.2.3",
            "size": "4.2MB",
            "md5": "0123456789abcdef0123456789abcdef",
            "permissions": {
                "android.permission.INTERNET": {
                    "status": "normal",
                    "info": "full Internet access",
                    "description": "Allows the app to create network sockets."
                },
                "android.permission.SEND_SMS": {
                    "status": "dangerous",
                    "info": "send SMS messages",
                    "description": "Allows the app to send SMS messages."
                }
            },
            "android_api": {
                "api_sms": {
                    "files": {
                        "com/example/test/Sender.java": "12,45"
                    }
                },
                "API_Reflection": {
                    "metadata": "ignored",
                    "files": {
                        "com/example/test/Loader.java": "3"
                    }
                }
            },
            "unrelated_section": [1, 2, 3]
        }))
        .unwrap()
    }

    /// Test the typed accessors over a report sample.
    #[test]
    fn it_report_fields() {
        let report = sample_report();

        assert_eq!(report.get_app_name(), "Test App");
        assert_eq!(report.get_package_name(), "com.example.test");
        assert_eq!(report.get_version_name(), "1.2.3");
        assert_eq!(report.get_size(), "4.2MB");
        assert_eq!(report.get_md5(), "0123456789abcdef0123456789abcdef");
        assert_eq!(
            report.permission_names(),
            vec![
                "android.permission.INTERNET".to_owned(),
                "android.permission.SEND_SMS".to_owned(),
            ]
        );
        assert_eq!(
            report.get_permissions()["android.permission.SEND_SMS"].status,
            "dangerous"
        );
    }

    /// Test that API entries are flattened and lowercased.
    #[test]
    fn it_api_entries() {
        let report = sample_report();

        let entries = report.api_entries();
        assert_eq!(entries.len(), 2);
        assert!(entries.contains(&(
            "api_reflection".to_owned(),
            "com/example/test/loader.java".to_owned()
        )));
        assert!(entries.contains(&(
            "api_sms".to_owned(),
            "com/example/test/sender.java".to_owned()
        )));
    }

    /// Test that a report without the typed sections still parses.
    #[test]
    fn it_report_empty() {
        let report = Report::from_value(json!({})).unwrap();

        assert!(report.permission_names().is_empty());
        assert!(report.api_entries().is_empty());
        assert_eq!(report.get_app_name(), "");
    }

    /// Test the detection of in-band errors.
    #[test]
    fn it_response_error() {
        assert_eq!(
            response_error(&json!({"error": "Scan not completed"})),
            Some("Scan not completed")
        );
        assert_eq!(response_error(&json!({"report": "ok"})), None);
    }

    /// Test persisting the raw report.
    #[test]
    fn it_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");

        sample_report().save(&path).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["app_name"], "Test App");
        // Sections outside the typed subset survive verbatim.
        assert_eq!(raw["unrelated_section"][0], 1);
    }
}
