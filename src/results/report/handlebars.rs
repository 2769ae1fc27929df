//! Handlebars report generation module.

use std::{
    fs::{self, File},
    io::Write,
    path::Path,
};

use anyhow::{anyhow, bail, Context, Result};
use colored::Colorize;
use handlebars::Handlebars;

use crate::{
    config::Config,
    copy_folder,
    results::{handlebars_helpers::Paragraphs, report::Generator, utils::html_escape, Results},
};

/// Handlebars report generator.
pub struct Report<'r> {
    /// Handlebars template structure.
    handler: Handlebars<'r>,
    /// Package name.
    package: String,
}

impl<'r> Report<'r> {
    /// Creates a new handlebars report generator.
    pub fn from_path<P: AsRef<Path>, S: Into<String>>(
        template_path: P,
        package: S,
    ) -> Result<Self> {
        let handlebars_handler =
            Self::load_templates(template_path).context("could not load handlebars templates")?;

        Ok(Self {
            handler: handlebars_handler,
            package: package.into(),
        })
    }

    /// Loads templates from the given path.
    fn load_templates<P: AsRef<Path>>(template_path: P) -> Result<Handlebars<'r>> {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(|s| html_escape(s).into_owned());
        let _ = handlebars.register_helper("paragraphs", Box::new(Paragraphs));
        for dir_entry in fs::read_dir(template_path)? {
            let dir_entry = dir_entry?;
            if let Some(ext) = dir_entry.path().extension() {
                if ext == "hbs" {
                    let path = dir_entry.path();
                    let template_file = path
                        .file_stem()
                        .ok_or_else(|| anyhow!("template files must have a file name"))
                        .and_then(|stem| {
                            stem.to_str()
                                .ok_or_else(|| anyhow!("template names must be unicode"))
                        })?;

                    handlebars
                        .register_template_file(template_file, dir_entry.path())
                        .context("error registering template file")?;
                }
            }
        }

        if handlebars.get_template("report").is_none() {
            bail!("templates must include a {} template", "report".italic());
        }

        Ok(handlebars)
    }
}

impl<'r> Generator for Report<'r> {
    fn generate(&mut self, config: &Config, results: &Results) -> Result<()> {
        if config.is_verbose() {
            println!("Starting HTML report generation. First we create the file.")
        }
        let mut f = File::create(
            config
                .get_results_folder()
                .join(&self.package)
                .join("index.html"),
        )?;
        if config.is_verbose() {
            println!("The report file has been created. Now it's time to fill it.")
        }

        f.write_all(self.handler.render("report", results)?.as_bytes())?;

        // Static assets (stylesheets, images) ship next to the templates and
        // get copied next to the report.
        for entry in fs::read_dir(config.get_template_path())? {
            let entry = entry?;
            let entry_path = entry.path();
            if entry.file_type()?.is_dir() {
                copy_folder(
                    &entry_path,
                    &config
                        .get_results_folder()
                        .join(&self.package)
                        .join(entry_path.file_name().unwrap()),
                )?;
            } else {
                match entry_path.as_path().extension() {
                    Some(e) if e == "hbs" => {}
                    None => {}
                    Some(_) => {
                        let _ = fs::copy(
                            &entry_path,
                            config
                                .get_results_folder()
                                .join(&self.package)
                                .join(entry_path.file_name().unwrap()),
                        )?;
                    }
                }
            }
        }

        Ok(())
    }
}

/// Handlebars templates testing module.
#[cfg(test)]
mod tests {
    use super::Report;
    use crate::config::Config;
    use std::fs;

    /// Test the creation of a new report generator over the shipped templates.
    #[test]
    fn it_new() {
        let _ = Report::from_path(Config::default().get_template_path(), "test").unwrap();
    }

    /// Test the failure of the creation of an invalid new report generator.
    #[test]
    fn it_new_failure() {
        assert!(Report::from_path("random path", "test").is_err());
    }

    /// Test that a template folder without a report template is rejected.
    #[test]
    fn it_load_templates_no_report() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("other.hbs"), "<html></html>").unwrap();

        assert!(Report::load_templates(dir.path()).is_err());
    }
}
