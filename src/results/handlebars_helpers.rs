//! Custom helpers for the report templates.

use handlebars::{
    Context, Handlebars, Helper, HelperDef, HelperResult, Output, RenderContext, RenderError,
};

use crate::results::utils::html_escape;

/// Renders a block of model prose as HTML paragraphs.
///
/// The executive summaries come back from the model as plain text with line
/// breaks; each non-empty line becomes an escaped `<p>` element.
#[derive(Debug, Clone, Copy)]
pub struct Paragraphs;

impl HelperDef for Paragraphs {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'reg, 'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let text = h
            .param(0)
            .and_then(|param| param.value().as_str())
            .ok_or_else(|| RenderError::new("paragraphs helper requires a string parameter"))?;

        for line in text.lines().map(str::trim).filter(|line| !line.is_empty()) {
            out.write("<p>")?;
            out.write(html_escape(line).as_ref())?;
            out.write("</p>")?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::Paragraphs;
    use handlebars::Handlebars;
    use serde_json::json;

    fn registry() -> Handlebars<'static> {
        let mut handlebars = Handlebars::new();
        let _ = handlebars.register_helper("paragraphs", Box::new(Paragraphs));
        handlebars
            .register_template_string("t", "{{{paragraphs text}}}")
            .unwrap();
        handlebars
    }

    /// Test that lines become paragraphs and get escaped.
    #[test]
    fn it_paragraphs() {
        let rendered = registry()
            .render("t", &json!({"text": "First line.\n\n- <b>Second</b>\n"}))
            .unwrap();

        assert_eq!(
            rendered,
            "<p>First line.</p><p>- &lt;b&gt;Second&lt;/b&gt;</p>"
        );
    }

    /// Test that a missing parameter is a render error.
    #[test]
    fn it_paragraphs_missing_param() {
        let mut handlebars = Handlebars::new();
        let _ = handlebars.register_helper("paragraphs", Box::new(Paragraphs));
        handlebars
            .register_template_string("t", "{{{paragraphs missing}}}")
            .unwrap();

        assert!(handlebars.render("t", &serde_json::json!({})).is_err());
    }
}
