//! Embedded email templates with `{{keyword}}` placeholders.

use rust_embed::RustEmbed;

use crate::error::EmailError;

#[derive(RustEmbed)]
#[folder = "emails/"]
struct Templates;

/// Subject plus HTML and plain-text bodies of one email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailContent {
    pub subject: String,
    pub html: String,
    pub text: String,
}

impl EmailContent {
    /// Render `{name}.html` and `{name}.txt` with the given keywords.
    pub fn render(
        subject: impl Into<String>,
        name: &str,
        keywords: &[(&str, &str)],
    ) -> Result<Self, EmailError> {
        Ok(Self {
            subject: subject.into(),
            html: render_template(&format!("{name}.html"), keywords)?,
            text: render_template(&format!("{name}.txt"), keywords)?,
        })
    }
}

/// Load an embedded template and replace every `{{keyword}}`.
pub fn render_template(path: &str, keywords: &[(&str, &str)]) -> Result<String, EmailError> {
    let file = Templates::get(path).ok_or_else(|| EmailError::TemplateMissing(path.to_owned()))?;
    let mut rendered = std::str::from_utf8(&file.data)
        .map_err(|_| EmailError::TemplateEncoding(path.to_owned()))?
        .to_owned();

    for (keyword, replacement) in keywords {
        rendered = rendered.replace(&format!("{{{{{keyword}}}}}"), replacement);
    }
    Ok(rendered)
}
