//! Server-rendered pages embedded from `templates/`.

use axum::response::Html;
use rust_embed::RustEmbed;

use crate::error::ApiError;

#[derive(RustEmbed)]
#[folder = "templates/"]
struct Pages;

fn load(name: &str) -> Result<String, ApiError> {
    let file = Pages::get(name).ok_or_else(|| ApiError::internal(format!("missing page {name}")))?;
    String::from_utf8(file.data.into_owned())
        .map_err(|_| ApiError::internal(format!("page {name} is not utf-8")))
}

/// Render `name` inside the shared layout. Keyword values are inserted as
/// given, so callers escape anything user-controlled.
pub fn render_page(title: &str, name: &str, keywords: &[(&str, &str)]) -> Result<Html<String>, ApiError> {
    let mut body = load(name)?;
    for (keyword, value) in keywords {
        body = body.replace(&format!("{{{{{keyword}}}}}"), value);
    }
    let page = load("layout.html")?
        .replace("{{title}}", title)
        .replace("{{body}}", &body);
    Ok(Html(page))
}
