//! Markdown page assembly.
//!
//! A page is `header + rendered markdown + footer`, with the page title
//! substituted into the header according to its [`TitleMode`].

use crate::headers::{HeaderFooterEntry, TitleMode};
use pulldown_cmark::{Options as MarkdownOptions, Parser, html as md_html};
use std::borrow::Cow;
use std::path::Path;

/// Markdown line that sets the page title for `{{from-tag}}` headers.
pub const TITLE_DIRECTIVE: &str = ":title ";

pub fn is_markdown(path: &Path) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case("md"))
        .unwrap_or(false)
}

/// Text of the first level-1 ATX heading (`# Title`).
pub fn title_from_h1(markdown: &str) -> Option<String> {
    markdown
        .lines()
        .find_map(|line| line.strip_prefix("# "))
        .map(|title| title.trim().to_string())
        .filter(|title| !title.is_empty())
}

/// Find the first `:title ` directive, returning the title and the markdown
/// with the directive line and one following blank line removed.
pub fn take_title_directive(markdown: &str) -> Option<(String, String)> {
    let mut offset = 0;
    for line in markdown.split_inclusive('\n') {
        let bare = line.trim_end_matches(['\n', '\r']);
        if let Some(title) = bare.strip_prefix(TITLE_DIRECTIVE) {
            let rest = &markdown[offset + line.len()..];
            let blank = rest
                .split_inclusive('\n')
                .next()
                .filter(|next| next.trim().is_empty())
                .map_or(0, str::len);

            let mut body = String::with_capacity(markdown.len());
            body.push_str(&markdown[..offset]);
            body.push_str(&rest[blank..]);
            return Some((title.trim().to_string(), body));
        }
        offset += line.len();
    }
    None
}

pub fn render_markdown(markdown: &str) -> String {
    let options = MarkdownOptions::ENABLE_TABLES
        | MarkdownOptions::ENABLE_STRIKETHROUGH
        | MarkdownOptions::ENABLE_FOOTNOTES;
    let parser = Parser::new_ext(markdown, options);
    let mut body = String::with_capacity(markdown.len() * 3 / 2);
    md_html::push_html(&mut body, parser);
    body
}

/// Assemble a full HTML page.
///
/// `default_title` is used when the header asks for a title the page does not
/// provide, and when the header has no placeholder at all.
pub fn render_page(
    header: &HeaderFooterEntry,
    footer: &HeaderFooterEntry,
    markdown: &str,
    default_title: &str,
) -> Vec<u8> {
    let (title, body): (String, Cow<'_, str>) = match header.title_mode {
        TitleMode::FromH1 => (
            title_from_h1(markdown).unwrap_or_else(|| default_title.to_string()),
            Cow::Borrowed(markdown),
        ),
        TitleMode::FromTag => match take_title_directive(markdown) {
            Some((title, rest)) => (title, Cow::Owned(rest)),
            None => (default_title.to_string(), Cow::Borrowed(markdown)),
        },
        TitleMode::None => (default_title.to_string(), Cow::Borrowed(markdown)),
    };

    let mut page = header.render(&title);
    page.push_str(&render_markdown(&body));
    page.push_str(&footer.render(&title));
    page.into_bytes()
}
