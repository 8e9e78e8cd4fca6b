use pulldown_cmark::{html, Options, Parser};

/// Render post markdown to HTML that is safe to embed in a page.
///
/// Raw HTML in the source passes through the parser, so the output is always
/// run through ammonia's allowlist before it reaches a template.
pub fn render(source: &str) -> String {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_FOOTNOTES;

    let mut unsafe_html = String::with_capacity(source.len() * 3 / 2);
    html::push_html(&mut unsafe_html, Parser::new_ext(source, options));
    ammonia::clean(&unsafe_html)
}
