// ABOUTME: Shared text helpers for bot replies
// ABOUTME: Markdown to Telegram-flavoured HTML, HTML escaping and human-readable list joining

use pulldown_cmark::{Event, Parser, Tag, TagEnd};

/// Escape the three characters Telegram's HTML parse mode treats specially
pub fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Convert markdown to the restricted HTML subset Telegram accepts.
///
/// Telegram rejects block tags like `<p>` or `<ul>`, so headings become bold
/// lines, list items become bullets and paragraphs become blank-line breaks.
pub fn markdown_to_telegram_html(markdown: &str) -> String {
    let mut out = String::new();
    for event in Parser::new(markdown) {
        match event {
            Event::Start(Tag::Heading { .. }) | Event::Start(Tag::Strong) => out.push_str("<b>"),
            Event::End(TagEnd::Heading(_)) => out.push_str("</b>\n"),
            Event::End(TagEnd::Strong) => out.push_str("</b>"),
            Event::Start(Tag::Emphasis) => out.push_str("<i>"),
            Event::End(TagEnd::Emphasis) => out.push_str("</i>"),
            Event::Start(Tag::Item) => out.push_str("• "),
            Event::End(TagEnd::Item) => out.push('\n'),
            Event::End(TagEnd::Paragraph) | Event::End(TagEnd::List(_)) => out.push('\n'),
            Event::Start(Tag::CodeBlock(_)) => out.push_str("<pre>"),
            Event::End(TagEnd::CodeBlock) => out.push_str("</pre>\n"),
            Event::Code(code) => {
                out.push_str("<code>");
                out.push_str(&html_escape(&code));
                out.push_str("</code>");
            }
            Event::Text(text) => out.push_str(&html_escape(&text)),
            Event::SoftBreak | Event::HardBreak => out.push('\n'),
            _ => {}
        }
    }
    // collapse the paragraph spacing at the very end
    out.trim_end().to_string()
}

/// Join items as "a", "a and b", "a, b and c"
pub fn human_join(items: &[String]) -> String {
    match items {
        [] => String::new(),
        [only] => only.clone(),
        [rest @ .., last] => format!("{} and {}", rest.join(", "), last),
    }
}
