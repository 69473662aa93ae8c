use std::fmt;

use pulldown_cmark::{html, CodeBlockKind, CowStr, Event, HeadingLevel, Options, Parser, Tag};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

/// How active content in model output is treated when producing markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HtmlPolicy {
    /// Raw HTML is emitted as escaped text, and link or image destinations
    /// with a scheme other than http, https or mailto become `#`.
    #[default]
    Escape,
    /// Raw HTML and every destination are passed through untouched. Only safe
    /// if the model is trusted not to return active content.
    Trusted,
}

const SAFE_SCHEMES: [&str; 3] = ["http", "https", "mailto"];

/// Relative destinations have no scheme and are always allowed. Browsers
/// ignore whitespace and control characters inside a scheme, so those are
/// dropped before comparing.
fn is_safe_destination(dest: &str) -> bool {
    let cleaned: String = dest
        .chars()
        .filter(|c| !c.is_ascii_whitespace() && !c.is_control())
        .collect();
    match cleaned.find([':', '/', '?', '#']) {
        Some(i) if cleaned[i..].starts_with(':') => {
            let scheme = cleaned[..i].to_ascii_lowercase();
            SAFE_SCHEMES.contains(&scheme.as_str())
        }
        _ => true,
    }
}

fn neutralize<'a>(dest: CowStr<'a>) -> CowStr<'a> {
    if is_safe_destination(&dest) {
        dest
    } else {
        CowStr::Borrowed("#")
    }
}

/// Markup produced from model output. Insert it into a document without
/// further escaping only if it was rendered under the policy you intended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedHtml(String);

impl fmt::Display for RenderedHtml {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_SMART_PUNCTUATION);
    options
}

pub fn markdown_to_html(markdown: &str, policy: HtmlPolicy) -> RenderedHtml {
    let parser = Parser::new_ext(markdown, options()).map(|event| match (policy, event) {
        (HtmlPolicy::Escape, Event::Html(raw)) => Event::Text(raw),
        (HtmlPolicy::Escape, Event::Start(Tag::Link(kind, dest, title))) => {
            Event::Start(Tag::Link(kind, neutralize(dest), title))
        }
        (HtmlPolicy::Escape, Event::Start(Tag::Image(kind, dest, title))) => {
            Event::Start(Tag::Image(kind, neutralize(dest), title))
        }
        (_, event) => event,
    });
    let mut output = String::new();
    html::push_html(&mut output, parser);
    RenderedHtml(output)
}

/// Convert markdown into styled terminal lines for the response pane.
pub fn markdown_to_lines(markdown: &str) -> Vec<Line<'static>> {
    let mut builder = LineBuilder::default();
    for event in Parser::new_ext(markdown, options()) {
        builder.handle(event);
    }
    builder.finish()
}

#[derive(Default)]
struct LineBuilder {
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    styles: Vec<Style>,
    lists: Vec<Option<u64>>,
    quote_depth: usize,
    in_code_block: bool,
    link_urls: Vec<String>,
}

impl LineBuilder {
    fn style(&self) -> Style {
        self.styles
            .iter()
            .fold(Style::default(), |acc, style| acc.patch(*style))
    }

    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let style = self.style();
        self.current.push(Span::styled(text.to_string(), style));
    }

    fn flush(&mut self) {
        if self.current.is_empty() {
            return;
        }
        let mut spans = Vec::with_capacity(self.current.len() + 1);
        if self.quote_depth > 0 {
            spans.push(Span::styled(
                "│ ".repeat(self.quote_depth),
                Style::default().fg(Color::DarkGray),
            ));
        }
        spans.append(&mut self.current);
        self.lines.push(Line::from(spans));
    }

    fn blank(&mut self) {
        self.flush();
        if self.lines.last().is_some_and(|l| l.spans.is_empty()) || self.lines.is_empty() {
            return;
        }
        self.lines.push(Line::default());
    }

    fn handle(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => {
                if self.in_code_block {
                    let style = Style::default().fg(Color::Green);
                    for line in text.lines() {
                        self.current.push(Span::styled(format!("  {line}"), style));
                        self.flush();
                    }
                } else {
                    self.push_text(&text);
                }
            }
            Event::Code(code) => {
                let style = self.style().fg(Color::Yellow);
                self.current.push(Span::styled(code.to_string(), style));
            }
            Event::Html(raw) => self.push_text(raw.trim_end_matches('\n')),
            Event::SoftBreak => self.push_text(" "),
            Event::HardBreak => self.flush(),
            Event::Rule => {
                self.flush();
                self.lines.push(Line::from(Span::styled(
                    "─".repeat(40),
                    Style::default().fg(Color::DarkGray),
                )));
                self.blank();
            }
            Event::FootnoteReference(name) => self.push_text(&format!("[{name}]")),
            Event::TaskListMarker(checked) => {
                self.push_text(if checked { "[x] " } else { "[ ] " })
            }
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => self.flush(),
            Tag::Heading(level, _, _) => {
                self.blank();
                let style = match level {
                    HeadingLevel::H1 => Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
                    HeadingLevel::H2 => Style::default()
                        .fg(Color::Cyan)
                        .add_modifier(Modifier::BOLD),
                    _ => Style::default().add_modifier(Modifier::BOLD),
                };
                self.styles.push(style);
            }
            Tag::BlockQuote => {
                self.flush();
                self.quote_depth += 1;
                self.styles
                    .push(Style::default().add_modifier(Modifier::ITALIC));
            }
            Tag::CodeBlock(kind) => {
                self.blank();
                if let CodeBlockKind::Fenced(lang) = kind {
                    if !lang.is_empty() {
                        self.lines.push(Line::from(Span::styled(
                            format!("  [{lang}]"),
                            Style::default().fg(Color::DarkGray),
                        )));
                    }
                }
                self.in_code_block = true;
            }
            Tag::List(start) => {
                if self.lists.is_empty() {
                    self.blank();
                } else {
                    self.flush();
                }
                self.lists.push(start);
            }
            Tag::Item => {
                self.flush();
                let depth = self.lists.len().saturating_sub(1);
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{n}. ");
                        *n += 1;
                        marker
                    }
                    _ => "• ".to_string(),
                };
                self.current.push(Span::styled(
                    format!("{}{}", "  ".repeat(depth), marker),
                    Style::default().fg(Color::Yellow),
                ));
            }
            Tag::FootnoteDefinition(name) => {
                self.flush();
                self.push_text(&format!("[{name}]: "));
            }
            Tag::Table(_) | Tag::TableHead | Tag::TableRow => self.flush(),
            Tag::TableCell => {
                if !self.current.is_empty() {
                    self.push_text(" | ");
                }
            }
            Tag::Emphasis => self
                .styles
                .push(Style::default().add_modifier(Modifier::ITALIC)),
            Tag::Strong => self
                .styles
                .push(Style::default().add_modifier(Modifier::BOLD)),
            Tag::Strikethrough => self
                .styles
                .push(Style::default().add_modifier(Modifier::CROSSED_OUT)),
            Tag::Link(_, url, _) => {
                self.styles.push(
                    Style::default()
                        .fg(Color::Blue)
                        .add_modifier(Modifier::UNDERLINED),
                );
                self.link_urls.push(url.to_string());
            }
            Tag::Image(_, url, _) => {
                self.push_text("[image: ");
                self.link_urls.push(url.to_string());
            }
        }
    }

    fn end(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::Paragraph => {
                if self.lists.is_empty() {
                    self.blank();
                } else {
                    self.flush();
                }
            }
            Tag::Heading(..) => {
                self.styles.pop();
                self.blank();
            }
            Tag::BlockQuote => {
                self.flush();
                self.styles.pop();
                self.quote_depth = self.quote_depth.saturating_sub(1);
                if self.quote_depth == 0 {
                    self.blank();
                }
            }
            Tag::CodeBlock(_) => {
                self.in_code_block = false;
                self.blank();
            }
            Tag::List(_) => {
                self.flush();
                self.lists.pop();
                if self.lists.is_empty() {
                    self.blank();
                }
            }
            Tag::Item | Tag::TableHead | Tag::TableRow => self.flush(),
            Tag::Table(_) | Tag::FootnoteDefinition(_) => self.blank(),
            Tag::TableCell => {}
            Tag::Emphasis | Tag::Strong | Tag::Strikethrough => {
                self.styles.pop();
            }
            Tag::Link(..) => {
                self.styles.pop();
                if let Some(url) = self.link_urls.pop() {
                    self.current.push(Span::styled(
                        format!(" ({url})"),
                        Style::default().fg(Color::DarkGray),
                    ));
                }
            }
            Tag::Image(..) => {
                if let Some(url) = self.link_urls.pop() {
                    self.push_text(&format!(" {url}]"));
                }
            }
        }
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.flush();
        while self.lines.last().is_some_and(|l| l.spans.is_empty()) {
            self.lines.pop();
        }
        self.lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_text(line: &Line<'_>) -> String {
        line.spans.iter().map(|s| s.content.as_ref()).collect()
    }

    #[test]
    fn bold_renders_strong_element() {
        let html = markdown_to_html("**bold**", HtmlPolicy::Escape);
        assert!(html.to_string().contains("<strong>bold</strong>"));
    }

    #[test]
    fn plain_answer_is_wrapped_in_paragraph() {
        let html = markdown_to_html("42", HtmlPolicy::Escape);
        assert_eq!(html.to_string(), "<p>42</p>\n");
    }

    #[test]
    fn raw_html_is_escaped_by_default() {
        let markdown = "Behold <img src=x onerror=alert(1)>\n\n<script>alert(1)</script>\n";
        let html = markdown_to_html(markdown, HtmlPolicy::Escape).to_string();
        assert!(!html.contains("<script>"));
        assert!(!html.contains("<img"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn script_destinations_are_neutralized_by_default() {
        let markdown = "[click](javascript:alert(1)) ![i](javascript:alert(2)) \
                        [x](JavaScript:alert(3)) [d](data:text/html,boom)";
        let html = markdown_to_html(markdown, HtmlPolicy::Escape).to_string();
        assert!(!html.to_ascii_lowercase().contains("javascript"));
        assert!(!html.contains("data:"));
        assert!(html.contains(r##"<a href="#">click</a>"##));
        assert!(html.contains(r##"<img src="#" alt="i" />"##));
    }

    #[test]
    fn scheme_check_ignores_case_and_embedded_whitespace() {
        assert!(!is_safe_destination("JAVASCRIPT:alert(1)"));
        assert!(!is_safe_destination(" java\tscript:alert(1)"));
        assert!(!is_safe_destination("java\u{0}script:alert(1)"));
        assert!(is_safe_destination("HTTPS://example.com"));
        assert!(is_safe_destination("notes/a:b"));
        assert!(is_safe_destination("?q=a:b"));
    }

    #[test]
    fn ordinary_destinations_are_kept() {
        let markdown = "[w](https://ollama.com) [m](mailto:sage@example.com) [r](docs/oracle.md) [a](#omens)";
        let html = markdown_to_html(markdown, HtmlPolicy::Escape).to_string();
        assert!(html.contains(r#"href="https://ollama.com""#));
        assert!(html.contains(r#"href="mailto:sage@example.com""#));
        assert!(html.contains(r#"href="docs/oracle.md""#));
        assert!(html.contains(r##"href="#omens""##));
    }

    #[test]
    fn trusted_policy_keeps_every_destination() {
        let html = markdown_to_html("[click](javascript:alert(1))", HtmlPolicy::Trusted);
        assert!(html.to_string().contains(r#"href="javascript:alert(1)""#));
    }

    #[test]
    fn raw_html_passes_through_when_trusted() {
        let html = markdown_to_html("<em>fate</em> awaits", HtmlPolicy::Trusted);
        assert!(html.to_string().contains("<em>fate</em>"));
    }

    #[test]
    fn extensions_are_enabled() {
        let html = markdown_to_html("| a | b |\n|---|---|\n| 1 | 2 |\n\n~~no~~", HtmlPolicy::Escape)
            .to_string();
        assert!(html.contains("<table>"));
        assert!(html.contains("<del>no</del>"));
    }

    #[test]
    fn bold_becomes_bold_span() {
        let lines = markdown_to_lines("**bold**");
        assert_eq!(lines.len(), 1);
        let span = lines[0]
            .spans
            .iter()
            .find(|s| s.content == "bold")
            .expect("bold span");
        assert!(span.style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn nested_emphasis_combines_modifiers() {
        let lines = markdown_to_lines("***both***");
        let span = &lines[0].spans[0];
        assert!(span.style.add_modifier.contains(Modifier::BOLD));
        assert!(span.style.add_modifier.contains(Modifier::ITALIC));
    }

    #[test]
    fn lists_get_markers() {
        let lines = markdown_to_lines("- one\n- two\n\n1. first\n2. second\n");
        let text: Vec<String> = lines.iter().map(line_text).collect();
        assert_eq!(
            text,
            vec!["• one", "• two", "", "1. first", "2. second"]
        );
    }

    #[test]
    fn nested_list_is_indented() {
        let lines = markdown_to_lines("- outer\n  - inner\n");
        let text: Vec<String> = lines.iter().map(line_text).collect();
        assert_eq!(text, vec!["• outer", "  • inner"]);
    }

    #[test]
    fn code_block_keeps_lines() {
        let lines = markdown_to_lines("```rust\nlet a = 1;\nlet b = 2;\n```\n");
        let text: Vec<String> = lines.iter().map(line_text).collect();
        assert_eq!(text, vec!["  [rust]", "  let a = 1;", "  let b = 2;"]);
    }

    #[test]
    fn heading_and_paragraph_are_separated() {
        let lines = markdown_to_lines("# Omen\nThe stars align.");
        let text: Vec<String> = lines.iter().map(line_text).collect();
        assert_eq!(text, vec!["Omen", "", "The stars align."]);
        assert!(lines[0].spans[0]
            .style
            .add_modifier
            .contains(Modifier::UNDERLINED));
    }

    #[test]
    fn links_show_target() {
        let lines = markdown_to_lines("[docs](https://ollama.com)");
        assert_eq!(line_text(&lines[0]), "docs (https://ollama.com)");
    }

    #[test]
    fn block_quote_is_prefixed() {
        let lines = markdown_to_lines("> know thyself");
        assert_eq!(line_text(&lines[0]), "│ know thyself");
    }

    #[test]
    fn empty_input_gives_no_lines() {
        assert!(markdown_to_lines("").is_empty());
    }
}
