use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};

/// A renderable chunk of an assistant reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Block {
    /// Pango markup, safe to pass to `gtk::Label::set_markup`.
    Markup(String),
    Code {
        language: Option<String>,
        code: String,
    },
}

pub fn render(input: &str) -> Vec<Block> {
    let options = Options::ENABLE_STRIKETHROUGH | Options::ENABLE_TABLES;
    let mut renderer = Renderer::default();
    for event in Parser::new_ext(input, options) {
        renderer.event(event);
    }
    renderer.finish()
}

#[derive(Default)]
struct Renderer {
    blocks: Vec<Block>,
    markup: String,
    code: Option<(Option<String>, String)>,
    // One entry per open list: next ordinal, or None for bullets.
    lists: Vec<Option<u64>>,
    quote_depth: usize,
}

impl Renderer {
    fn event(&mut self, event: Event) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => match self.code.as_mut() {
                Some((_, code)) => code.push_str(&text),
                None => self.push_text(&text),
            },
            Event::Code(code) => {
                self.markup.push_str("<tt>");
                self.markup.push_str(&glib::markup_escape_text(&code));
                self.markup.push_str("</tt>");
            }
            Event::SoftBreak | Event::HardBreak => self.newline(),
            Event::Rule => {
                self.gap();
                self.markup.push_str("――――――――");
            }
            Event::Html(html) | Event::InlineHtml(html) => self.push_html(&html),
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag) {
        match tag {
            Tag::Paragraph => {
                if self.lists.is_empty() {
                    self.gap();
                }
                self.quote_prefix();
            }
            Tag::Heading { level, .. } => {
                self.gap();
                let size = match level {
                    HeadingLevel::H1 => "x-large",
                    HeadingLevel::H2 => "large",
                    _ => "medium",
                };
                self.markup
                    .push_str(&format!("<span weight=\"bold\" size=\"{}\">", size));
            }
            Tag::Strong => self.markup.push_str("<b>"),
            Tag::Emphasis => self.markup.push_str("<i>"),
            Tag::Strikethrough => self.markup.push_str("<s>"),
            Tag::Link { dest_url, .. } => {
                self.markup.push_str("<a href=\"");
                self.markup.push_str(&glib::markup_escape_text(&dest_url));
                self.markup.push_str("\">");
            }
            Tag::CodeBlock(kind) => {
                self.flush();
                let language = match kind {
                    CodeBlockKind::Fenced(lang) if !lang.trim().is_empty() => {
                        Some(lang.trim().to_string())
                    }
                    _ => None,
                };
                self.code = Some((language, String::new()));
            }
            Tag::BlockQuote(_) => {
                self.gap();
                self.quote_depth += 1;
            }
            Tag::List(start) => {
                if self.lists.is_empty() {
                    self.gap();
                }
                self.lists.push(start);
            }
            Tag::Item => {
                self.newline();
                let depth = self.lists.len().saturating_sub(1);
                self.markup.push_str(&"    ".repeat(depth));
                let marker = match self.lists.last_mut() {
                    Some(Some(n)) => {
                        let marker = format!("{}. ", n);
                        *n += 1;
                        marker
                    }
                    _ => "• ".to_string(),
                };
                self.markup.push_str(&marker);
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Heading(_) => self.markup.push_str("</span>"),
            TagEnd::Strong => self.markup.push_str("</b>"),
            TagEnd::Emphasis => self.markup.push_str("</i>"),
            TagEnd::Strikethrough => self.markup.push_str("</s>"),
            TagEnd::Link => self.markup.push_str("</a>"),
            TagEnd::CodeBlock => {
                if let Some((language, code)) = self.code.take() {
                    self.blocks.push(Block::Code {
                        language,
                        code: code.trim_end_matches('\n').to_string(),
                    });
                }
            }
            TagEnd::BlockQuote(_) => self.quote_depth = self.quote_depth.saturating_sub(1),
            TagEnd::List(_) => {
                self.lists.pop();
            }
            TagEnd::TableRow | TagEnd::TableHead => self.newline(),
            TagEnd::TableCell => self.markup.push_str("  "),
            _ => {}
        }
    }

    fn push_text(&mut self, text: &str) {
        self.markup.push_str(&glib::markup_escape_text(text));
    }

    // Replies may carry the odd HTML fragment; keep line breaks, drop tags.
    fn push_html(&mut self, html: &str) {
        let mut text = String::new();
        let mut in_tag = false;
        let mut tag = String::new();
        for c in html.chars() {
            match c {
                '<' => {
                    in_tag = true;
                    tag.clear();
                }
                '>' if in_tag => {
                    in_tag = false;
                    let name = tag
                        .trim_start_matches('/')
                        .split(|c: char| c.is_whitespace() || c == '/')
                        .next()
                        .unwrap_or("")
                        .to_ascii_lowercase();
                    if matches!(name.as_str(), "br" | "p" | "div" | "li" | "tr") {
                        text.push('\n');
                    }
                }
                _ if in_tag => tag.push(c),
                _ => text.push(c),
            }
        }
        if text.contains('\n') && !self.markup.is_empty() && !self.markup.ends_with('\n') {
            self.markup.push('\n');
        }
        self.push_text(text.trim_matches('\n'));
    }

    fn newline(&mut self) {
        if !self.markup.is_empty() && !self.markup.ends_with('\n') {
            self.markup.push('\n');
        }
    }

    fn gap(&mut self) {
        if self.markup.is_empty() || self.markup.ends_with("\n\n") {
            return;
        }
        self.newline();
        self.markup.push('\n');
    }

    fn quote_prefix(&mut self) {
        if self.quote_depth > 0 {
            self.markup.push_str(&"│ ".repeat(self.quote_depth));
        }
    }

    fn flush(&mut self) {
        let markup = self.markup.trim_end().to_string();
        self.markup.clear();
        if !markup.trim().is_empty() {
            self.blocks.push(Block::Markup(markup));
        }
    }

    fn finish(mut self) -> Vec<Block> {
        self.flush();
        self.blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_markup(input: &str) -> String {
        match render(input).as_slice() {
            [Block::Markup(m)] => m.clone(),
            other => panic!("expected one markup block, got {other:?}"),
        }
    }

    #[test]
    fn plain_text_is_escaped() {
        assert_eq!(single_markup("Tom & Jerry <3"), "Tom &amp; Jerry &lt;3");
    }

    #[test]
    fn inline_styles_map_to_pango_tags() {
        assert_eq!(
            single_markup("**bold** *it* `x < y`"),
            "<b>bold</b> <i>it</i> <tt>x &lt; y</tt>"
        );
    }

    #[test]
    fn paragraphs_are_separated_by_blank_line() {
        assert_eq!(single_markup("one\n\ntwo"), "one\n\ntwo");
    }

    #[test]
    fn soft_breaks_keep_lines() {
        assert_eq!(single_markup("line one\nline two"), "line one\nline two");
    }

    #[test]
    fn lists_get_markers() {
        assert_eq!(single_markup("- a\n- b"), "• a\n• b");
        assert_eq!(single_markup("3. x\n4. y"), "3. x\n4. y");
    }

    #[test]
    fn code_blocks_split_the_reply() {
        let blocks = render("Result:\n\n```sql\nSELECT 1;\n```\n\nDone.");
        assert_eq!(
            blocks,
            vec![
                Block::Markup("Result:".to_string()),
                Block::Code {
                    language: Some("sql".to_string()),
                    code: "SELECT 1;".to_string(),
                },
                Block::Markup("Done.".to_string()),
            ]
        );
    }

    #[test]
    fn html_line_breaks_survive() {
        assert_eq!(single_markup("first<br>second"), "first\nsecond");
    }

    #[test]
    fn headings_are_bold_spans() {
        assert_eq!(
            single_markup("# Title"),
            "<span weight=\"bold\" size=\"x-large\">Title</span>"
        );
    }
}
