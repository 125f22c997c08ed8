//! Markdown rendering into remote content blocks.
//!
//! `render_content` is the presentational seam between canonical node text
//! and the remote store: a pure function from markdown to [`RemoteBlocks`],
//! invoked once per create or content update. The supported surface is
//! deliberately small — headings (clamped to levels 1–3), paragraphs, list
//! items, fenced code and bold/italic/inline-code spans. Anything else
//! degrades to its plain text rather than failing: ordered lists render as
//! bullet items, nested lists flatten, soft and hard breaks become spaces.

use crate::remote::{RemoteBlock, RemoteBlocks, RichText};
use pulldown_cmark::{
    CodeBlockKind, Event as MdEvent, HeadingLevel, Options, Parser as MdParser, Tag as MdTag,
    TagEnd as MdTagEnd,
};

/// Accumulates inline spans, merging runs of text that share annotations.
#[derive(Debug, Default)]
struct RichAccumulator {
    spans: Vec<RichText>,
    buf: String,
    bold: bool,
    italic: bool,
}

impl RichAccumulator {
    fn flush(&mut self) {
        if !self.buf.is_empty() {
            self.spans.push(RichText {
                content: std::mem::take(&mut self.buf),
                bold: self.bold,
                italic: self.italic,
                code: false,
            });
        }
    }

    fn push_text(&mut self, text: &str) {
        self.buf.push_str(text);
    }

    fn push_code(&mut self, text: &str) {
        self.flush();
        self.spans.push(RichText {
            content: text.to_string(),
            bold: false,
            italic: false,
            code: true,
        });
    }

    fn set_bold(&mut self, bold: bool) {
        self.flush();
        self.bold = bold;
    }

    fn set_italic(&mut self, italic: bool) {
        self.flush();
        self.italic = italic;
    }

    fn is_empty(&self) -> bool {
        self.spans.is_empty() && self.buf.is_empty()
    }

    fn take(&mut self) -> Vec<RichText> {
        self.flush();
        std::mem::take(&mut self.spans)
    }
}

fn heading_level(level: HeadingLevel) -> u8 {
    let raw = match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    };
    raw.min(3)
}

fn code_language(kind: &CodeBlockKind<'_>) -> String {
    match kind {
        CodeBlockKind::Fenced(info) => {
            let lang = info.split_whitespace().next().unwrap_or("");
            if lang.is_empty() {
                "plain text".to_string()
            } else {
                lang.to_string()
            }
        }
        CodeBlockKind::Indented => "plain text".to_string(),
    }
}

/// Convert markdown into remote content blocks. Pure, no side effects.
pub fn render_content(markdown: &str) -> RemoteBlocks {
    let parser = MdParser::new_ext(markdown, Options::empty());
    let mut blocks: RemoteBlocks = Vec::new();
    let mut rich = RichAccumulator::default();
    let mut heading: Option<u8> = None;
    let mut item_depth: usize = 0;
    let mut code: Option<(String, String)> = None;

    for event in parser {
        match event {
            MdEvent::Start(MdTag::Heading { level, .. }) => {
                heading = Some(heading_level(level));
            }
            MdEvent::End(MdTagEnd::Heading(_)) => {
                blocks.push(RemoteBlock::Heading {
                    level: heading.take().unwrap_or(1),
                    rich_text: rich.take(),
                });
            }
            MdEvent::Start(MdTag::Paragraph) => {
                // A later paragraph inside one list item joins the item text.
                if item_depth > 0 && !rich.is_empty() {
                    rich.push_text(" ");
                }
            }
            MdEvent::End(MdTagEnd::Paragraph) => {
                if item_depth == 0 {
                    let rich_text = rich.take();
                    if !rich_text.is_empty() {
                        blocks.push(RemoteBlock::Paragraph { rich_text });
                    }
                }
            }
            MdEvent::Start(MdTag::Item) => {
                // A nested item starting flushes the enclosing item's text so
                // nesting flattens instead of concatenating.
                if item_depth > 0 && !rich.is_empty() {
                    blocks.push(RemoteBlock::BulletItem {
                        rich_text: rich.take(),
                    });
                }
                item_depth += 1;
            }
            MdEvent::End(MdTagEnd::Item) => {
                if !rich.is_empty() {
                    blocks.push(RemoteBlock::BulletItem {
                        rich_text: rich.take(),
                    });
                }
                item_depth = item_depth.saturating_sub(1);
            }
            MdEvent::Start(MdTag::CodeBlock(kind)) => {
                code = Some((code_language(&kind), String::new()));
            }
            MdEvent::End(MdTagEnd::CodeBlock) => {
                if let Some((language, text)) = code.take() {
                    blocks.push(RemoteBlock::Code {
                        language,
                        text: text.trim_end_matches('\n').to_string(),
                    });
                }
            }
            MdEvent::Start(MdTag::Strong) => rich.set_bold(true),
            MdEvent::End(MdTagEnd::Strong) => rich.set_bold(false),
            MdEvent::Start(MdTag::Emphasis) => rich.set_italic(true),
            MdEvent::End(MdTagEnd::Emphasis) => rich.set_italic(false),
            MdEvent::Text(text) => match code.as_mut() {
                Some((_language, buf)) => buf.push_str(&text),
                None => rich.push_text(&text),
            },
            MdEvent::Code(text) => rich.push_code(&text),
            MdEvent::SoftBreak | MdEvent::HardBreak => rich.push_text(" "),
            MdEvent::InlineHtml(html) => rich.push_text(&html),
            _ => {}
        }
    }

    tracing::debug!("rendered markdown into {} blocks", blocks.len());
    blocks
}
