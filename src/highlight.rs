//! Rewrites fenced code blocks in a markdown document into highlighted
//! `<pre><code>` HTML fragments. The rewrite runs before the markdown
//! renderer sees the document, so the renderer only ever sees the finished
//! HTML blocks (which it passes through untouched).
//!
//! A fence is three backticks at the start of a line. The rest of the opening
//! fence's line is the language tag; everything up to the next line-initial
//! fence (or the end of the document) is the code. Nested or escaped fences
//! are not supported.

use log::warn;
use pulldown_cmark::escape::escape_html;
use std::fmt;
use syntect::html::{ClassStyle, ClassedHTMLGenerator};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

const FENCE: &str = "```";

/// A language-aware colorizer for a single code sample.
pub trait Highlight {
    /// Returns `code` rendered as highlighted HTML markup for the language
    /// named by `tag`.
    fn highlight(&self, code: &str, tag: &str) -> Result<String>;
}

/// A [`Highlight`] implementation backed by syntect's bundled syntax
/// definitions. The markup uses CSS classes rather than inline styles; see
/// [`crate::build`] for how the matching stylesheet is produced.
pub struct SyntectHighlighter {
    syntax_set: SyntaxSet,
}

impl SyntectHighlighter {
    pub fn new() -> SyntectHighlighter {
        SyntectHighlighter {
            syntax_set: SyntaxSet::load_defaults_newlines(),
        }
    }
}

impl Default for SyntectHighlighter {
    fn default() -> Self {
        SyntectHighlighter::new()
    }
}

impl Highlight for SyntectHighlighter {
    fn highlight(&self, code: &str, tag: &str) -> Result<String> {
        let syntax = self
            .syntax_set
            .find_syntax_by_token(tag)
            .ok_or_else(|| Error::UnknownLanguage(tag.to_owned()))?;
        let mut generator = ClassedHTMLGenerator::new_with_class_style(
            syntax,
            &self.syntax_set,
            ClassStyle::Spaced,
        );
        for line in LinesWithEndings::from(code) {
            generator.parse_html_for_line_which_includes_newline(line)?;
        }
        Ok(generator.finalize())
    }
}

/// A contiguous span of a document.
#[derive(Debug, PartialEq)]
pub enum Segment<'a> {
    /// Text outside of any fenced block, reproduced verbatim.
    Prose(&'a str),

    /// The interior of a fenced block.
    Code(CodeBlock<'a>),
}

/// A fenced block with its fences removed.
#[derive(Debug, PartialEq)]
pub struct CodeBlock<'a> {
    /// The trimmed remainder of the opening fence's line, or `None` if it was
    /// blank.
    pub tag: Option<&'a str>,

    /// The trimmed text between the opening fence's line and the closing
    /// fence.
    pub code: &'a str,
}

#[derive(Clone, Copy)]
enum State {
    InProse { start: usize },
    InCode { open: usize, code_start: usize },
}

/// Splits `markdown` into prose and code segments, in document order. Empty
/// prose spans are omitted.
///
/// A fence that is never closed opens a block running to the end of the
/// document. An opening fence with no line break after it is all tag line: the
/// block's code is empty.
pub fn segments(markdown: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut state = State::InProse { start: 0 };
    let mut cursor = 0;

    let tail = loop {
        state = match state {
            State::InProse { start } => {
                let open = match find_fence(markdown, cursor) {
                    Some(open) => open,
                    None => break start,
                };
                if open > start {
                    segments.push(Segment::Prose(&markdown[start..open]));
                }
                let tag_start = open + FENCE.len();
                cursor = match markdown[tag_start..].find('\n') {
                    Some(offset) => tag_start + offset + 1,
                    None => markdown.len(),
                };
                State::InCode {
                    open,
                    code_start: cursor,
                }
            }
            State::InCode { open, code_start } => {
                let tag = markdown[open + FENCE.len()..code_start].trim();
                let tag = if tag.is_empty() { None } else { Some(tag) };
                let close = match find_fence(markdown, code_start) {
                    Some(close) => close,
                    None => {
                        segments.push(Segment::Code(CodeBlock {
                            tag,
                            code: markdown[code_start..].trim(),
                        }));
                        break markdown.len();
                    }
                };
                segments.push(Segment::Code(CodeBlock {
                    tag,
                    code: markdown[code_start..close].trim(),
                }));

                cursor = close + FENCE.len();
                let rest = &markdown[cursor..];
                if rest.starts_with("\r\n") {
                    cursor += 2;
                } else if rest.starts_with('\n') {
                    cursor += 1;
                }
                State::InProse { start: cursor }
            }
        };
    };

    if tail < markdown.len() {
        segments.push(Segment::Prose(&markdown[tail..]));
    }
    segments
}

/// Returns the index of the first line-initial fence at or after `from`.
fn find_fence(text: &str, from: usize) -> Option<usize> {
    let mut start = from;
    while let Some(offset) = text[start..].find(FENCE) {
        let i = start + offset;
        if i == 0 || text.as_bytes()[i - 1] == b'\n' {
            return Some(i);
        }
        start = i + 1;
    }
    None
}

/// Replaces every fenced code block in `markdown` with a
/// `<pre><code class="language-{tag}">` fragment. Tagged blocks are passed
/// through `highlighter`; untagged blocks are embedded as-is. If the
/// highlighter fails for a block (e.g., it doesn't know the language), the
/// block falls back to its unhighlighted code.
///
/// Returns `None` if the document has no fences, in which case the caller
/// should use `markdown` unchanged.
pub fn highlight_code_blocks(
    markdown: &str,
    highlighter: &dyn Highlight,
) -> Option<String> {
    rewrite(markdown, highlighter, "")
}

/// Like [`highlight_code_blocks`], but ends every fragment with a line break
/// so that the text after a closing fence starts a new line. A markdown HTML
/// block runs through the whole line holding `</pre>`, so without the break
/// that text would be passed through raw instead of rendered.
pub fn highlight_code_blocks_for_markdown(
    markdown: &str,
    highlighter: &dyn Highlight,
) -> Option<String> {
    rewrite(markdown, highlighter, "\n")
}

fn rewrite(markdown: &str, highlighter: &dyn Highlight, after_block: &str) -> Option<String> {
    let segments = segments(markdown);
    if !segments.iter().any(|s| matches!(s, Segment::Code(_))) {
        return None;
    }

    let mut output = String::with_capacity(markdown.len() * 2);
    for segment in segments {
        match segment {
            Segment::Prose(prose) => output.push_str(prose),
            Segment::Code(block) => {
                render_block(&mut output, &block, highlighter);
                output.push_str(after_block);
            }
        }
    }
    Some(output)
}

fn render_block(output: &mut String, block: &CodeBlock, highlighter: &dyn Highlight) {
    match block.tag {
        Some(tag) => {
            output.push_str(r#"<pre><code class="language-"#);
            // writing into a `String` can't fail
            let _ = escape_html(&mut *output, tag);
            output.push_str(r#"">"#);
            match highlighter.highlight(block.code, tag) {
                Ok(markup) => output.push_str(&markup),
                Err(e) => {
                    warn!("Not highlighting `{}` code block: {}", tag, e);
                    output.push_str(block.code);
                }
            }
        }
        None => {
            output.push_str("<pre><code>");
            output.push_str(block.code);
        }
    }
    output.push_str("</code></pre>");
}

/// The result of a fallible highlighting operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a failure to highlight a single code block.
#[derive(Debug)]
pub enum Error {
    /// Returned when no syntax definition matches the language tag.
    UnknownLanguage(String),

    /// Returned when syntect fails while tokenizing the code.
    Syntect(syntect::Error),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::UnknownLanguage(tag) => write!(f, "unknown language `{}`", tag),
            Error::Syntect(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::UnknownLanguage(_) => None,
            Error::Syntect(err) => Some(err),
        }
    }
}

impl From<syntect::Error> for Error {
    /// Converts a [`syntect::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator while generating highlighted markup.
    fn from(err: syntect::Error) -> Error {
        Error::Syntect(err)
    }
}
