use pulldown_cmark::{html, Options, Parser};

/// Converts markdown to HTML. Raw HTML blocks, including the `<pre><code>`
/// blocks produced by [`crate::highlight::highlight_code_blocks`], are passed
/// through unchanged.
pub fn to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_FOOTNOTES);
    options.insert(Options::ENABLE_SMART_PUNCTUATION);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_TASKLISTS);

    let mut output = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut output, Parser::new_ext(markdown, options));
    output
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_highlighted_blocks_pass_through() {
        let html = to_html(
            "Intro\n<pre><code class=\"language-rs\"><span class=\"a\">x</span>\n\n\
             <span>y</span></code></pre>\nOutro *em*\n",
        );
        assert!(html.starts_with("<p>Intro</p>\n"));
        assert!(html.contains(
            "<pre><code class=\"language-rs\"><span class=\"a\">x</span>\n\n<span>y</span></code></pre>"
        ));
        assert!(html.contains("<p>Outro <em>em</em></p>"));
    }

    #[test]
    fn test_extensions() {
        let html = to_html("~~gone~~\n\n| a |\n|---|\n| b |\n");
        assert!(html.contains("<del>gone</del>"));
        assert!(html.contains("<table>"));
    }
}
