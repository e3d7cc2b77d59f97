//! Defines the [`Parser`] and [`Error`] types: the logic for reading posts
//! from the contents directory into memory. Each post body goes through the
//! code-block highlighter ([`crate::highlight`]) and then the markdown
//! renderer ([`crate::markdown`]).

use std::{
    collections::BTreeMap,
    fmt,
    fs::{read_dir, File},
    path::{Path, PathBuf},
};

use chrono::NaiveDate;
use log::debug;
use serde::Deserialize;
use url::Url;

use crate::{
    highlight::{highlight_code_blocks_for_markdown, Highlight},
    markdown,
    post::Post,
};

const MARKDOWN_EXTENSION: &str = "md";
const BUNDLE_INDEX: &str = "index.md";

/// Parses [`Post`] objects from source files.
pub struct Parser<'a> {
    /// The public root of the site, if configured. Post URLs are joined onto
    /// it; otherwise they are root-relative.
    site_url: Option<&'a Url>,

    /// The path segment under which posts are rendered (e.g., `post` puts
    /// posts at `/post/{slug}/`).
    content_slug: &'a str,

    /// The directory in which post pages will be rendered, i.e.
    /// `{output_directory}/{content_slug}`.
    posts_directory: &'a Path,

    /// Colorizes tagged code blocks in post bodies.
    highlighter: &'a dyn Highlight,
}

impl<'a> Parser<'a> {
    /// Constructs a new parser. See fields on [`Parser`] for argument
    /// descriptions.
    pub fn new(
        site_url: Option<&'a Url>,
        content_slug: &'a str,
        posts_directory: &'a Path,
        highlighter: &'a dyn Highlight,
    ) -> Parser<'a> {
        Parser {
            site_url,
            content_slug,
            posts_directory,
            highlighter,
        }
    }

    fn parse_post_bundle(
        &self,
        bundle_directory: &Path,
        slug: &str,
        static_files: &mut Vec<StaticFile>,
    ) -> Result<Post> {
        // We want to make sure we can parse a post before we mutate
        // `static_files`
        let post = self.parse_post(&bundle_directory.join(BUNDLE_INDEX), slug)?;

        use walkdir::WalkDir;
        for result in WalkDir::new(bundle_directory) {
            let entry = result?;
            let relative = entry
                .path()
                .strip_prefix(bundle_directory)
                // `bundle_directory` is always an ancestor of the entry
                .map_err(|_| InvalidFileNameError(entry.path().to_owned()))?;
            if entry.file_type().is_file() && relative != Path::new(BUNDLE_INDEX) {
                static_files.push((
                    entry.path().to_owned(),
                    self.posts_directory.join(slug).join(relative),
                ));
            }
        }

        Ok(post)
    }

    /// Parses a single [`Post`] from the markdown file at `path`, annotating
    /// any error with the path.
    fn parse_post(&self, path: &Path, slug: &str) -> Result<Post> {
        match self._parse_post(path, slug) {
            Ok(p) => Ok(p),
            Err(e) => Err(Error::Annotated(
                format!("parsing post `{}`", path.display()),
                Box::new(e),
            )),
        }
    }

    fn _parse_post(&self, path: &Path, slug: &str) -> Result<Post> {
        debug!("Parsing post `{}`", path.display());
        use std::io::Read;
        let mut contents = String::new();
        File::open(path)?.read_to_string(&mut contents)?;
        self.parse_str(&contents, slug)
    }

    /// Parses a post from its source text. `slug` identifies the post in the
    /// output tree.
    pub fn parse_str(&self, input: &str, slug: &str) -> Result<Post> {
        let (yaml, body) = split_frontmatter(input)?;
        let frontmatter: Frontmatter = serde_yaml::from_str(yaml)?;

        let highlighted = highlight_code_blocks_for_markdown(body, self.highlighter);
        let body = markdown::to_html(highlighted.as_deref().unwrap_or(body));

        Ok(Post {
            slug: slug.to_owned(),
            title: frontmatter.title,
            created_at: frontmatter.created_at,
            display_date: None,
            url: self.post_url(slug)?,
            file_path: self.posts_directory.join(slug).join("index.html"),
            body,
            attributes: frontmatter.attributes,
        })
    }

    fn post_url(&self, slug: &str) -> Result<String> {
        let path = format!("{}/{}/", self.content_slug, slug);
        Ok(match self.site_url {
            // NOTE: the site URL needs a trailing slash, otherwise
            // [`Url::join`] treats its last path component as a file name and
            // replaces it.
            Some(site_url) => site_url.join(&path)?.to_string(),
            None => format!("/{}", path),
        })
    }

    /// Searches a provided `source_directory` for posts and returns them
    /// sorted by date (most recent first) along with the static files of any
    /// post bundles. A post is either a bundle directory containing an
    /// `index.md` (the slug is the directory name) or a `.md` file (the slug
    /// is the file stem). Each post source must be structured as follows:
    ///
    /// 1. Initial frontmatter fence (`---`)
    /// 2. YAML frontmatter with a `title`, optionally `created_at`, and any
    ///    other fields the templates use
    /// 3. Terminal frontmatter fence (`---`)
    /// 4. Post body
    ///
    /// For example:
    ///
    /// ```md
    /// ---
    /// title: Hello, world!
    /// created_at: 2021-04-16
    /// ---
    /// # Hello
    ///
    /// World
    /// ```
    pub fn parse_posts(&self, source_directory: &Path) -> Result<Posts> {
        let mut posts = Vec::new();
        let mut static_files = Vec::new();
        for result in read_dir(source_directory)? {
            let entry = result?;
            let path = entry.path();
            if Self::is_bundle(&entry)? {
                let slug = file_name(&path)?;
                posts.push(self.parse_post_bundle(&path, &slug, &mut static_files)?);
            } else if path.extension().map_or(false, |ext| ext == MARKDOWN_EXTENSION) {
                let slug = path
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .ok_or_else(|| InvalidFileNameError(path.clone()))?
                    .to_owned();
                posts.push(self.parse_post(&path, &slug)?);
            } else {
                debug!("Skipping `{}`: not a post", path.display());
            }
        }

        posts.sort_by(crate::post::by_date_descending);
        Ok((posts, static_files))
    }

    fn is_bundle(entry: &std::fs::DirEntry) -> std::io::Result<bool> {
        Ok(entry.file_type()?.is_dir() && entry.path().join(BUNDLE_INDEX).is_file())
    }
}

fn file_name(path: &Path) -> Result<String> {
    Ok(path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| InvalidFileNameError(path.to_owned()))?
        .to_owned())
}

/// Splits a post source into its YAML frontmatter and its body. The
/// frontmatter starts after a leading `---` and runs until the next line
/// beginning with `---`; the body starts on the line after that.
pub fn split_frontmatter(input: &str) -> Result<(&str, &str)> {
    const FENCE: &str = "---";
    if !input.starts_with(FENCE) {
        return Err(Error::FrontmatterMissingStartFence);
    }
    let yaml_start = FENCE.len();
    let yaml_stop = match input[yaml_start..].find("\n---") {
        None => return Err(Error::FrontmatterMissingEndFence),
        Some(offset) => yaml_start + offset + 1,
    };
    let after_fence = yaml_stop + FENCE.len();
    let body_start = match input[after_fence..].find('\n') {
        Some(offset) => after_fence + offset + 1,
        None => input.len(),
    };
    Ok((&input[yaml_start..yaml_stop], &input[body_start..]))
}

#[derive(Deserialize)]
struct Frontmatter {
    /// The title of the post.
    title: String,

    /// The date of the post.
    #[serde(default)]
    created_at: Option<NaiveDate>,

    /// Any other fields, passed through to templates.
    #[serde(flatten)]
    attributes: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Debug)]
pub struct InvalidFileNameError(PathBuf);

impl fmt::Display for InvalidFileNameError {
    /// Displays an [`InvalidFileNameError`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "invalid file name: {:?}", &self.0)
    }
}

impl std::error::Error for InvalidFileNameError {
    /// Implements the [`std::error::Error`] trait for [`InvalidFileNameError`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

pub type Posts = (Vec<Post>, Vec<StaticFile>);

/// A `(source, destination)` pair for a file to be copied verbatim.
pub type StaticFile = (PathBuf, PathBuf);

/// Represents the result of a [`Post`]-parse operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error parsing a [`Post`] object.
#[derive(Debug)]
pub enum Error {
    /// Returned when a post source file is missing its starting frontmatter
    /// fence (`---`).
    FrontmatterMissingStartFence,

    /// Returned when a post source file is missing its terminal frontmatter
    /// fence (`---` i.e., the starting fence was found but the ending one was
    /// missing).
    FrontmatterMissingEndFence,

    /// Returned when there was an error parsing the frontmatter as YAML.
    DeserializeYaml(serde_yaml::Error),

    /// Returned when there is a problem building a post URL.
    UrlParse(url::ParseError),

    /// Returned for other I/O errors.
    Io(std::io::Error),

    /// Returned for WalkDir I/O errors.
    WalkDir(walkdir::Error),

    /// Returned when a source file name isn't valid UTF-8.
    InvalidFileName(InvalidFileNameError),

    /// An error with an annotation.
    Annotated(String, Box<Error>),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::FrontmatterMissingStartFence => {
                write!(f, "Post must begin with `---`")
            }
            Error::FrontmatterMissingEndFence => {
                write!(f, "Missing closing `---`")
            }
            Error::DeserializeYaml(err) => err.fmt(f),
            Error::UrlParse(err) => err.fmt(f),
            Error::Io(err) => err.fmt(f),
            Error::WalkDir(err) => err.fmt(f),
            Error::InvalidFileName(err) => err.fmt(f),
            Error::Annotated(annotation, err) => {
                write!(f, "{}: {}", &annotation, err)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::FrontmatterMissingStartFence => None,
            Error::FrontmatterMissingEndFence => None,
            Error::DeserializeYaml(err) => Some(err),
            Error::UrlParse(err) => Some(err),
            Error::Io(err) => Some(err),
            Error::WalkDir(err) => Some(err),
            Error::InvalidFileName(err) => Some(err),
            Error::Annotated(_, err) => Some(err),
        }
    }
}

impl From<InvalidFileNameError> for Error {
    fn from(err: InvalidFileNameError) -> Error {
        Error::InvalidFileName(err)
    }
}

impl From<url::ParseError> for Error {
    /// Converts a [`url::ParseError`] into an [`Error`]. It allows us to use
    /// the `?` operator for URL parsing and joining functions.
    fn from(err: url::ParseError) -> Error {
        Error::UrlParse(err)
    }
}

impl From<serde_yaml::Error> for Error {
    /// Converts a [`serde_yaml::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator for [`serde_yaml`] deserialization functions.
    fn from(err: serde_yaml::Error) -> Error {
        Error::DeserializeYaml(err)
    }
}

impl From<walkdir::Error> for Error {
    /// Converts a [`walkdir::Error`] into an [`Error`]. It allows us to
    /// use the `?` operator for fallible directory walks.
    fn from(err: walkdir::Error) -> Error {
        Error::WalkDir(err)
    }
}

impl From<std::io::Error> for Error {
    /// Converts a [`std::io::Error`] into an [`Error`]. It allows us to
    /// use the `?` operator for fallible I/O functions.
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::highlight::{self, SyntectHighlighter};
    use std::fs;

    struct Upper;

    impl Highlight for Upper {
        fn highlight(&self, code: &str, _tag: &str) -> highlight::Result<String> {
            Ok(code.to_uppercase())
        }
    }

    #[test]
    fn test_split_frontmatter() -> Result<()> {
        let (yaml, body) = split_frontmatter("---\ntitle: a---b\n---\n# Body\n")?;
        assert_eq!("\ntitle: a---b\n", yaml);
        assert_eq!("# Body\n", body);

        let (yaml, body) = split_frontmatter("---\ntitle: x\n---")?;
        assert_eq!("\ntitle: x\n", yaml);
        assert_eq!("", body);

        assert!(matches!(
            split_frontmatter("title: x\n"),
            Err(Error::FrontmatterMissingStartFence)
        ));
        assert!(matches!(
            split_frontmatter("---\ntitle: x\n"),
            Err(Error::FrontmatterMissingEndFence)
        ));
        Ok(())
    }

    #[test]
    fn test_parse_str() -> Result<()> {
        let posts_directory = Path::new("dist/post");
        let parser = Parser::new(None, "post", posts_directory, &Upper);
        let post = parser.parse_str(
            "---\ntitle: Hello\ncreated_at: 2023-02-01\ncover: c.png\n---\n\
             Some *text*\n```js\nlet x;\n```\nAfter\n",
            "hello",
        )?;
        assert_eq!("Hello", post.title);
        assert_eq!(NaiveDate::from_ymd_opt(2023, 2, 1), post.created_at);
        assert_eq!("/post/hello/", post.url);
        assert_eq!(PathBuf::from("dist/post/hello/index.html"), post.file_path);
        assert_eq!(
            Some(&serde_yaml::Value::from("c.png")),
            post.attributes.get("cover")
        );
        assert_eq!(
            "<p>Some <em>text</em></p>\n\
             <pre><code class=\"language-js\">LET X;</code></pre>\n\
             <p>After</p>\n",
            post.body
        );
        Ok(())
    }

    #[test]
    fn test_markdown_after_code_block() -> Result<()> {
        let parser = Parser::new(None, "post", Path::new("out"), &Upper);
        let post = parser.parse_str(
            "---\ntitle: T\n---\n```\nx\n```\n# Heading\n\nPara *em*\n",
            "t",
        )?;
        assert_eq!(
            "<pre><code>x</code></pre>\n<h1>Heading</h1>\n<p>Para <em>em</em></p>\n",
            post.body
        );
        Ok(())
    }

    #[test]
    fn test_absolute_post_url() -> Result<()> {
        let site_url = Url::parse("https://example.org/blog/")?;
        let parser = Parser::new(Some(&site_url), "notes", Path::new("out"), &Upper);
        let post = parser.parse_str("---\ntitle: T\n---\nbody", "first")?;
        assert_eq!("https://example.org/blog/notes/first/", post.url);
        assert_eq!(None, post.created_at);
        Ok(())
    }

    #[test]
    fn test_missing_title() {
        let parser = Parser::new(None, "post", Path::new("out"), &Upper);
        assert!(matches!(
            parser.parse_str("---\ncreated_at: 2020-01-01\n---\n", "x"),
            Err(Error::DeserializeYaml(_))
        ));
    }

    #[test]
    fn test_parse_posts() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let contents = dir.path().join("contents");
        fs::create_dir_all(contents.join("bundle").join("img"))?;
        fs::write(
            contents.join("bundle").join("index.md"),
            "---\ntitle: Bundle\ncreated_at: 2022-01-01\n---\n```rust\nfn main() {}\n```\n",
        )?;
        fs::write(contents.join("bundle").join("img").join("a.png"), "png")?;
        fs::write(
            contents.join("single.md"),
            "---\ntitle: Single\ncreated_at: 2023-01-01\n---\nHi\n",
        )?;
        fs::write(contents.join("notes.txt"), "not a post")?;
        fs::create_dir_all(contents.join("empty"))?;

        let highlighter = SyntectHighlighter::new();
        let posts_directory = dir.path().join("dist").join("post");
        let parser = Parser::new(None, "post", &posts_directory, &highlighter);
        let (posts, static_files) = parser.parse_posts(&contents)?;

        let slugs: Vec<&str> = posts.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(vec!["single", "bundle"], slugs);
        assert!(posts[1].body.contains("<pre><code class=\"language-rust\">"));
        assert_eq!(
            vec![(
                contents.join("bundle").join("img").join("a.png"),
                posts_directory.join("bundle").join("img").join("a.png"),
            )],
            static_files
        );
        Ok(())
    }

    #[test]
    fn test_parse_error_is_annotated() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("bad.md"), "no frontmatter")?;
        let parser = Parser::new(None, "post", Path::new("out"), &Upper);
        match parser.parse_posts(dir.path()) {
            Err(Error::Annotated(annotation, err)) => {
                assert!(annotation.contains("bad.md"));
                assert!(matches!(*err, Error::FrontmatterMissingStartFence));
            }
            _ => panic!("expected an annotated error"),
        }
        Ok(())
    }
}
