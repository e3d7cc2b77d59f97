//! Defines the [`Writer`] and [`Error`] types: the logic for rendering posts
//! and standalone pages through their templates and writing them to disk.

use crate::post::{format_post, Post};
use gtmpl::{Context, Template, Value};
use log::debug;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Responsible for templating and writing HTML pages to disk from [`Post`]
/// sources and standalone page templates.
pub struct Writer<'a> {
    /// The template for post pages.
    pub post_template: &'a Template,

    /// The `.site` value made available to every template.
    pub site: &'a Value,

    /// The path segment under which posts live. This is made available to
    /// page templates as `.content_slug`.
    pub content_slug: &'a str,

    /// The strftime format for post display dates.
    pub date_format: &'a str,
}

impl Writer<'_> {
    /// Takes a single [`Page`], templates it, and writes it to disk.
    fn write_page(&self, page: &Page) -> Result<()> {
        debug!("Writing `{}`", page.file_path.display());
        if let Some(dir) = page.file_path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let mut value = page.to_value();
        if let Value::Object(obj) = &mut value {
            obj.insert("site".to_owned(), self.site.clone());
        }
        page.template
            .execute(
                &mut std::fs::File::create(&page.file_path)?,
                &Context::from(value),
            )
            .map_err(|e| Error::Template {
                path: page.file_path.clone(),
                message: e.to_string(),
            })
    }

    /// Writes one page per [`Post`]. Each post page sees the post as
    /// `.post` and the URLs of its neighbours (by date) as `.prev` and
    /// `.next`.
    pub fn write_posts(&self, posts: &[Post]) -> Result<()> {
        for (i, post) in posts.iter().enumerate() {
            let post = format_post(post, self.date_format);
            let mut values = HashMap::new();
            values.insert("post".to_owned(), post.to_value());
            values.insert(
                "prev".to_owned(),
                match i.checked_sub(1) {
                    Some(prev) => Value::String(posts[prev].url.clone()),
                    None => Value::Nil,
                },
            );
            values.insert(
                "next".to_owned(),
                match posts.get(i + 1) {
                    Some(next) => Value::String(next.url.clone()),
                    None => Value::Nil,
                },
            );
            self.write_page(&Page {
                values,
                file_path: post.file_path.clone(),
                template: self.post_template,
            })?;
        }
        Ok(())
    }

    /// Renders a standalone page template to `file_path`. The page sees the
    /// summaries of all posts (newest first) as `.posts`.
    pub fn write_standalone(
        &self,
        template: &Template,
        file_path: &Path,
        posts: &[Post],
    ) -> Result<()> {
        let mut values = HashMap::new();
        values.insert(
            "posts".to_owned(),
            Value::Array(
                posts
                    .iter()
                    .map(|p| format_post(p, self.date_format).summarize())
                    .collect(),
            ),
        );
        values.insert(
            "content_slug".to_owned(),
            Value::String(self.content_slug.to_owned()),
        );
        self.write_page(&Page {
            values,
            file_path: file_path.to_owned(),
            template,
        })
    }
}

/// An object representing an output HTML file. A [`Page`] can be converted to a
/// [`Value`] and thus rendered in a template via [`Page::to_value`].
struct Page<'a> {
    /// The top-level template fields for the page.
    values: HashMap<String, Value>,

    /// The target location on disk for the output file.
    file_path: PathBuf,

    /// The template with which the page will be rendered.
    template: &'a Template,
}

impl Page<'_> {
    fn to_value(&self) -> Value {
        Value::Object(self.values.clone())
    }
}

/// The result of a fallible page-writing operation.
type Result<T> = std::result::Result<T, Error>;

/// Represents an error in a page-writing operation.
#[derive(Debug)]
pub enum Error {
    /// An error during templating.
    Template { path: PathBuf, message: String },

    /// An error writing the output files.
    Io(io::Error),
}

impl From<io::Error> for Error {
    /// Converts an [`io::Error`] into an [`Error`]. This allows us to use the
    /// `?` operator for fallible I/O operations.
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as presentable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Template { path, message } => {
                write!(f, "Rendering '{}': {}", path.display(), message)
            }
            Error::Io(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Template { .. } => None,
            Error::Io(err) => Some(err),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;
    use std::fs;

    fn template(text: &str) -> Template {
        let mut template = Template::default();
        template.parse(text).unwrap();
        template
    }

    fn post(dir: &Path, slug: &str, day: u32) -> Post {
        Post {
            slug: slug.to_owned(),
            title: slug.to_uppercase(),
            created_at: NaiveDate::from_ymd_opt(2024, 3, day),
            display_date: None,
            url: format!("/post/{}/", slug),
            file_path: dir.join(slug).join("index.html"),
            body: format!("<p>{} body</p><!-- more --><p>rest</p>", slug),
            attributes: BTreeMap::new(),
        }
    }

    #[test]
    fn test_write_posts() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let posts = vec![post(dir.path(), "b", 2), post(dir.path(), "a", 1)];
        let post_template = template(
            "{{.site}}|{{.post.title}}|{{.post.created_at}}|{{.post.body}}|\
             {{if .prev}}{{.prev}}{{else}}none{{end}}|{{if .next}}{{.next}}{{else}}none{{end}}",
        );
        let site = Value::String(String::from("Blog"));
        let writer = Writer {
            post_template: &post_template,
            site: &site,
            content_slug: "post",
            date_format: "%Y.%m.%d",
        };
        writer.write_posts(&posts)?;

        assert_eq!(
            "Blog|B|2024.03.02|<p>b body</p><!-- more --><p>rest</p>|none|/post/a/",
            fs::read_to_string(dir.path().join("b").join("index.html"))?
        );
        assert_eq!(
            "Blog|A|2024.03.01|<p>a body</p><!-- more --><p>rest</p>|/post/b/|none",
            fs::read_to_string(dir.path().join("a").join("index.html"))?
        );
        Ok(())
    }

    #[test]
    fn test_write_standalone() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let posts = vec![post(dir.path(), "b", 2), post(dir.path(), "a", 1)];
        let page = template(
            "{{.content_slug}}:{{range .posts}}[{{.title}} {{.created_at}} {{.body}}]{{end}}",
        );
        let unused = template("");
        let site = Value::Nil;
        let writer = Writer {
            post_template: &unused,
            site: &site,
            content_slug: "post",
            date_format: "%d",
        };
        let file_path = dir.path().join("about").join("index.html");
        writer.write_standalone(&page, &file_path, &posts)?;
        assert_eq!(
            "post:[B 02 <p>b body</p>][A 01 <p>a body</p>]",
            fs::read_to_string(&file_path)?
        );
        Ok(())
    }
}
