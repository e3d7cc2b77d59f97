//! Exports the [`build_site`] function which stitches together the high-level
//! steps of building the output static site: parsing the posts
//! ([`crate::parser`]), rendering standalone pages and post pages
//! ([`crate::write`]), copying the assets and post bundle files into the
//! output directory, and generating the highlighting stylesheet.

use crate::config::Config;
use crate::highlight::SyntectHighlighter;
use crate::parser::{Error as ParseError, Parser as PostParser, StaticFile};
use crate::write::{Error as WriteError, Writer};
use gtmpl::{Template, Value};
use log::{debug, info, warn};
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use syntect::highlighting::ThemeSet;
use syntect::html::{css_for_theme_with_class_style, ClassStyle};
use walkdir::WalkDir;

const HTML_EXTENSION: &str = "html";
const POST_TEMPLATE: &str = "post.html";
const PARTIALS_DIRECTORY: &str = "partials";
const HIGHLIGHT_STYLESHEET: &str = "highlight.css";

/// Builds the site from a [`Config`] object. This calls into
/// [`PostParser::parse_posts`] and [`Writer`] which do the heavy-lifting. This
/// function also copies the static assets from source directory to the output
/// directory.
pub fn build_site(config: &Config) -> Result<()> {
    let highlighter = SyntectHighlighter::new();
    let posts_output_directory = config.output_directory.join(&config.content_slug);
    let post_parser = PostParser::new(
        config.site.url.as_ref(),
        &config.content_slug,
        &posts_output_directory,
        &highlighter,
    );

    // collect all posts
    info!("Parsing posts in `{}`", config.contents_directory.display());
    let (posts, static_files) = post_parser.parse_posts(&config.contents_directory)?;
    info!("Parsed {} posts", posts.len());

    // Parse the template files.
    let partials = partial_templates(&config.templates_directory)?;
    let post_template = parse_template(
        partials
            .iter()
            .chain(std::iter::once(&config.templates_directory.join(POST_TEMPLATE))),
    )?;
    let pages = page_templates(&config.pages_directory, &config.output_directory, &partials)?;

    // Blow away the old output directory so we don't have any stale pages
    // from posts that have since been removed or renamed. Refuse to do so if
    // it holds the sources.
    for source in &[&config.contents_directory, &config.pages_directory] {
        if source.starts_with(&config.output_directory) {
            return Err(Error::OutputContainsSources(config.output_directory.clone()));
        }
    }
    rmdir(&config.output_directory)?;
    std::fs::create_dir_all(&config.output_directory)?;

    let site = Value::from(&config.site);
    let writer = Writer {
        post_template: &post_template,
        site: &site,
        content_slug: &config.content_slug,
        date_format: &config.date_format,
    };

    info!("Writing {} pages", pages.len());
    for (template, file_path) in &pages {
        writer.write_standalone(template, file_path, &posts)?;
    }

    info!("Writing {} posts", posts.len());
    writer.write_posts(&posts)?;

    // copy assets directory
    let assets_output_directory = config.output_directory.join(&config.assets_name);
    if config.assets_directory.is_dir() {
        copy_dir(&config.assets_directory, &assets_output_directory)?;
    } else {
        warn!(
            "Assets directory `{}` not found; skipping",
            config.assets_directory.display()
        );
    }
    copy_static_files(&static_files)?;

    if let Some(theme) = &config.highlight_theme {
        write_highlight_stylesheet(theme, &assets_output_directory.join(HIGHLIGHT_STYLESHEET))?;
    }

    info!("Site written to `{}`", config.output_directory.display());
    Ok(())
}

/// Maps a page template's file name to its output location: `index.html` is
/// written to the root of the output directory and any other `{name}.html`
/// is written to `{name}/index.html` so that it is served at `/{name}/`.
pub fn page_output_path(output_directory: &Path, file_name: &str) -> Option<PathBuf> {
    let name = file_name.strip_suffix(".html")?;
    if name.is_empty() {
        return None;
    }
    Some(match name {
        "index" => output_directory.join("index.html"),
        _ => output_directory.join(name).join("index.html"),
    })
}

// Parses every HTML template in the pages directory, pairing each with its
// output location.
fn page_templates(
    pages_directory: &Path,
    output_directory: &Path,
    partials: &[PathBuf],
) -> Result<Vec<(Template, PathBuf)>> {
    let mut pages = Vec::new();
    for path in sorted_entries(pages_directory)? {
        let file_name = path.file_name().and_then(|name| name.to_str());
        match file_name.and_then(|name| page_output_path(output_directory, name)) {
            Some(output) if path.is_file() => {
                let template = parse_template(partials.iter().chain(std::iter::once(&path)))?;
                pages.push((template, output));
            }
            _ => debug!("Skipping `{}`: not an HTML page", path.display()),
        }
    }
    Ok(pages)
}

// Returns the HTML files in `{templates_directory}/partials`, if any, in a
// stable order.
fn partial_templates(templates_directory: &Path) -> Result<Vec<PathBuf>> {
    let dir = templates_directory.join(PARTIALS_DIRECTORY);
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    Ok(sorted_entries(&dir)?
        .into_iter()
        .filter(|path| {
            path.is_file() && path.extension().map_or(false, |ext| ext == HTML_EXTENSION)
        })
        .collect())
}

fn sorted_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| Error::ReadDirectory {
        path: dir.to_owned(),
        err: e,
    })? {
        entries.push(entry?.path());
    }
    entries.sort();
    Ok(entries)
}

// Loads the template file contents, concatenates them, and parses the result
// into a template.
fn parse_template<P: AsRef<Path>>(template_files: impl Iterator<Item = P>) -> Result<Template> {
    let mut contents = String::new();
    for template_file in template_files {
        use std::io::Read;
        let template_file = template_file.as_ref();
        File::open(&template_file)
            .map_err(|e| Error::OpenTemplateFile {
                path: template_file.to_owned(),
                err: e,
            })?
            .read_to_string(&mut contents)?;
    }

    let mut template = Template::default();
    template
        .parse(&contents)
        .map_err(|e| Error::ParseTemplate(e.to_string()))?;
    Ok(template)
}

fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    for result in WalkDir::new(src) {
        let entry = result?;
        // `src` is always an ancestor of the entry
        let relative = match entry.path().strip_prefix(src) {
            Ok(relative) => relative,
            Err(_) => continue,
        };
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            debug!("Copying `{}`", entry.path().display());
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

fn copy_static_files(static_files: &[StaticFile]) -> Result<()> {
    for (src, dst) in static_files {
        if let Some(dir) = dst.parent() {
            std::fs::create_dir_all(dir)?;
        }
        debug!("Copying `{}`", src.display());
        std::fs::copy(src, dst)?;
    }
    Ok(())
}

/// Writes the CSS for the classes emitted by
/// [`crate::highlight::SyntectHighlighter`], using one of syntect's bundled
/// themes.
fn write_highlight_stylesheet(theme_name: &str, path: &Path) -> Result<()> {
    let themes = ThemeSet::load_defaults();
    let theme = themes
        .themes
        .get(theme_name)
        .ok_or_else(|| Error::UnknownTheme(theme_name.to_owned()))?;
    let css = css_for_theme_with_class_style(theme, ClassStyle::Spaced)
        .map_err(|e| Error::Stylesheet(e.to_string()))?;
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, css)?;
    Ok(())
}

fn rmdir(dir: &Path) -> Result<()> {
    match std::fs::remove_dir_all(dir) {
        Ok(x) => Ok(x),
        Err(e) => match e.kind() {
            std::io::ErrorKind::NotFound => Ok(()),
            _ => Err(Error::Clean {
                path: dir.to_owned(),
                err: e,
            }),
        },
    }
}

type Result<T> = std::result::Result<T, Error>;

/// The error type for building a site. Errors can be during parsing, writing,
/// cleaning output directories, parsing template files, and other I/O.
#[derive(Debug)]
pub enum Error {
    /// Returned for errors during parsing.
    Parse(ParseError),

    /// Returned for errors writing pages to disk as HTML files.
    Write(WriteError),

    /// Returned for I/O problems while cleaning output directories.
    Clean { path: PathBuf, err: std::io::Error },

    /// Returned when the output directory would contain a source directory
    /// and so can't safely be cleaned.
    OutputContainsSources(PathBuf),

    /// Returned for I/O problems while listing a source directory.
    ReadDirectory { path: PathBuf, err: std::io::Error },

    /// Returned for I/O problems while opening template files.
    OpenTemplateFile { path: PathBuf, err: std::io::Error },

    /// Returned for errors parsing template files.
    ParseTemplate(String),

    /// Returned when the configured highlight theme doesn't exist.
    UnknownTheme(String),

    /// Returned when the highlight stylesheet can't be generated.
    Stylesheet(String),

    /// Returned for WalkDir I/O errors while copying assets.
    WalkDir(walkdir::Error),

    /// Returned for other I/O errors.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Parse(err) => err.fmt(f),
            Error::Write(err) => err.fmt(f),
            Error::Clean { path, err } => {
                write!(f, "Cleaning directory '{}': {}", path.display(), err)
            }
            Error::OutputContainsSources(path) => write!(
                f,
                "Refusing to clean output directory '{}': it contains source files",
                path.display()
            ),
            Error::ReadDirectory { path, err } => {
                write!(f, "Reading directory '{}': {}", path.display(), err)
            }
            Error::OpenTemplateFile { path, err } => {
                write!(f, "Opening template file '{}': {}", path.display(), err)
            }
            Error::ParseTemplate(err) => err.fmt(f),
            Error::UnknownTheme(theme) => write!(f, "Unknown highlight theme `{}`", theme),
            Error::Stylesheet(err) => write!(f, "Generating highlight stylesheet: {}", err),
            Error::WalkDir(err) => err.fmt(f),
            Error::Io(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Parse(err) => Some(err),
            Error::Write(err) => Some(err),
            Error::Clean { path: _, err } => Some(err),
            Error::OutputContainsSources(_) => None,
            Error::ReadDirectory { path: _, err } => Some(err),
            Error::OpenTemplateFile { path: _, err } => Some(err),
            Error::ParseTemplate(_) => None,
            Error::UnknownTheme(_) => None,
            Error::Stylesheet(_) => None,
            Error::WalkDir(err) => Some(err),
            Error::Io(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for Error {
    /// Converts [`std::io::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<ParseError> for Error {
    /// Converts [`ParseError`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: ParseError) -> Error {
        Error::Parse(err)
    }
}

impl From<WriteError> for Error {
    /// Converts [`WriteError`]s into [`Error`]. This allows us to use the `?`
    /// operator.
    fn from(err: WriteError) -> Error {
        Error::Write(err)
    }
}

impl From<walkdir::Error> for Error {
    /// Converts [`walkdir::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator.
    fn from(err: walkdir::Error) -> Error {
        Error::WalkDir(err)
    }
}
