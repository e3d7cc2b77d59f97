use anyhow::{anyhow, Result};
use chrono::format::{Item, StrftimeItems};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use url::Url;

/// The name of the project file which marks the root of a site.
pub const PROJECT_FILE: &str = "kiln.yaml";

#[derive(Deserialize)]
struct Project {
    site: Site,

    #[serde(default)]
    build: BuildPaths,
}

/// Site-wide metadata. The whole structure (including any keys not named
/// here) is available to every template as `.site`.
#[derive(Deserialize, Clone, Debug)]
pub struct Site {
    pub title: String,

    #[serde(default)]
    pub author: Option<String>,

    /// The public root of the site. When present, post URLs are absolute
    /// URLs under it; otherwise they are root-relative paths.
    #[serde(default)]
    pub url: Option<Url>,

    /// Any other keys from the `site` section.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

#[derive(Deserialize)]
#[serde(default)]
struct BuildPaths {
    contents: PathBuf,
    pages: PathBuf,
    templates: PathBuf,
    assets: PathBuf,
    dist: PathBuf,
    content_slug: String,
    date_format: String,
    highlight_theme: Option<String>,
}

impl Default for BuildPaths {
    fn default() -> Self {
        BuildPaths {
            contents: PathBuf::from("contents"),
            pages: PathBuf::from("pages"),
            templates: PathBuf::from("templates"),
            assets: PathBuf::from("assets"),
            dist: PathBuf::from("dist"),
            content_slug: String::from("post"),
            date_format: String::from("%Y.%m.%d"),
            highlight_theme: Some(String::from("InspiredGitHub")),
        }
    }
}

/// The resolved configuration for a build. All paths are absolute or relative
/// to the working directory (never to the project file).
pub struct Config {
    pub site: Site,
    pub contents_directory: PathBuf,
    pub pages_directory: PathBuf,
    pub templates_directory: PathBuf,
    pub assets_directory: PathBuf,

    /// The name of the assets directory inside of `output_directory`.
    pub assets_name: PathBuf,
    pub output_directory: PathBuf,

    /// The path segment under which posts are rendered, e.g. `post` for
    /// `/post/{slug}/`.
    pub content_slug: String,

    /// The strftime format for post display dates.
    pub date_format: String,

    /// The syntect theme used to generate `highlight.css`, if any.
    pub highlight_theme: Option<String>,
}

impl Config {
    /// Searches `dir` and then each of its ancestors for a [`PROJECT_FILE`]
    /// and loads the first one found.
    pub fn from_directory(dir: &Path, output_directory: Option<&Path>) -> Result<Config> {
        let path = dir.join(PROJECT_FILE);
        if path.exists() {
            match Config::from_project_file(&path, output_directory) {
                Ok(config) => Ok(config),
                Err(e) => Err(anyhow!("Loading configuration: {:?}", e)),
            }
        } else {
            match dir.parent() {
                Some(parent) => Config::from_directory(parent, output_directory),
                None => Err(anyhow!(
                    "Could not find `{}` in any parent directory",
                    PROJECT_FILE
                )),
            }
        }
    }

    pub fn from_project_file(path: &Path, output_directory: Option<&Path>) -> Result<Config> {
        let project: Project = serde_yaml::from_reader(open(path, "project")?)?;
        let build = project.build;
        validate_date_format(&build.date_format)?;
        match path.parent() {
            None => Err(anyhow!(
                "Can't get parent directory for provided project file path '{:?}'",
                path
            )),
            Some(project_root) => Ok(Config {
                site: project.site,
                contents_directory: project_root.join(&build.contents),
                pages_directory: project_root.join(&build.pages),
                templates_directory: project_root.join(&build.templates),
                assets_directory: project_root.join(&build.assets),
                assets_name: match build.assets.file_name() {
                    Some(name) => PathBuf::from(name),
                    None => PathBuf::from("assets"),
                },
                output_directory: match output_directory {
                    Some(dir) => dir.to_owned(),
                    None => project_root.join(&build.dist),
                },
                content_slug: build.content_slug,
                date_format: build.date_format,
                highlight_theme: build.highlight_theme,
            }),
        }
    }
}

fn validate_date_format(format: &str) -> Result<()> {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(anyhow!("Invalid `date_format`: `{}`", format));
    }
    Ok(())
}

fn open(path: &Path, kind: &str) -> Result<std::fs::File> {
    match std::fs::File::open(path) {
        Err(e) => Err(anyhow!("Opening {} file `{}`: {}", kind, path.display(), e)),
        Ok(file) => Ok(file),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::fs;

    #[test]
    fn test_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join(PROJECT_FILE), "site:\n  title: Blog\n")?;
        let config = Config::from_directory(dir.path(), None)?;
        assert_eq!("Blog", config.site.title);
        assert_eq!(None, config.site.author);
        assert_eq!(dir.path().join("contents"), config.contents_directory);
        assert_eq!(dir.path().join("dist"), config.output_directory);
        assert_eq!(PathBuf::from("assets"), config.assets_name);
        assert_eq!("post", config.content_slug);
        assert_eq!("%Y.%m.%d", config.date_format);
        assert_eq!(Some(String::from("InspiredGitHub")), config.highlight_theme);
        Ok(())
    }

    #[test]
    fn test_search_parent_directories() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let nested = dir.path().join("contents").join("hello");
        fs::create_dir_all(&nested)?;
        fs::write(
            dir.path().join(PROJECT_FILE),
            "site:\n  title: Blog\n  author: Jeong-ki\n  theme_color: teal\n\
             build:\n  dist: public\n  content_slug: notes\n  highlight_theme: null\n",
        )?;
        let output = dir.path().join("elsewhere");
        let config = Config::from_directory(&nested, Some(&output))?;
        assert_eq!(Some(String::from("Jeong-ki")), config.site.author);
        assert_eq!(
            Some(&serde_yaml::Value::from("teal")),
            config.site.extra.get("theme_color")
        );
        assert_eq!(output, config.output_directory);
        assert_eq!("notes", config.content_slug);
        assert_eq!(None, config.highlight_theme);
        Ok(())
    }

    #[test]
    fn test_invalid_date_format() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(
            dir.path().join(PROJECT_FILE),
            "site:\n  title: Blog\nbuild:\n  date_format: \"%Y.%!\"\n",
        )?;
        assert!(Config::from_directory(dir.path(), None).is_err());
        Ok(())
    }
}
