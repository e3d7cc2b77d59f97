//! Defines the [`Post`] type and the conversions from posts into template
//! values. See [`crate::parser`] for how posts are read from disk.

use crate::value::merge_attributes;
use chrono::NaiveDate;
use gtmpl::Value;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

/// The marker separating a post's summary from the rest of its body.
const FOLD_TAG: &str = "<!-- more -->";

/// A rendered post.
#[derive(Clone, Debug, PartialEq)]
pub struct Post {
    /// The post's identifier: the name of its bundle directory or the file
    /// stem of its markdown file.
    pub slug: String,

    /// The title of the post.
    pub title: String,

    /// The date the post was written, if given.
    pub created_at: Option<NaiveDate>,

    /// The human-readable date shown in templates. Filled in by
    /// [`format_post`].
    pub display_date: Option<String>,

    /// The URL of the post page.
    pub url: String,

    /// The target location on disk for the post page.
    pub file_path: PathBuf,

    /// The post body, rendered to HTML.
    pub body: String,

    /// Front matter fields other than `title` and `created_at`.
    pub attributes: BTreeMap<String, serde_yaml::Value>,
}

impl Post {
    /// Returns the part of the body before the fold tag, and whether the
    /// body was actually folded.
    pub fn summary(&self) -> (&str, bool) {
        match self.body.find(FOLD_TAG) {
            Some(i) => (&self.body[..i], true),
            None => (&self.body, false),
        }
    }

    /// Converts a [`Post`] into a template [`Value`] with the full body.
    pub fn to_value(&self) -> Value {
        self.value_with_body(&self.body)
    }

    /// Converts a [`Post`] into a template [`Value`] whose `body` is only the
    /// summary. Used for post listings.
    pub fn summarize(&self) -> Value {
        self.value_with_body(self.summary().0)
    }

    fn value_with_body(&self, body: &str) -> Value {
        let (summary, summarized) = self.summary();
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("slug".to_owned(), Value::String(self.slug.clone()));
        m.insert("title".to_owned(), Value::String(self.title.clone()));
        m.insert("url".to_owned(), Value::String(self.url.clone()));
        m.insert("body".to_owned(), Value::String(body.to_owned()));
        m.insert("summary".to_owned(), Value::String(summary.to_owned()));
        m.insert("summarized".to_owned(), Value::Bool(summarized));
        m.insert(
            "date".to_owned(),
            match self.created_at {
                Some(date) => Value::String(date.format("%Y-%m-%d").to_string()),
                None => Value::Nil,
            },
        );
        m.insert(
            "created_at".to_owned(),
            match &self.display_date {
                Some(date) => Value::String(date.clone()),
                None => Value::Nil,
            },
        );
        merge_attributes(&mut m, &self.attributes);
        Value::Object(m)
    }
}

/// Returns a copy of `post` whose display date is its `created_at` date
/// rendered with `date_format` (a strftime string already validated by
/// [`crate::config::Config`]).
pub fn format_post(post: &Post, date_format: &str) -> Post {
    Post {
        display_date: post
            .created_at
            .map(|date| date.format(date_format).to_string()),
        ..post.clone()
    }
}

/// Orders posts newest first. Undated posts come last; ties are broken by
/// slug.
pub fn by_date_descending(a: &Post, b: &Post) -> Ordering {
    match (a.created_at, b.created_at) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.slug.cmp(&b.slug))
}
