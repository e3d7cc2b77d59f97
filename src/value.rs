//! Conversions from configuration and front matter data into template
//! [`Value`]s.

use crate::config::Site;
use gtmpl::Value;
use std::collections::{BTreeMap, HashMap};

/// Converts an arbitrary YAML value into a template [`Value`]. Mapping keys
/// which aren't strings are rendered as YAML and used as string keys.
pub fn from_yaml(yaml: &serde_yaml::Value) -> Value {
    use serde_yaml::Value as Yaml;
    match yaml {
        Yaml::Null => Value::Nil,
        Yaml::Bool(b) => Value::from(*b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                Value::from(n.as_f64().unwrap_or_default())
            }
        }
        Yaml::String(s) => Value::String(s.clone()),
        Yaml::Sequence(seq) => Value::Array(seq.iter().map(from_yaml).collect()),
        Yaml::Mapping(mapping) => Value::Object(
            mapping
                .iter()
                .map(|(k, v)| (key_string(k), from_yaml(v)))
                .collect(),
        ),
    }
}

fn key_string(key: &serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_start_matches("---").trim().to_owned())
            .unwrap_or_default(),
    }
}

/// Inserts each attribute into `m` unless `m` already has the key.
pub fn merge_attributes(
    m: &mut HashMap<String, Value>,
    attributes: &BTreeMap<String, serde_yaml::Value>,
) {
    for (key, value) in attributes {
        m.entry(key.clone()).or_insert_with(|| from_yaml(value));
    }
}

impl From<&Site> for Value {
    /// Converts the [`Site`] into the `.site` template value.
    fn from(site: &Site) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("title".to_owned(), Value::String(site.title.clone()));
        m.insert(
            "author".to_owned(),
            match &site.author {
                Some(author) => Value::String(author.clone()),
                None => Value::Nil,
            },
        );
        m.insert(
            "url".to_owned(),
            match &site.url {
                Some(url) => Value::String(url.to_string()),
                None => Value::Nil,
            },
        );
        merge_attributes(&mut m, &site.extra);
        Value::Object(m)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn as_str(value: Option<&Value>) -> Option<&str> {
        match value {
            Some(Value::String(s)) => Some(s),
            _ => None,
        }
    }

    #[test]
    fn test_from_yaml() -> Result<(), serde_yaml::Error> {
        let yaml: serde_yaml::Value = serde_yaml::from_str(
            "name: x\ncount: 3\nratio: 0.5\ntags: [a, b]\nnone: ~\n1: one\n",
        )?;
        let m = match from_yaml(&yaml) {
            Value::Object(m) => m,
            _ => panic!("expected an object"),
        };
        assert_eq!(Some("x"), as_str(m.get("name")));
        assert!(matches!(m.get("count"), Some(Value::Number(_))));
        assert!(matches!(m.get("ratio"), Some(Value::Number(_))));
        match m.get("tags") {
            Some(Value::Array(tags)) => {
                assert_eq!(2, tags.len());
                assert_eq!(Some("a"), as_str(tags.first()));
                assert_eq!(Some("b"), as_str(tags.get(1)));
            }
            _ => panic!("expected `tags` to be an array"),
        }
        assert!(matches!(m.get("none"), Some(Value::Nil)));
        assert_eq!(Some("one"), as_str(m.get("1")));
        Ok(())
    }

    #[test]
    fn test_site_extras_do_not_shadow_fields() {
        let mut extra = BTreeMap::new();
        extra.insert(String::from("title"), serde_yaml::Value::from("shadow"));
        extra.insert(String::from("lang"), serde_yaml::Value::from("ko"));
        let site = Site {
            title: String::from("Blog"),
            author: None,
            url: None,
            extra,
        };
        match Value::from(&site) {
            Value::Object(m) => {
                assert_eq!(Some("Blog"), as_str(m.get("title")));
                assert_eq!(Some("ko"), as_str(m.get("lang")));
                assert!(matches!(m.get("author"), Some(Value::Nil)));
            }
            _ => panic!("expected an object"),
        }
    }
}
