//! Structured documents: format detection, parsing and rendering
//!
//! Both YAML and JSON are parsed into the same insertion-ordered
//! [`serde_json::Value`] tree so conditions and actions don't care which
//! format a file uses. Rendering goes back to the format the content was
//! parsed from and keeps the bits of layout that are cheap to keep: compact
//! vs. pretty JSON, JSON indentation, and the trailing newline.
//!
//! YAML that the shared tree cannot hold faithfully (non-string mapping keys,
//! tags, non-finite floats) fails to parse and is left to raw-text actions.
//! YAML whose plain numbers would be re-rendered differently (`3.10` becomes
//! `3.1`) parses for reading but refuses to render.

pub mod path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_yaml::Value as YamlValue;
use std::fmt;
use std::sync::LazyLock;
use tracing::{debug, trace};

use crate::error::{Error, Result};

/// Supported document formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Yaml,
    Json,
}

impl Format {
    /// Format to try first for `content`
    pub fn guess(content: &str) -> Self {
        let trimmed = content.trim_start();
        if trimmed.starts_with('{') || trimmed.starts_with('[') {
            Self::Json
        } else {
            Self::Yaml
        }
    }

    fn other(self) -> Self {
        match self {
            Self::Yaml => Self::Json,
            Self::Json => Self::Yaml,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Yaml => f.write_str("YAML"),
            Self::Json => f.write_str("JSON"),
        }
    }
}

/// Layout details remembered from the source text
#[derive(Debug, Clone, PartialEq, Eq)]
struct Layout {
    trailing_newline: bool,
    /// JSON indent unit; `None` renders compact
    json_indent: Option<String>,
    /// First plain YAML number whose canonical rendering differs from the source
    lossy_scalar: Option<String>,
}

impl Layout {
    fn detect(content: &str) -> Self {
        let body = content.trim();
        let json_indent = if body.contains('\n') {
            let indent = body
                .lines()
                .skip(1)
                .map(|line| {
                    let stripped = line.trim_start_matches([' ', '\t']);
                    &line[..line.len() - stripped.len()]
                })
                .find(|ws| !ws.is_empty())
                .unwrap_or("  ");
            Some(indent.to_string())
        } else {
            None
        };
        Self {
            trailing_newline: content.ends_with('\n'),
            json_indent,
            lossy_scalar: None,
        }
    }
}

/// Plain scalars that start like a number, in block mappings and sequences
static NUMERIC_SCALAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)(?::|^[ \t]*-)[ \t]+([-+.]?[0-9][0-9A-Za-z_.+-]*)[ \t]*(?:#.*)?$")
        .expect("invalid numeric scalar regex")
});

/// First number-like scalar that serde_yaml would write back differently
fn find_lossy_scalar(content: &str) -> Option<String> {
    NUMERIC_SCALAR
        .captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str())
        .find(|token| match serde_yaml::from_str::<YamlValue>(token) {
            Ok(value @ YamlValue::Number(_)) => serde_yaml::to_string(&value)
                .map(|out| out.trim_end() != *token)
                .unwrap_or(true),
            _ => false,
        })
        .map(str::to_string)
}

/// Convert a YAML tree into the shared tree, rejecting what it cannot hold
fn yaml_to_json(value: YamlValue) -> Result<Value> {
    Ok(match value {
        YamlValue::Null => Value::Null,
        YamlValue::Bool(b) => Value::Bool(b),
        YamlValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Number(i.into())
            } else if let Some(u) = n.as_u64() {
                Value::Number(u.into())
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(|| Error::parse("YAML", format!("unsupported number {}", n)))?
            }
        }
        YamlValue::String(s) => Value::String(s),
        YamlValue::Sequence(items) => Value::Array(
            items
                .into_iter()
                .map(yaml_to_json)
                .collect::<Result<Vec<_>>>()?,
        ),
        YamlValue::Mapping(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, value) in map {
                let YamlValue::String(key) = key else {
                    return Err(Error::parse(
                        "YAML",
                        format!("non-string mapping key {:?}", key),
                    ));
                };
                out.insert(key, yaml_to_json(value)?);
            }
            Value::Object(out)
        }
        YamlValue::Tagged(tagged) => {
            return Err(Error::parse("YAML", format!("tagged value {}", tagged.tag)));
        }
    })
}

/// A parsed document tree together with its source format
#[derive(Debug, Clone)]
pub struct Document {
    root: Value,
    format: Format,
    layout: Layout,
}

impl Document {
    /// Parse `content`, guessing the format and falling back to the other
    /// one when the first attempt fails
    pub fn parse(content: &str) -> Result<Self> {
        let first = Format::guess(content);
        match Self::parse_as(content, first) {
            Ok(doc) => Ok(doc),
            Err(first_err) => {
                trace!("{} parse failed, trying {}: {}", first, first.other(), first_err);
                Self::parse_as(content, first.other()).map_err(|_| first_err)
            }
        }
    }

    /// Parse `content` strictly as `format`
    pub fn parse_as(content: &str, format: Format) -> Result<Self> {
        let mut layout = Layout::detect(content);
        let root = match format {
            Format::Json => {
                serde_json::from_str(content).map_err(|e| Error::parse("JSON", e))?
            }
            Format::Yaml => {
                let value: YamlValue =
                    serde_yaml::from_str(content).map_err(|e| Error::parse("YAML", e))?;
                let root = yaml_to_json(value)?;
                layout.lossy_scalar = find_lossy_scalar(content);
                root
            }
        };
        Ok(Self {
            root,
            format,
            layout,
        })
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Value at a dotted key path
    pub fn get(&self, key: &str) -> Option<&Value> {
        path::get(&self.root, key)
    }

    /// Write a value at a dotted key path
    pub fn set(&mut self, key: &str, value: Value) -> Result<()> {
        path::set(&mut self.root, key, value)
    }

    /// Render back to text in the original format
    ///
    /// YAML with a number that would not survive re-rendering is refused.
    pub fn render(&self) -> Result<String> {
        if let Some(token) = &self.layout.lossy_scalar {
            debug!("Refusing to re-render YAML: '{}' would change", token);
            return Err(Error::serialize(
                "YAML",
                format!("number '{}' would not be written back verbatim", token),
            ));
        }
        let mut out = match self.format {
            Format::Json => self.render_json()?,
            Format::Yaml => {
                serde_yaml::to_string(&self.root).map_err(|e| Error::serialize("YAML", e))?
            }
        };

        let ends_with_newline = out.ends_with('\n');
        if self.layout.trailing_newline && !ends_with_newline {
            out.push('\n');
        } else if !self.layout.trailing_newline && ends_with_newline {
            out.truncate(out.trim_end_matches('\n').len());
        }
        Ok(out)
    }

    fn render_json(&self) -> Result<String> {
        let Some(indent) = &self.layout.json_indent else {
            return serde_json::to_string(&self.root).map_err(|e| Error::serialize("JSON", e));
        };

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(indent.as_bytes());
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.root
            .serialize(&mut ser)
            .map_err(|e| Error::serialize("JSON", e))?;
        String::from_utf8(buf).map_err(|e| Error::serialize("JSON", e))
    }
}
