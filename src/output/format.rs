//! Document formats selectable with `--format`.

use std::fmt;
use std::io::Write;
use std::str::FromStr;

use crossterm::style::Stylize;
use serde_json::Value;

use crate::output::OutputError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Tables for list commands, JSON otherwise.
    #[default]
    Auto,
    /// Pretty view, always through the pager.
    Explore,
    Json,
    Jsonl,
    Pretty,
    Raw,
    Yaml,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 7] = [
        OutputFormat::Auto,
        OutputFormat::Explore,
        OutputFormat::Json,
        OutputFormat::Jsonl,
        OutputFormat::Pretty,
        OutputFormat::Raw,
        OutputFormat::Yaml,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Auto => "auto",
            OutputFormat::Explore => "explore",
            OutputFormat::Json => "json",
            OutputFormat::Jsonl => "jsonl",
            OutputFormat::Pretty => "pretty",
            OutputFormat::Raw => "raw",
            OutputFormat::Yaml => "yaml",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = OutputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|f| f.as_str() == lowered)
            .ok_or_else(|| OutputError::InvalidFormat {
                format: s.to_string(),
                valid: Self::ALL.map(|f| f.as_str()).join(", "),
            })
    }
}

/// A JSON response body as received plus its parsed value.
#[derive(Debug, Clone)]
pub struct Document {
    raw: String,
    value: Value,
}

impl Document {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let value = serde_json::from_slice(bytes)?;
        Ok(Self {
            raw: String::from_utf8_lossy(bytes).trim_end().to_string(),
            value,
        })
    }

    pub fn from_value(value: Value) -> Self {
        Self {
            raw: value.to_string(),
            value,
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Typed view of the document.
    pub fn parse<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde::Deserialize::deserialize(&self.value)
    }
}

/// Follow a dot path such as `gpu.profiles.0.name`.
pub fn select_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(value, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

/// Render `doc` in `format`. `transform` narrows the document first (every
/// format except `raw`); a path that does not resolve leaves it unchanged.
pub fn show_json<W: Write>(
    out: &mut W,
    title: &str,
    doc: &Document,
    format: OutputFormat,
    transform: Option<&str>,
    colors: bool,
) -> Result<(), OutputError> {
    if format == OutputFormat::Raw {
        writeln!(out, "{}", doc.raw)?;
        return Ok(());
    }

    let value = transform
        .filter(|t| !t.is_empty())
        .and_then(|t| select_path(&doc.value, t))
        .unwrap_or(&doc.value);

    match format {
        OutputFormat::Auto | OutputFormat::Json => {
            if colors {
                write_colored(out, value, Some(0))?;
                writeln!(out)?;
            } else {
                writeln!(out, "{}", serde_json::to_string_pretty(value)?)?;
            }
        }
        OutputFormat::Jsonl => {
            if colors {
                write_colored(out, value, None)?;
                writeln!(out)?;
            } else {
                writeln!(out, "{}", serde_json::to_string(value)?)?;
            }
        }
        OutputFormat::Pretty | OutputFormat::Explore => write_pretty(out, title, value, colors)?,
        OutputFormat::Yaml => out.write_all(serde_yaml::to_string(value)?.as_bytes())?,
        OutputFormat::Raw => {}
    }
    Ok(())
}

/// JSON with ANSI colours. `depth: None` writes the compact one-line form.
fn write_colored<W: Write>(
    out: &mut W,
    value: &Value,
    depth: Option<usize>,
) -> std::io::Result<()> {
    match value {
        Value::Null => write!(out, "{}", "null".dark_grey()),
        Value::Bool(b) => write!(out, "{}", b.to_string().magenta()),
        Value::Number(n) => write!(out, "{}", n.to_string().yellow()),
        Value::String(s) => write!(out, "{}", Value::String(s.clone()).to_string().green()),
        Value::Array(items) if items.is_empty() => out.write_all(b"[]"),
        Value::Object(map) if map.is_empty() => out.write_all(b"{}"),
        Value::Array(items) => {
            out.write_all(b"[")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.write_all(b",")?;
                }
                if let Some(level) = depth {
                    newline_indent(out, level + 1)?;
                }
                write_colored(out, item, depth.map(|d| d + 1))?;
            }
            if let Some(level) = depth {
                newline_indent(out, level)?;
            }
            out.write_all(b"]")
        }
        Value::Object(map) => {
            out.write_all(b"{")?;
            for (i, (key, item)) in map.iter().enumerate() {
                if i > 0 {
                    out.write_all(b",")?;
                }
                if let Some(level) = depth {
                    newline_indent(out, level + 1)?;
                }
                let key = Value::String(key.clone()).to_string();
                write!(out, "{}", key.blue())?;
                let separator: &[u8] = if depth.is_some() { b": " } else { b":" };
                out.write_all(separator)?;
                write_colored(out, item, depth.map(|d| d + 1))?;
            }
            if let Some(level) = depth {
                newline_indent(out, level)?;
            }
            out.write_all(b"}")
        }
    }
}

fn newline_indent<W: Write>(out: &mut W, level: usize) -> std::io::Result<()> {
    write!(out, "\n{:width$}", "", width = level * 2)
}

/// Indented `key: value` tree under a title line.
fn write_pretty<W: Write>(
    out: &mut W,
    title: &str,
    value: &Value,
    colors: bool,
) -> std::io::Result<()> {
    if colors {
        writeln!(out, "{}", title.bold())?;
    } else {
        writeln!(out, "{title}")?;
    }
    write_tree(out, value, 1, colors)
}

fn write_tree<W: Write>(
    out: &mut W,
    value: &Value,
    level: usize,
    colors: bool,
) -> std::io::Result<()> {
    let pad = "  ".repeat(level);
    match value {
        Value::Object(map) => {
            for (key, item) in map {
                let key = if colors {
                    key.as_str().cyan().to_string()
                } else {
                    key.clone()
                };
                match scalar(item) {
                    Some(text) => writeln!(out, "{pad}{key}: {text}")?,
                    None => {
                        writeln!(out, "{pad}{key}:")?;
                        write_tree(out, item, level + 1, colors)?;
                    }
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                match scalar(item) {
                    Some(text) => writeln!(out, "{pad}- {text}")?,
                    None => {
                        writeln!(out, "{pad}-")?;
                        write_tree(out, item, level + 1, colors)?;
                    }
                }
            }
        }
        other => {
            if let Some(text) = scalar(other) {
                writeln!(out, "{pad}{text}")?;
            }
        }
    }
    Ok(())
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::Null => Some("null".to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Array(items) if items.is_empty() => Some("[]".to_string()),
        Value::Object(map) if map.is_empty() => Some("{}".to_string()),
        _ => None,
    }
}
