//! Error code registry: the `code -> message template` snapshot curated out of
//! band (typically `codes.json`), plus the reverse index the rewrite consults.
//!
//! The snapshot is read once per compilation unit and frozen for the rest of
//! that unit's traversal. Nothing here is cached across units.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::TransformError;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("%s").expect("placeholder pattern is valid"));

#[derive(Debug, Clone)]
pub enum RegistrySource {
    File(PathBuf),
    Inline(Map<String, Value>),
    Empty,
}

impl RegistrySource {
    fn name(&self) -> String {
        match self {
            RegistrySource::File(path) => path.display().to_string(),
            RegistrySource::Inline(_) => "<inline codes>".to_string(),
            RegistrySource::Empty => "<empty>".to_string(),
        }
    }
}

/// Forward mapping, kept in snapshot order.
#[derive(Debug, Clone, Default)]
pub struct CodeRegistry {
    entries: Vec<(String, String)>,
}

impl CodeRegistry {
    pub fn load(source: &RegistrySource) -> Result<Self, TransformError> {
        let name = source.name();
        match source {
            RegistrySource::File(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    TransformError::RegistryUnreadable {
                        source_name: name.clone(),
                        reason: e.to_string(),
                    }
                })?;
                Self::from_json_str(&name, &raw)
            }
            RegistrySource::Inline(map) => Self::from_map(&name, map),
            RegistrySource::Empty => Ok(Self::default()),
        }
    }

    pub fn from_json_str(source_name: &str, raw: &str) -> Result<Self, TransformError> {
        let map: Map<String, Value> =
            serde_json::from_str(raw).map_err(|e| TransformError::RegistryUnreadable {
                source_name: source_name.to_string(),
                reason: e.to_string(),
            })?;
        Self::from_map(source_name, &map)
    }

    fn from_map(source_name: &str, map: &Map<String, Value>) -> Result<Self, TransformError> {
        let unreadable = |reason: String| TransformError::RegistryUnreadable {
            source_name: source_name.to_string(),
            reason,
        };
        let mut entries = Vec::with_capacity(map.len());
        for (code, template) in map {
            if !is_code(code) {
                return Err(unreadable(format!("code `{code}` is not a non-negative integer")));
            }
            let Value::String(template) = template else {
                return Err(unreadable(format!("message for code `{code}` is not a string")));
            };
            entries.push((code.clone(), template.clone()));
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, code: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(c, _)| c == code)
            .map(|(_, t)| t.as_str())
    }

    /// Builds `template -> code`. When two codes share a template the one
    /// later in snapshot order wins.
    pub fn invert(&self) -> ReverseIndex {
        let mut by_template = HashMap::with_capacity(self.entries.len());
        for (code, template) in &self.entries {
            if let Some(previous) = by_template.insert(template.clone(), code.clone()) {
                warn!(
                    template = %template,
                    shadowed = %previous,
                    winner = %code,
                    "duplicate message template in error code registry"
                );
            }
        }
        ReverseIndex { by_template }
    }

    /// Smallest code larger than every code in the snapshot.
    pub fn next_code(&self) -> String {
        self.entries
            .iter()
            .map(|(c, _)| c.trim_start_matches('0'))
            .max_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)))
            .map(increment)
            .unwrap_or_else(|| "0".to_string())
    }

    /// Formats the template for `code`, substituting `%s` placeholders in
    /// order. Placeholders without a matching argument are left as-is.
    pub fn decode(&self, code: &str, args: &[&str]) -> Option<String> {
        let template = self.get(code)?;
        let mut next = args.iter();
        let out = PLACEHOLDER.replace_all(template, |caps: &Captures| match next.next() {
            Some(arg) => arg.to_string(),
            None => caps[0].to_string(),
        });
        Some(out.into_owned())
    }

    /// Decoder URL surfaced by production builds:
    /// `<base>?invariant=<code>&args[]=<a1>&args[]=<a2>...`
    pub fn error_url(base: &str, code: &str, args: &[&str]) -> String {
        let mut url = format!("{base}?invariant={}", encode_component(code));
        for arg in args {
            url.push_str("&args[]=");
            url.push_str(&encode_component(arg));
        }
        url
    }
}

/// Codes are plain decimal digit strings of any length.
fn is_code(code: &str) -> bool {
    !code.is_empty() && code.bytes().all(|b| b.is_ascii_digit())
}

/// Decimal increment on a digit string without leading zeros.
fn increment(digits: &str) -> String {
    let mut out: Vec<u8> = digits.bytes().collect();
    for b in out.iter_mut().rev() {
        if *b == b'9' {
            *b = b'0';
        } else {
            *b += 1;
            return out.into_iter().map(char::from).collect();
        }
    }
    out.insert(0, b'1');
    out.into_iter().map(char::from).collect()
}

pub fn placeholder_count(template: &str) -> usize {
    PLACEHOLDER.find_iter(template).count()
}

fn encode_component(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

#[derive(Debug, Clone, Default)]
pub struct ReverseIndex {
    by_template: HashMap<String, String>,
}

impl ReverseIndex {
    pub fn code_for(&self, template: &str) -> Option<&str> {
        self.by_template.get(template).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_template.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_template.is_empty()
    }
}
