//! Predicate options for modifying matching behavior.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Options that modify predicate matching behavior.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PredicateOptions {
    /// Whether matching is case-sensitive (Mountebank default: false)
    #[serde(default, skip_serializing_if = "is_false")]
    pub case_sensitive: bool,

    /// Regex pattern to strip from every string before matching
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub except: Option<String>,

    /// Select from XML request values before matching
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xpath: Option<XPathSelector>,

    /// Select from JSON request values before matching
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonpath: Option<JsonPathSelector>,
}

impl PredicateOptions {
    pub fn has_selectors(&self) -> bool {
        self.xpath.is_some() || self.jsonpath.is_some()
    }

    /// Copy of these options with case sensitivity forced on.
    pub(crate) fn case_sensitive(&self) -> Self {
        Self {
            case_sensitive: true,
            ..self.clone()
        }
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// `xpath` predicate parameter.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct XPathSelector {
    pub selector: String,
    /// Namespace prefix to URI mapping
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub ns: BTreeMap<String, String>,
}

/// `jsonpath` predicate parameter.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct JsonPathSelector {
    pub selector: String,
}

/// How string values in the request and the predicate are encoded.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    #[default]
    #[serde(alias = "utf8")]
    Text,
    /// Base64-encoded payloads
    #[serde(alias = "base64")]
    Binary,
}

impl Encoding {
    pub fn is_binary(self) -> bool {
        self == Encoding::Binary
    }
}

impl std::str::FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" | "utf8" => Ok(Encoding::Text),
            "binary" | "base64" => Ok(Encoding::Binary),
            other => Err(format!("unknown encoding: {other}")),
        }
    }
}
