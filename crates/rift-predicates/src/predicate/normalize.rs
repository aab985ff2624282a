//! Value normalization applied before every comparison.
//!
//! Each non-empty string leaf goes through, in order: base64 decoding (binary
//! encoding only), `except` stripping, case folding, and structured-document
//! selection (request side only). Mapping keys are case-folded. Sequences are
//! normalized element-wise and sorted so multi-valued fields compare without
//! regard to order.

use super::options::{Encoding, PredicateOptions};
use super::selector::{select_jsonpath, select_xpath};
use crate::error::{PredicateError, Result};
use crate::value::{Mapping, Value};
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use regex::{Regex, RegexBuilder};

/// Decoder for the symbols left after [`base64_symbols`]: no padding, loose
/// trailing bits.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::RequireNone),
);

/// Normalizer bound to one predicate's options and the request encoding.
pub(crate) struct Normalizer<'a> {
    options: &'a PredicateOptions,
    encoding: Encoding,
    except: Option<Regex>,
}

impl<'a> Normalizer<'a> {
    pub fn new(options: &'a PredicateOptions, encoding: Encoding) -> Result<Self> {
        let except = options
            .except
            .as_deref()
            .filter(|pattern| !pattern.is_empty())
            .map(|pattern| {
                RegexBuilder::new(pattern)
                    .case_insensitive(!options.case_sensitive)
                    .build()
                    .map_err(|e| {
                        PredicateError::validation_with_context(
                            "malformed except pattern",
                            format!("{pattern}: {e}"),
                        )
                    })
            })
            .transpose()?;

        Ok(Self {
            options,
            encoding,
            except,
        })
    }

    /// Normalize the predicate's expected values. Selectors never apply here.
    pub fn expected(&self, value: &Value) -> Result<Option<Value>> {
        self.transform_all(value, false)
    }

    /// Normalize the request's actual values, applying selectors if configured.
    pub fn actual(&self, value: &Value) -> Result<Option<Value>> {
        if self.encoding.is_binary() {
            if self.options.xpath.is_some() {
                return Err(PredicateError::validation(
                    "the xpath predicate parameter is not allowed in binary mode",
                ));
            }
            if self.options.jsonpath.is_some() {
                return Err(PredicateError::validation(
                    "the jsonpath predicate parameter is not allowed in binary mode",
                ));
            }
        }
        self.transform_all(value, true)
    }

    fn transform_all(&self, value: &Value, with_selectors: bool) -> Result<Option<Value>> {
        match value {
            Value::Sequence(items) => {
                let mut normalized = Vec::with_capacity(items.len());
                for item in items {
                    if let Some(item) = self.transform_all(item, with_selectors)? {
                        normalized.push(item);
                    }
                }
                Value::sort_sequence(&mut normalized);
                Ok(Some(Value::Sequence(normalized)))
            }
            Value::Mapping(map) => {
                let mut normalized = Mapping::new();
                for (key, item) in map {
                    if let Some(item) = self.transform_all(item, with_selectors)? {
                        normalized.insert(self.fold_case(key), item);
                    }
                }
                Ok(Some(Value::Mapping(normalized)))
            }
            Value::Text(text) if !text.is_empty() => self.transform(text, with_selectors),
            Value::Text(_) if with_selectors => self.select(String::new()),
            other => Ok(Some(other.clone())),
        }
    }

    fn transform(&self, text: &str, with_selectors: bool) -> Result<Option<Value>> {
        let decoded = self.decode(text);
        let stripped = match &self.except {
            Some(except) => except.replace_all(&decoded, "").into_owned(),
            None => decoded,
        };
        let folded = self.fold_case(&stripped);

        if with_selectors {
            self.select(folded)
        } else {
            Ok(Some(Value::Text(folded)))
        }
    }

    /// Binary mode decodes leniently: symbols outside the alphabet are
    /// skipped and decoding stops at the first `=`. Text such as a
    /// `requestFrom` address still decodes to something rather than failing.
    fn decode(&self, text: &str) -> String {
        if !self.encoding.is_binary() {
            return text.to_string();
        }
        let bytes = LENIENT_BASE64.decode(base64_symbols(text)).unwrap_or_default();
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Selector expressions and namespace URIs are folded like the document,
    /// otherwise a case-insensitive predicate could never select anything.
    fn select(&self, text: String) -> Result<Option<Value>> {
        let mut selected = Some(Value::Text(text));

        if let Some(xpath) = &self.options.xpath {
            if let Some(Value::Text(text)) = &selected {
                let namespaces = xpath
                    .ns
                    .iter()
                    .map(|(prefix, uri)| (prefix.clone(), self.fold_case(uri)))
                    .collect();
                selected = select_xpath(text, &self.fold_case(&xpath.selector), &namespaces)?;
            }
        }

        if let Some(jsonpath) = &self.options.jsonpath {
            if let Some(Value::Text(text)) = &selected {
                selected = select_jsonpath(text, &self.fold_case(&jsonpath.selector))?;
            }
        }

        Ok(selected)
    }

    fn fold_case(&self, text: &str) -> String {
        if self.options.case_sensitive {
            text.to_string()
        } else {
            text.to_lowercase()
        }
    }
}

/// Base64 symbols of `text` up to the first `=`, URL-safe symbols mapped to
/// the standard alphabet. A dangling sixth bit group is dropped.
fn base64_symbols(text: &str) -> String {
    let mut symbols: String = text
        .chars()
        .take_while(|&c| c != '=')
        .filter_map(|c| match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '+' | '/' => Some(c),
            '-' => Some('+'),
            '_' => Some('/'),
            _ => None,
        })
        .collect();
    if symbols.len() % 4 == 1 {
        symbols.pop();
    }
    symbols
}
