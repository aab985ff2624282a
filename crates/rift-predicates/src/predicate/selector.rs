//! Structured-document selection (XPath and JSONPath).
//!
//! Selection maps a request string to the values picked out of it:
//! nothing selected yields `None` (the field is absent), a single match yields
//! that scalar, several matches yield a sorted sequence. The sequence shape is
//! the same one a repeated query parameter has, so field predicates treat both
//! uniformly.

use crate::error::{PredicateError, Result};
use crate::value::Value;
use serde_json_path::JsonPath;
use std::collections::BTreeMap;
use sxd_document::dom::ChildOfElement;
use regex::Regex;
use sxd_document::parser;
use sxd_document::Package;
use sxd_xpath::nodeset::Node;
use sxd_xpath::{Context, Factory, XPath};
use tracing::debug;

const FRAGMENT_ROOT: &str = "rift-fragment";

/// Evaluate an XPath selector against an XML document held in `text`.
///
/// Fragments with several top-level elements and HTML with unclosed void
/// elements (`<br>`, `<img ...>`) are parsed under a synthetic root element.
/// Text that still does not parse selects nothing. A selector that does not
/// compile, or cannot be evaluated (e.g. an unbound namespace prefix), is a
/// validation error.
pub fn select_xpath(
    text: &str,
    selector: &str,
    namespaces: &BTreeMap<String, String>,
) -> Result<Option<Value>> {
    let xpath = compile_xpath(selector)?;

    let Some(package) = parse_document(text) else {
        debug!("xpath selector {selector} skipped, value is not XML");
        return Ok(None);
    };
    let document = package.as_document();

    let mut context = Context::new();
    for (prefix, uri) in namespaces {
        context.set_namespace(prefix, uri);
    }

    let result = xpath
        .evaluate(&context, document.root())
        .map_err(|e| malformed_xpath(selector, format!("{e:?}")))?;

    let values = match result {
        sxd_xpath::Value::Boolean(b) => return Ok(Some(Value::Bool(b))),
        sxd_xpath::Value::Number(n) => return Ok(Some(number_value(n))),
        sxd_xpath::Value::String(s) => return Ok(Some(Value::Text(s))),
        sxd_xpath::Value::Nodeset(nodes) => nodes
            .document_order()
            .into_iter()
            .map(|node| Value::Text(node_value(node)))
            .collect(),
    };

    Ok(collapse(values))
}

/// Evaluate a JSONPath selector against a JSON document held in `text`.
///
/// Text that is not JSON selects nothing.
pub fn select_jsonpath(text: &str, selector: &str) -> Result<Option<Value>> {
    let path = JsonPath::parse(selector).map_err(|e| {
        PredicateError::validation_with_context(
            "malformed jsonpath predicate selector",
            format!("{selector}: {e}"),
        )
    })?;

    let json: serde_json::Value = match serde_json::from_str(text) {
        Ok(json) => json,
        Err(e) => {
            debug!("jsonpath selector {selector} skipped, value is not JSON: {e}");
            return Ok(None);
        }
    };

    let values = path
        .query(&json)
        .all()
        .into_iter()
        .map(|node| match node {
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                Value::Text(node.to_string())
            }
            scalar => Value::from(scalar.clone()),
        })
        .collect();

    Ok(collapse(values))
}

/// Strict parse first, then the text as a fragment, then the fragment with
/// HTML void elements closed.
fn parse_document(text: &str) -> Option<Package> {
    if let Ok(package) = parser::parse(text) {
        return Some(package);
    }
    let body = strip_prolog(text);
    if let Ok(package) = parser::parse(&wrap_fragment(body)) {
        return Some(package);
    }
    let closed = close_void_elements(body)?;
    parser::parse(&wrap_fragment(&closed)).ok()
}

fn strip_prolog(text: &str) -> &str {
    let mut rest = text.trim_start();
    for (open, close) in [("<?xml", "?>"), ("<!DOCTYPE", ">"), ("<!doctype", ">")] {
        if rest.starts_with(open) {
            if let Some(end) = rest.find(close) {
                rest = rest[end + close.len()..].trim_start();
            }
        }
    }
    rest
}

fn wrap_fragment(body: &str) -> String {
    format!("<{FRAGMENT_ROOT}>{body}</{FRAGMENT_ROOT}>")
}

fn close_void_elements(body: &str) -> Option<String> {
    let void = Regex::new(
        r"(?i)<(area|base|br|col|embed|hr|img|input|link|meta|param|source|track|wbr)\b([^<>]*?)\s*/?>",
    )
    .ok()?;
    Some(void.replace_all(body, "<$1$2/>").into_owned())
}

fn compile_xpath(selector: &str) -> Result<XPath> {
    Factory::new()
        .build(selector)
        .map_err(|e| malformed_xpath(selector, format!("{e:?}")))?
        .ok_or_else(|| malformed_xpath(selector, "empty expression".to_string()))
}

fn malformed_xpath(selector: &str, inner: String) -> PredicateError {
    PredicateError::validation_with_context(
        "malformed xpath predicate selector",
        format!("{selector}: {inner}"),
    )
}

/// Text of a selected node: an element's first text child, a text node's
/// text, an attribute's value.
fn node_value(node: Node<'_>) -> String {
    match node {
        Node::Text(text) => text.text().to_string(),
        Node::Attribute(attribute) => attribute.value().to_string(),
        Node::Element(element) => match element.children().first() {
            Some(ChildOfElement::Text(text)) => text.text().to_string(),
            _ => Node::Element(element).string_value(),
        },
        other => other.string_value(),
    }
}

fn number_value(n: f64) -> Value {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        return Value::Number((n as i64).into());
    }
    serde_json::Number::from_f64(n)
        .map(Value::Number)
        .unwrap_or_else(|| Value::Text(n.to_string()))
}

/// Zero results: absent. One: the scalar. Several: a sorted sequence.
fn collapse(mut values: Vec<Value>) -> Option<Value> {
    match values.len() {
        0 => None,
        1 => values.pop(),
        _ => {
            Value::sort_sequence(&mut values);
            Some(Value::Sequence(values))
        }
    }
}
