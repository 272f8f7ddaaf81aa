//! Default router rule template
//!
//! Supported actions inside `{{ }}`: `.Name`, `normalize .Name`,
//! `index .Labels "key"` and `normalize (index .Labels "key")`.

use crate::{CoreError, Result};
use std::collections::BTreeMap;

/// Template used when no default rule is configured
pub const DEFAULT_TEMPLATE_RULE: &str = "Host(`{{ normalize .Name }}`)";

/// Replace every run of characters that are neither letters nor digits by `-`.
pub fn normalize(name: &str) -> String {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[derive(Clone, Debug, PartialEq)]
enum Value {
    Name,
    Label(String),
}

#[derive(Clone, Debug, PartialEq)]
enum Segment {
    Text(String),
    Value { value: Value, normalize: bool },
}

/// A parsed default rule, rendered once per service
#[derive(Clone, Debug, PartialEq)]
pub struct DefaultRuleTemplate {
    segments: Vec<Segment>,
}

impl DefaultRuleTemplate {
    pub fn parse(template: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut rest = template;

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                segments.push(Segment::Text(rest[..start].to_string()));
            }
            let after = &rest[start + 2..];
            let end = after
                .find("}}")
                .ok_or_else(|| CoreError::InvalidTemplate(format!("unclosed action in {:?}", template)))?;
            segments.push(parse_action(after[..end].trim())?);
            rest = &after[end + 2..];
        }

        if rest.contains("}}") {
            return Err(CoreError::InvalidTemplate(format!("unexpected }}}} in {:?}", template)));
        }
        if !rest.is_empty() {
            segments.push(Segment::Text(rest.to_string()));
        }

        Ok(Self { segments })
    }

    pub fn render(&self, name: &str, labels: &BTreeMap<String, String>) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => out.push_str(text),
                Segment::Value { value, normalize: norm } => {
                    let raw = match value {
                        Value::Name => name,
                        Value::Label(key) => labels.get(key).map(String::as_str).unwrap_or(""),
                    };
                    if *norm {
                        out.push_str(&normalize(raw));
                    } else {
                        out.push_str(raw);
                    }
                }
            }
        }
        out
    }
}

impl Default for DefaultRuleTemplate {
    fn default() -> Self {
        Self::parse(DEFAULT_TEMPLATE_RULE).unwrap_or(Self { segments: Vec::new() })
    }
}

fn parse_action(action: &str) -> Result<Segment> {
    if let Some(inner) = action.strip_prefix("normalize ") {
        let inner = inner.trim();
        let inner = inner
            .strip_prefix('(')
            .and_then(|s| s.strip_suffix(')'))
            .map(str::trim)
            .unwrap_or(inner);
        return Ok(Segment::Value {
            value: parse_value(inner)?,
            normalize: true,
        });
    }

    Ok(Segment::Value {
        value: parse_value(action)?,
        normalize: false,
    })
}

fn parse_value(expr: &str) -> Result<Value> {
    if expr == ".Name" {
        return Ok(Value::Name);
    }

    if let Some(key) = expr.strip_prefix("index .Labels ") {
        let key = key.trim();
        if key.len() >= 2 && key.starts_with('"') && key.ends_with('"') {
            return Ok(Value::Label(key[1..key.len() - 1].to_string()));
        }
    }

    Err(CoreError::InvalidTemplate(format!("unsupported action {:?}", expr)))
}
