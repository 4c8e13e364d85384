use crate::error::{LeniencyPolicy, Result, StencilError};
use regex::{Captures, Regex};
use serde_json::Value;
use std::sync::{Arc, LazyLock};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z0-9_.]+)\}").expect("placeholder pattern compiles"));

/// A template engine that fills `{placeholders}` from a data payload.
/// Placeholders it cannot fill must be left in place.
pub trait Substitute: Send + Sync {
    fn substitute(&self, template: &str, data: &Value) -> String;
}

/// `{dotted.path}` lookup through objects and array indices. Strings are
/// inserted verbatim, numbers and booleans as their JSON text, `null` as
/// nothing. Objects and arrays are not substituted.
#[derive(Debug, Clone, Copy, Default)]
pub struct DottedPathEngine;

impl Substitute for DottedPathEngine {
    fn substitute(&self, template: &str, data: &Value) -> String {
        PLACEHOLDER
            .replace_all(template, |caps: &Captures<'_>| {
                match lookup(data, &caps[1]).and_then(scalar_text) {
                    Some(text) => text,
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

pub fn lookup<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(data, |node, segment| match node {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null => Some(String::new()),
        Value::Array(_) | Value::Object(_) => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rendered {
    pub text: String,
    /// Placeholders that were blanked, in order of appearance.
    pub unresolved: Vec<String>,
}

/// Runs the substitution engine, then blanks every placeholder it left.
#[derive(Clone)]
pub struct VariableRenderer {
    engine: Arc<dyn Substitute>,
    policy: LeniencyPolicy,
}

impl Default for VariableRenderer {
    fn default() -> Self {
        Self::new(Arc::new(DottedPathEngine), LeniencyPolicy::Lenient)
    }
}

impl VariableRenderer {
    pub fn new(engine: Arc<dyn Substitute>, policy: LeniencyPolicy) -> Self {
        Self { engine, policy }
    }

    pub fn policy(&self) -> LeniencyPolicy {
        self.policy
    }

    pub fn render(&self, template: &str, data: &Value) -> Result<Rendered> {
        let substituted = self.engine.substitute(template, data);
        let unresolved: Vec<String> = PLACEHOLDER
            .captures_iter(&substituted)
            .map(|caps| caps[1].to_string())
            .collect();
        if unresolved.is_empty() {
            return Ok(Rendered {
                text: substituted,
                unresolved,
            });
        }
        if self.policy.is_strict() {
            return Err(StencilError::UnresolvedVariable(unresolved.join(", ")));
        }
        log::warn!("blanking unresolved template variables: {}", unresolved.join(", "));
        Ok(Rendered {
            text: PLACEHOLDER.replace_all(&substituted, "").into_owned(),
            unresolved,
        })
    }
}

impl std::fmt::Debug for VariableRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VariableRenderer")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
