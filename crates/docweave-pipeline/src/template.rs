//! Prompt templates - `{name}` substitution over a declared variable set.
//!
//! Templates are checked against the declared names when an agent or task is
//! registered, so a typo in a prompt fails the run before any model call.
//! `{{` and `}}` produce literal braces. A brace that does not open a
//! well-formed `{identifier}` is left as written.

use docweave_core::{Error, Result};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

/// Name of the variable every run declares.
pub const TOPIC: &str = "topic";

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{|\}\}|\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder regex is valid")
    })
}

/// Names a template may reference. Always contains `topic`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VarSet(BTreeSet<String>);

impl Default for VarSet {
    fn default() -> Self {
        Self(BTreeSet::from([TOPIC.to_string()]))
    }
}

impl VarSet {
    pub fn with(mut self, name: impl Into<String>) -> Self {
        self.0.insert(name.into());
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Fail with `Configuration` if `template` references an undeclared name.
    /// `owner` names the agent or task for the error message.
    pub fn check(&self, owner: &str, template: &str) -> Result<()> {
        match placeholders(template).into_iter().find(|p| !self.contains(p)) {
            Some(unknown) => Err(Error::config(format!(
                "{} references undeclared template variable '{{{}}}'",
                owner, unknown
            ))),
            None => Ok(()),
        }
    }
}

/// Values bound for one run.
#[derive(Clone, Debug, Default)]
pub struct TemplateVars {
    pub topic: String,
    pub extra: BTreeMap<String, String>,
}

impl TemplateVars {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            extra: BTreeMap::new(),
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        if name == TOPIC {
            Some(&self.topic)
        } else {
            self.extra.get(name).map(String::as_str)
        }
    }

    /// Check that every declared name has a value.
    pub fn covers(&self, declared: &VarSet) -> Result<()> {
        match declared.iter().find(|name| self.get(name).is_none()) {
            Some(missing) => Err(Error::config(format!(
                "template variable '{}' is declared but has no value",
                missing
            ))),
            None => Ok(()),
        }
    }
}

/// Variable names referenced by `template`, in order of first appearance.
pub fn placeholders(template: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for caps in placeholder_re().captures_iter(template) {
        if let Some(name) = caps.get(1) {
            if !seen.iter().any(|s| s == name.as_str()) {
                seen.push(name.as_str().to_string());
            }
        }
    }
    seen
}

/// Substitute every placeholder. Unbound names are a `Configuration` error.
pub fn render(template: &str, vars: &TemplateVars) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut last = 0;
    for caps in placeholder_re().captures_iter(template) {
        let whole = caps.get(0).map(|m| (m.start(), m.end(), m.as_str()));
        let Some((start, end, text)) = whole else { continue };
        out.push_str(&template[last..start]);
        match caps.get(1) {
            Some(name) => {
                let value = vars.get(name.as_str()).ok_or_else(|| {
                    Error::config(format!("no value for template variable '{}'", name.as_str()))
                })?;
                out.push_str(value);
            }
            None => out.push_str(&text[..1]),
        }
        last = end;
    }
    out.push_str(&template[last..]);
    Ok(out)
}
