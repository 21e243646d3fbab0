use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use super::prelude::{ENTRY_POINT, MAIN, PRELUDE};
use super::translate::translate;
use super::validate::validate_script;
use crate::contract::Contract;
use crate::error::{ProbeError, Result};
use crate::hashing::Language;

/// Source of the function under test, as supplied by the artifact store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSource {
    pub function_name: String,
    pub body: String,
    pub language: Language,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    Precondition,
    Invariant,
    Postcondition,
    ExpectedOutput,
}

impl CheckKind {
    fn label(self) -> &'static str {
        match self {
            CheckKind::Precondition => "precondition",
            CheckKind::Invariant => "invariant",
            CheckKind::Postcondition => "postcondition",
            CheckKind::ExpectedOutput => "expected output",
        }
    }
}

/// One boolean check in a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Check {
    pub name: String,
    pub kind: CheckKind,
    /// Text as written in the contract
    pub source: String,
    /// Python expression the worker evaluates
    pub python: String,
}

/// Python function embedded into the worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbeddedTarget {
    pub name: String,
    pub source: String,
}

/// Intermediate form of a worker, rendered into text afterwards
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptPlan {
    pub function_id: String,
    pub target: Option<EmbeddedTarget>,
    pub preconditions: Vec<Check>,
    pub checks: Vec<Check>,
    pub contract_fingerprint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedScript {
    pub text: String,
    /// SHA-256 of `text`
    pub hash: String,
    /// Fingerprint of the contract the script was built from
    pub fingerprint: String,
}

/// Compiles contracts into self-contained Python verification workers
#[derive(Debug, Clone, Default)]
pub struct ScriptGenerator;

impl ScriptGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Plan, render, validate and hash a worker
    pub fn generate(&self, contract: &Contract, target: Option<&TargetSource>) -> Result<GeneratedScript> {
        let plan = self.plan(contract, target)?;
        let text = self.render(&plan);
        validate_script(&text)?;

        let hash = script_hash(&text);
        debug!(
            "Generated verification script for {} ({} checks, hash {})",
            contract.function_id,
            plan.preconditions.len() + plan.checks.len(),
            &hash[..12]
        );

        Ok(GeneratedScript { text, hash, fingerprint: plan.contract_fingerprint })
    }

    /// Build the intermediate plan, failing on the first malformed expression
    pub fn plan(&self, contract: &Contract, target: Option<&TargetSource>) -> Result<ScriptPlan> {
        contract.validate()?;

        let mut preconditions = Vec::new();
        if let Some(text) = &contract.precondition {
            preconditions.push(check("precondition", CheckKind::Precondition, text)?);
        }

        let mut checks = Vec::with_capacity(contract.invariants.len() + 2);
        for invariant in &contract.invariants {
            checks.push(check(&invariant.name, CheckKind::Invariant, &invariant.expression)?);
        }
        if let Some(text) = &contract.postcondition {
            checks.push(check("postcondition", CheckKind::Postcondition, text)?);
        }
        checks.push(Check {
            name: "expected_output".to_string(),
            kind: CheckKind::ExpectedOutput,
            source: "result equals the expected output".to_string(),
            python: "_equals(result, expected)".to_string(),
        });

        let target = match target {
            Some(source) if source.language == Language::Python => Some(embed(source)?),
            Some(source) => {
                debug!(
                    "Target {} is {:?}; worker will only check observed outputs",
                    source.function_name, source.language
                );
                None
            }
            None => None,
        };

        Ok(ScriptPlan {
            function_id: contract.function_id.clone(),
            target,
            preconditions,
            checks,
            contract_fingerprint: contract.fingerprint(),
        })
    }

    /// Render a plan into worker text. Deterministic for a given plan.
    pub fn render(&self, plan: &ScriptPlan) -> String {
        let mut out = String::new();
        out.push_str("#!/usr/bin/env python3\n");
        out.push_str("# Generated verification worker. Do not edit.\n");
        out.push_str(PRELUDE);
        out.push('\n');
        out.push_str(&format!("FUNCTION_ID = {}\n", py_str(&plan.function_id)));
        out.push_str(&format!("CONTRACT_FINGERPRINT = {}\n\n", py_str(&plan.contract_fingerprint)));

        match &plan.target {
            Some(target) => {
                out.push_str(&target.source);
                if !target.source.ends_with('\n') {
                    out.push('\n');
                }
                out.push_str(&format!("\n\n_target = {}\n\n", target.name));
            }
            None => out.push_str("_target = None\n\n"),
        }

        let preconditions: Vec<String> = plan
            .preconditions
            .iter()
            .map(|c| format!("({}, {})", py_str(&c.name), py_str(&c.python)))
            .collect();
        out.push_str(&py_list("_PRECONDITIONS", &preconditions));

        let checks: Vec<String> = plan
            .checks
            .iter()
            .map(|c| {
                let needs_expected = if c.kind == CheckKind::ExpectedOutput { "True" } else { "False" };
                format!(
                    "({}, {}, {}, {})",
                    py_str(&c.name),
                    py_str(&c.python),
                    py_str(c.kind.label()),
                    needs_expected
                )
            })
            .collect();
        out.push_str(&py_list("_CHECKS", &checks));

        out.push_str("\n\n");
        out.push_str(MAIN);
        out.push_str("\n\n");
        out.push_str(ENTRY_POINT);
        out
    }
}

/// SHA-256 hex digest of script text
pub fn script_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn check(name: &str, kind: CheckKind, text: &str) -> Result<Check> {
    let translation = translate(text).map_err(|reason| {
        ProbeError::Script(format!("Malformed {} '{}' ({}): {}", kind.label(), name, text.trim(), reason))
    })?;
    Ok(Check {
        name: name.to_string(),
        kind,
        source: text.to_string(),
        python: translation.python,
    })
}

fn embed(target: &TargetSource) -> Result<EmbeddedTarget> {
    let source = dedent(&target.body);
    let name = regex_utils::code::python_function_name(&source).ok_or_else(|| {
        ProbeError::Script(format!(
            "Target source for {} does not define a function",
            target.function_name
        ))
    })?;
    if name != target.function_name {
        debug!("Target defines {} where {} was expected; using {}", name, target.function_name, name);
    }
    Ok(EmbeddedTarget { name, source })
}

/// Remove the common leading whitespace of all non-blank lines
fn dedent(text: &str) -> String {
    let margin = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.len() - line.trim_start().len())
        .min()
        .unwrap_or(0);

    text.lines()
        .map(|line| {
            if line.trim().is_empty() {
                ""
            } else {
                line.get(margin..).unwrap_or_else(|| line.trim_start())
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Python string literal for `text`. JSON string escapes are valid Python.
fn py_str(text: &str) -> String {
    serde_json::Value::String(text.to_string()).to_string()
}

fn py_list(name: &str, items: &[String]) -> String {
    if items.is_empty() {
        return format!("{} = []\n", name);
    }
    let mut out = format!("{} = [\n", name);
    for item in items {
        out.push_str("    ");
        out.push_str(item);
        out.push_str(",\n");
    }
    out.push_str("]\n");
    out
}
