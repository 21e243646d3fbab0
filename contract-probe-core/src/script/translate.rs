//! Turning invariant text into a Python boolean expression
//!
//! Recognised phrases are rewritten into Python. Anything else must already
//! be a single Python expression; it is lexed and rejected when it contains
//! statements, assignments, several lines, or reads like prose.

use regex_utils::phrase::{self, Predicate};

use super::lexer::{self, OPERATOR_KEYWORDS, STATEMENT_KEYWORDS, Token, TokenKind};

/// Names the worker binds to the function's return value
const RESULT_SUBJECTS: &[&str] = &["result", "output", "return value", "returned value", "returnvalue"];

/// Operand keywords that behave like values
const VALUE_KEYWORDS: &[&str] = &["None", "True", "False"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub python: String,
    /// True when the text was a recognised phrase rather than a Python expression
    pub from_phrase: bool,
}

/// Translate invariant text, or explain why it cannot be evaluated
pub fn translate(text: &str) -> Result<Translation, String> {
    let text = text.trim();
    if text.is_empty() {
        return Err("expression is empty".to_string());
    }

    if let Some(parsed) = phrase::parse(text) {
        let python = render_phrase(&subject_name(&parsed.subject), &parsed.predicate);
        return Ok(Translation { python, from_phrase: true });
    }

    validate_expression(text)?;
    Ok(Translation { python: text.to_string(), from_phrase: false })
}

fn subject_name(subject: &str) -> String {
    let collapsed = subject.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase();
    if RESULT_SUBJECTS.contains(&collapsed.as_str()) {
        "result".to_string()
    } else {
        subject.to_string()
    }
}

fn python_type(name: &str) -> &'static str {
    match name {
        "list" => "list",
        "dict" | "dictionary" | "mapping" => "dict",
        "string" | "str" => "str",
        "integer" | "int" => "int",
        "float" => "float",
        "number" => "(int, float, decimal.Decimal)",
        "bool" | "boolean" => "bool",
        "tuple" => "tuple",
        "set" => "(set, frozenset)",
        _ => "object",
    }
}

fn render_phrase(subject: &str, predicate: &Predicate) -> String {
    match predicate {
        Predicate::NonNegative => format!("{subject} >= 0"),
        Predicate::Positive => format!("{subject} > 0"),
        Predicate::Negative => format!("{subject} < 0"),
        Predicate::NotEmpty => format!("not _is_empty({subject})"),
        Predicate::Empty => format!("_is_empty({subject})"),
        Predicate::NotNone => format!("{subject} is not None"),
        Predicate::IsNone => format!("{subject} is None"),
        Predicate::Sorted { descending } => {
            let flag = if *descending { "True" } else { "False" };
            format!("_is_sorted({subject}, descending={flag})")
        }
        Predicate::Unique => format!("_no_duplicates({subject})"),
        Predicate::TypeOf(ty) => format!("isinstance({subject}, {})", python_type(ty)),
        Predicate::Between(lo, hi) => format!("{lo} <= {subject} <= {hi}"),
        Predicate::Compare { op, bound } => format!("{subject} {op} {bound}"),
    }
}

fn ends_operand(token: &Token) -> bool {
    match token.kind {
        TokenKind::Name => {
            VALUE_KEYWORDS.contains(&token.text.as_str())
                || !OPERATOR_KEYWORDS.contains(&token.text.as_str())
        }
        TokenKind::Number | TokenKind::Str | TokenKind::Close => true,
        _ => false,
    }
}

fn starts_operand(token: &Token, previous: &Token) -> bool {
    match token.kind {
        TokenKind::Name => !OPERATOR_KEYWORDS.contains(&token.text.as_str()),
        TokenKind::Number => true,
        // Adjacent string literals concatenate
        TokenKind::Str => previous.kind != TokenKind::Str,
        _ => false,
    }
}

/// Check that `text` is one well-formed Python expression
pub fn validate_expression(text: &str) -> Result<(), String> {
    let tokens = lexer::tokenize(text).map_err(|e| e.message)?;
    let body: Vec<&Token> = tokens.iter().filter(|t| t.kind != TokenKind::Newline).collect();

    if tokens.iter().filter(|t| t.kind == TokenKind::Newline).count() > 1 {
        return Err("expression spans several lines".to_string());
    }
    let Some(first) = body.first() else {
        return Err("expression is empty".to_string());
    };
    if first.kind == TokenKind::Name && STATEMENT_KEYWORDS.contains(&first.text.as_str()) {
        return Err(format!("'{}' starts a statement, not an expression", first.text));
    }

    let mut depth = 0usize;
    let mut previous: Option<&Token> = None;
    for token in &body {
        match token.kind {
            TokenKind::Open => depth += 1,
            TokenKind::Close => depth = depth.saturating_sub(1),
            TokenKind::Op => match token.text.as_str() {
                ";" => return Err("';' separates statements".to_string()),
                "=" if depth == 0 => {
                    return Err("assignment is not allowed; use '==' to compare".to_string());
                }
                op if op.len() >= 2 && op.ends_with('=') && !matches!(op, "==" | "!=" | "<=" | ">=") => {
                    return Err(format!("augmented assignment '{}' is not allowed", op));
                }
                _ => {}
            },
            _ => {}
        }

        if let Some(prev) = previous {
            if ends_operand(prev) && starts_operand(token, prev) {
                return Err(format!(
                    "unexpected '{}' after '{}'; this reads like prose, not an expression",
                    token.text, prev.text
                ));
            }
        }
        previous = Some(token);
    }

    if let Some(last) = body.last() {
        let dangling_keyword = last.kind == TokenKind::Name
            && OPERATOR_KEYWORDS.contains(&last.text.as_str());
        let dangling_op = last.kind == TokenKind::Op && !matches!(last.text.as_str(), "...");
        if dangling_keyword || dangling_op {
            return Err(format!("expression ends with '{}'", last.text));
        }
    }

    Ok(())
}
