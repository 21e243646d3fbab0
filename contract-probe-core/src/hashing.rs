//! Normalised source hashing for change detection
//!
//! Two bodies that differ only in comments, docstrings or whitespace hash
//! identically, so reformatting a function does not mark its contract stale.

use regex_utils::code::WHITESPACE_RUN;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    Javascript,
    Cpp,
    #[default]
    #[serde(other)]
    Unknown,
}

impl Language {
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "python" | "py" => Language::Python,
            "javascript" | "js" | "typescript" | "ts" => Language::Javascript,
            "cpp" | "c++" | "cxx" | "c" => Language::Cpp,
            _ => Language::Unknown,
        }
    }
}

/// SHA-256 hex digest of the normalised body
pub fn code_hash(body: &str, language: Language) -> String {
    let normalized = normalize(body, language);
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Strip comments, trim and collapse whitespace, drop blank lines
pub fn normalize(body: &str, language: Language) -> String {
    let stripped = match language {
        Language::Python => strip_python_comments(body),
        Language::Javascript | Language::Cpp => strip_c_comments(body),
        Language::Unknown => body.to_string(),
    };

    stripped
        .lines()
        .map(|line| WHITESPACE_RUN.replace_all(line.trim(), " ").into_owned())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Copy a quoted literal starting at `i` into `out`, returning the index past it
fn copy_literal(chars: &[char], mut i: usize, quote: char, out: &mut String) -> usize {
    out.push(chars[i]);
    i += 1;
    while i < chars.len() && chars[i] != quote {
        if chars[i] == '\\' && i + 1 < chars.len() {
            out.push(chars[i]);
            out.push(chars[i + 1]);
            i += 2;
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }
    if i < chars.len() {
        out.push(chars[i]);
        i += 1;
    }
    i
}

fn starts_with(chars: &[char], i: usize, pat: &str) -> bool {
    let mut idx = i;
    for c in pat.chars() {
        if chars.get(idx) != Some(&c) {
            return false;
        }
        idx += 1;
    }
    true
}

/// Skip forward until `end` has been consumed, or to the end of input
fn skip_past(chars: &[char], mut i: usize, end: &str) -> usize {
    while i < chars.len() {
        if starts_with(chars, i, end) {
            return i + end.chars().count();
        }
        i += 1;
    }
    chars.len()
}

fn skip_line(chars: &[char], mut i: usize) -> usize {
    while i < chars.len() && chars[i] != '\n' {
        i += 1;
    }
    i
}

fn strip_python_comments(code: &str) -> String {
    let chars: Vec<char> = code.chars().collect();
    let mut out = String::with_capacity(code.len());
    let mut i = 0;

    while i < chars.len() {
        if starts_with(&chars, i, "\"\"\"") {
            i = skip_past(&chars, i + 3, "\"\"\"");
        } else if starts_with(&chars, i, "'''") {
            i = skip_past(&chars, i + 3, "'''");
        } else if chars[i] == '"' || chars[i] == '\'' {
            i = copy_literal(&chars, i, chars[i], &mut out);
        } else if chars[i] == '#' {
            i = skip_line(&chars, i);
        } else {
            out.push(chars[i]);
            i += 1;
        }
    }

    out
}

fn strip_c_comments(code: &str) -> String {
    let chars: Vec<char> = code.chars().collect();
    let mut out = String::with_capacity(code.len());
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '"' | '\'' | '`' => i = copy_literal(&chars, i, chars[i], &mut out),
            '/' if starts_with(&chars, i, "/*") => i = skip_past(&chars, i + 2, "*/"),
            '/' if starts_with(&chars, i, "//") => i = skip_line(&chars, i),
            c => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}
