//! Regex utilities for contract-probe
//! Extracted to a separate crate for compilation optimization

use once_cell::sync::Lazy;
use regex::Regex;

/// Natural-language invariant phrases such as "result is non-negative"
pub mod phrase {
    use super::*;

    /// `<subject> <copula> <predicate>` with an optional leading "the" and trailing period
    pub static SENTENCE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(
            r"^(?i:the\s+)?(?P<subject>(?i:return(?:ed)?\s+value)|[A-Za-z_][A-Za-z0-9_]*)\s+(?P<verb>(?i:is\s+always|must\s+always\s+be|must\s+be|should\s+be|will\s+be|is|are|has|have|contains|contain))\s+(?P<predicate>.+?)\s*\.?$",
        )
        .expect("Invalid regex pattern")
    });

    const NUMBER: &str = r"-?\d+(?:\.\d+)?";

    static BETWEEN: Lazy<Regex> = Lazy::new(|| {
        Regex::new(&format!(r"^(?i)between\s+(?P<lo>{NUMBER})\s+and\s+(?P<hi>{NUMBER})$"))
            .expect("Invalid regex pattern")
    });

    static BOUND: Lazy<Regex> = Lazy::new(|| {
        Regex::new(&format!(
            r"^(?i)(?P<op>at\s+least|at\s+most|greater\s+than\s+or\s+equal\s+to|less\s+than\s+or\s+equal\s+to|greater\s+than|less\s+than|>=|<=|>|<)\s*(?P<n>{NUMBER})$"
        ))
        .expect("Invalid regex pattern")
    });

    static TYPE_NAME: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"^(?i)(?:an?\s+)?(?P<ty>list|dict|dictionary|mapping|string|str|integer|int|float|number|bool|boolean|tuple|set)$")
            .expect("Invalid regex pattern")
    });

    /// A recognised predicate
    #[derive(Debug, Clone, PartialEq)]
    pub enum Predicate {
        NonNegative,
        Positive,
        Negative,
        NotEmpty,
        Empty,
        NotNone,
        IsNone,
        Sorted { descending: bool },
        Unique,
        TypeOf(String),
        Between(String, String),
        Compare { op: &'static str, bound: String },
    }

    /// A phrase split into its subject and predicate
    #[derive(Debug, Clone, PartialEq)]
    pub struct Phrase {
        pub subject: String,
        pub predicate: Predicate,
    }

    /// Parse a natural-language invariant, returning `None` when the text is not a known phrase
    pub fn parse(text: &str) -> Option<Phrase> {
        let caps = SENTENCE.captures(text.trim())?;
        let subject = caps.name("subject")?.as_str().to_string();
        let verb = caps.name("verb")?.as_str().to_lowercase();
        let predicate = caps.name("predicate")?.as_str().trim();

        let predicate = if verb.starts_with("ha") || verb.starts_with("contain") {
            possession(predicate)?
        } else {
            quality(predicate)?
        };

        Some(Phrase { subject, predicate })
    }

    fn possession(text: &str) -> Option<Predicate> {
        let lower = collapse(text);
        match lower.as_str() {
            "no duplicates" | "no duplicate values" | "no duplicate items" | "no duplicate entries"
            | "unique items" | "unique values" | "unique elements" | "only unique values" => {
                Some(Predicate::Unique)
            }
            "at least one item" | "at least one element" | "at least one entry" => {
                Some(Predicate::NotEmpty)
            }
            "no items" | "no elements" => Some(Predicate::Empty),
            _ => None,
        }
    }

    fn quality(text: &str) -> Option<Predicate> {
        let lower = collapse(text);
        let fixed = match lower.as_str() {
            "non-negative" | "nonnegative" | "not negative" | "never negative" | "zero or positive"
            | "zero or greater" => Some(Predicate::NonNegative),
            "positive" | "strictly positive" | "greater than zero" => Some(Predicate::Positive),
            "negative" | "strictly negative" | "less than zero" => Some(Predicate::Negative),
            "not empty" | "non-empty" | "nonempty" | "never empty" => Some(Predicate::NotEmpty),
            "empty" => Some(Predicate::Empty),
            "not none" | "not null" | "never none" | "never null" => Some(Predicate::NotNone),
            "none" | "null" => Some(Predicate::IsNone),
            "sorted" | "sorted ascending" | "in ascending order" | "sorted in ascending order" => {
                Some(Predicate::Sorted { descending: false })
            }
            "sorted descending" | "in descending order" | "sorted in descending order" => {
                Some(Predicate::Sorted { descending: true })
            }
            "unique" | "distinct" | "free of duplicates" => Some(Predicate::Unique),
            _ => None,
        };
        if fixed.is_some() {
            return fixed;
        }

        if let Some(caps) = BETWEEN.captures(&lower) {
            return Some(Predicate::Between(caps["lo"].to_string(), caps["hi"].to_string()));
        }

        if let Some(caps) = BOUND.captures(&lower) {
            let op = match caps["op"].split_whitespace().collect::<Vec<_>>().join(" ").as_str() {
                "at least" | "greater than or equal to" | ">=" => ">=",
                "at most" | "less than or equal to" | "<=" => "<=",
                "greater than" | ">" => ">",
                _ => "<",
            };
            return Some(Predicate::Compare { op, bound: caps["n"].to_string() });
        }

        TYPE_NAME.captures(&lower).map(|caps| Predicate::TypeOf(caps["ty"].to_string()))
    }

    fn collapse(text: &str) -> String {
        text.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

/// Identifier extraction used by root-cause keyword matching
pub mod identifiers {
    use super::*;

    pub static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"\b[a-z_][a-z0-9_]*\b").expect("Invalid regex pattern")
    });

    /// Lowercased identifiers of at least `min_len` characters, in order of first appearance
    pub fn extract(text: &str, min_len: usize) -> Vec<String> {
        let lower = text.to_lowercase();
        let mut seen = Vec::new();
        for m in IDENTIFIER.find_iter(&lower) {
            let word = m.as_str();
            if word.len() >= min_len && !seen.iter().any(|s: &String| s == word) {
                seen.push(word.to_string());
            }
        }
        seen
    }
}

/// Source-code shape patterns
pub mod code {
    use super::*;

    pub static PY_FUNCTION_DEF: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?m)^\s*(?:async\s+)?def\s+(?P<name>[A-Za-z_][A-Za-z0-9_]*)\s*\(")
            .expect("Invalid regex pattern")
    });

    pub static ARITHMETIC: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"[-+*/]").expect("Invalid regex pattern"));

    pub static DECIMAL_LITERAL: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"^[+-]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?$").expect("Invalid regex pattern")
    });

    pub static WHITESPACE_RUN: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"\s+").expect("Invalid regex pattern"));

    /// Name of the first Python function defined in `source`
    pub fn python_function_name(source: &str) -> Option<String> {
        PY_FUNCTION_DEF.captures(source).map(|caps| caps["name"].to_string())
    }

    /// True when the line holds an assignment whose right side does arithmetic
    pub fn is_arithmetic_assignment(line: &str) -> bool {
        line.contains('=') && ARITHMETIC.is_match(line)
    }

    /// True for an exact decimal literal such as `-12.50` or `1e-3`
    pub fn is_decimal_literal(text: &str) -> bool {
        DECIMAL_LITERAL.is_match(text)
    }
}

#[cfg(test)]
mod tests {
    use super::phrase::{Phrase, Predicate};
    use super::*;

    #[test]
    fn test_phrase_parsing() {
        assert_eq!(
            phrase::parse("result is non-negative"),
            Some(Phrase { subject: "result".to_string(), predicate: Predicate::NonNegative })
        );

        assert_eq!(
            phrase::parse("The output must not be empty."),
            None,
            "negated copula is not a recognised form"
        );

        assert_eq!(
            phrase::parse("Output is not empty."),
            Some(Phrase { subject: "Output".to_string(), predicate: Predicate::NotEmpty })
        );

        assert_eq!(
            phrase::parse("items has no duplicates"),
            Some(Phrase { subject: "items".to_string(), predicate: Predicate::Unique })
        );

        assert_eq!(
            phrase::parse("score is between 0 and 100"),
            Some(Phrase {
                subject: "score".to_string(),
                predicate: Predicate::Between("0".to_string(), "100".to_string())
            })
        );

        assert_eq!(
            phrase::parse("total is at least 10"),
            Some(Phrase {
                subject: "total".to_string(),
                predicate: Predicate::Compare { op: ">=", bound: "10".to_string() }
            })
        );

        assert_eq!(
            phrase::parse("result is a list"),
            Some(Phrase { subject: "result".to_string(), predicate: Predicate::TypeOf("list".to_string()) })
        );

        assert_eq!(phrase::parse("result >= 0"), None);
        assert_eq!(phrase::parse("Output equals input multiplied by 2"), None);
    }

    #[test]
    fn test_identifier_extraction() {
        assert_eq!(
            identifiers::extract("Invariant violated: result_total >= 0 (result=-1)", 3),
            vec!["invariant", "violated", "result_total", "result"]
        );
    }

    #[test]
    fn test_code_patterns() {
        assert_eq!(
            code::python_function_name("def compute(a, b):\n    return a - b\n"),
            Some("compute".to_string())
        );
        assert_eq!(
            code::python_function_name("    async def fetch(x):\n        pass"),
            Some("fetch".to_string())
        );
        assert!(code::is_arithmetic_assignment("total = a - b"));
        assert!(!code::is_arithmetic_assignment("return value"));
        assert!(code::is_decimal_literal("-12.50"));
        assert!(code::is_decimal_literal("1e-3"));
        assert!(!code::is_decimal_literal("12.5.1"));
        assert!(!code::is_decimal_literal("NaN"));
    }
}
