//! A small Python tokenizer
//!
//! Enough of the lexical grammar to validate expressions and generated
//! scripts before they reach an interpreter: names, numbers, string literals
//! (prefixed, triple-quoted, escaped), comments, operators and bracket
//! nesting. Newlines inside brackets or after a backslash are joined, as
//! Python does, and only logical line ends produce [`TokenKind::Newline`].

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Name,
    Number,
    Str,
    Op,
    Open,
    Close,
    Newline,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    /// 1-based physical line
    pub line: usize,
    /// Column of the first character, tabs expanded to multiples of 8
    pub col: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub line: usize,
    pub message: String,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.message)
    }
}

const OPERATORS: &[&str] = &[
    "**=", "//=", ">>=", "<<=", "...", "->", ":=", "==", "!=", "<=", ">=", "**", "//", "<<", ">>",
    "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "@=", "+", "-", "*", "/", "%", "@", "&", "|",
    "^", "~", "<", ">", "=", ".", ",", ":", ";", "!", "?", "$", "`", "\\",
];

const STRING_PREFIXES: &[&str] =
    &["r", "u", "b", "f", "br", "rb", "fr", "rf", "R", "U", "B", "F", "Br", "Rb"];

struct Lexer {
    chars: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
    depth: Vec<char>,
    tokens: Vec<Token>,
}

/// Tokenize Python source text
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    let mut lexer = Lexer {
        chars: source.chars().collect(),
        pos: 0,
        line: 1,
        col: 0,
        depth: Vec::new(),
        tokens: Vec::new(),
    };
    lexer.run()?;
    Ok(lexer.tokens)
}

impl Lexer {
    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn error(&self, message: impl Into<String>) -> LexError {
        LexError { line: self.line, message: message.into() }
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek(0)?;
        self.pos += 1;
        match c {
            '\n' => {
                self.line += 1;
                self.col = 0;
            }
            '\t' => self.col = (self.col / 8 + 1) * 8,
            _ => self.col += 1,
        }
        Some(c)
    }

    fn push(&mut self, kind: TokenKind, text: String, line: usize, col: usize) {
        self.tokens.push(Token { kind, text, line, col });
    }

    fn run(&mut self) -> Result<(), LexError> {
        while let Some(c) = self.peek(0) {
            let (line, col) = (self.line, self.col);
            match c {
                '\n' => {
                    self.advance();
                    let at_line_end = self.tokens.last().is_some_and(|t| t.kind != TokenKind::Newline);
                    if self.depth.is_empty() && at_line_end {
                        self.push(TokenKind::Newline, "\n".to_string(), line, col);
                    }
                }
                ' ' | '\t' | '\r' | '\x0c' => {
                    self.advance();
                }
                '#' => {
                    while self.peek(0).is_some_and(|c| c != '\n') {
                        self.advance();
                    }
                }
                '\\' if self.peek(1) == Some('\n') => {
                    self.advance();
                    self.advance();
                }
                '"' | '\'' => self.string(String::new(), line, col)?,
                '(' | '[' | '{' => {
                    self.advance();
                    self.depth.push(c);
                    self.push(TokenKind::Open, c.to_string(), line, col);
                }
                ')' | ']' | '}' => {
                    self.advance();
                    let expected = match c {
                        ')' => '(',
                        ']' => '[',
                        _ => '{',
                    };
                    match self.depth.pop() {
                        Some(open) if open == expected => {}
                        Some(open) => {
                            return Err(self.error(format!("'{}' does not match '{}'", c, open)));
                        }
                        None => return Err(self.error(format!("unmatched '{}'", c))),
                    }
                    self.push(TokenKind::Close, c.to_string(), line, col);
                }
                c if c.is_ascii_digit() || (c == '.' && self.peek(1).is_some_and(|n| n.is_ascii_digit())) => {
                    self.number(line, col)
                }
                c if c == '_' || c.is_alphabetic() => self.name(line, col)?,
                _ => self.operator(line, col)?,
            }
        }

        if let Some(open) = self.depth.last() {
            return Err(self.error(format!("'{}' was never closed", open)));
        }
        if self.tokens.last().is_some_and(|t| t.kind != TokenKind::Newline) {
            let (line, col) = (self.line, self.col);
            self.push(TokenKind::Newline, String::new(), line, col);
        }
        Ok(())
    }

    fn name(&mut self, line: usize, col: usize) -> Result<(), LexError> {
        let mut text = String::new();
        while let Some(c) = self.peek(0) {
            if c == '_' || c.is_alphanumeric() {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        if matches!(self.peek(0), Some('"') | Some('\'')) && STRING_PREFIXES.contains(&text.as_str()) {
            return self.string(text, line, col);
        }
        self.push(TokenKind::Name, text, line, col);
        Ok(())
    }

    fn number(&mut self, line: usize, col: usize) {
        let mut text = String::new();
        while let Some(c) = self.peek(0) {
            let exponent_sign = (c == '+' || c == '-')
                && text.ends_with(['e', 'E'])
                && !text.starts_with("0x")
                && !text.starts_with("0X");
            if c.is_ascii_alphanumeric() || c == '_' || c == '.' || exponent_sign {
                text.push(c);
                self.advance();
            } else {
                break;
            }
        }
        self.push(TokenKind::Number, text, line, col);
    }

    fn string(&mut self, prefix: String, line: usize, col: usize) -> Result<(), LexError> {
        let mut text = prefix;
        let quote = self.advance().unwrap_or('"');
        text.push(quote);
        let triple = self.peek(0) == Some(quote) && self.peek(1) == Some(quote);
        if triple {
            text.push(quote);
            text.push(quote);
            self.advance();
            self.advance();
        }

        loop {
            let Some(c) = self.advance() else {
                return Err(LexError { line, message: "unterminated string literal".to_string() });
            };
            text.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = self.advance() {
                        text.push(escaped);
                    }
                }
                '\n' if !triple => {
                    return Err(LexError { line, message: "unterminated string literal".to_string() });
                }
                c if c == quote => {
                    if !triple {
                        break;
                    }
                    if self.peek(0) == Some(quote) && self.peek(1) == Some(quote) {
                        text.push(quote);
                        text.push(quote);
                        self.advance();
                        self.advance();
                        break;
                    }
                }
                _ => {}
            }
        }

        self.push(TokenKind::Str, text, line, col);
        Ok(())
    }

    fn operator(&mut self, line: usize, col: usize) -> Result<(), LexError> {
        for &op in OPERATORS {
            let matches = op.chars().enumerate().all(|(i, c)| self.peek(i) == Some(c));
            if matches {
                if matches!(op, "!" | "?" | "$" | "`" | "\\") {
                    return Err(self.error(format!("invalid character '{}'", op)));
                }
                for _ in 0..op.chars().count() {
                    self.advance();
                }
                self.push(TokenKind::Op, op.to_string(), line, col);
                return Ok(());
            }
        }
        let c = self.peek(0).unwrap_or(' ');
        Err(self.error(format!("invalid character '{}'", c)))
    }
}

/// Keywords that join or modify operands inside an expression
pub const OPERATOR_KEYWORDS: &[&str] =
    &["and", "or", "not", "in", "is", "if", "else", "for", "lambda", "async", "await"];

/// Keywords that only begin statements
pub const STATEMENT_KEYWORDS: &[&str] = &[
    "import", "from", "def", "class", "return", "del", "pass", "raise", "global", "nonlocal",
    "assert", "with", "while", "try", "except", "finally", "break", "continue", "elif", "yield",
    "match",
];

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<(TokenKind, String)> {
        tokenize(source).unwrap().into_iter().map(|t| (t.kind, t.text)).collect()
    }

    #[test]
    fn test_expression_tokens() {
        let tokens = kinds("len(result) >= 0");
        assert_eq!(
            tokens,
            vec![
                (TokenKind::Name, "len".to_string()),
                (TokenKind::Open, "(".to_string()),
                (TokenKind::Name, "result".to_string()),
                (TokenKind::Close, ")".to_string()),
                (TokenKind::Op, ">=".to_string()),
                (TokenKind::Number, "0".to_string()),
                (TokenKind::Newline, String::new()),
            ]
        );
    }

    #[test]
    fn test_strings_and_comments() {
        let tokens = kinds("x = 'a # b'  # trailing\ny = rb\"\\\"q\"\n");
        let strs: Vec<_> = tokens.iter().filter(|(k, _)| *k == TokenKind::Str).map(|(_, t)| t.clone()).collect();
        assert_eq!(strs, vec!["'a # b'".to_string(), "rb\"\\\"q\"".to_string()]);
        assert_eq!(tokens.iter().filter(|(k, _)| *k == TokenKind::Newline).count(), 2);
    }

    #[test]
    fn test_triple_quoted_spans_lines() {
        let tokens = tokenize("s = \"\"\"one\ntwo\"\"\"\nt = 1\n").unwrap();
        let t = tokens.iter().find(|t| t.text == "t").unwrap();
        assert_eq!(t.line, 3);
    }

    #[test]
    fn test_brackets_join_lines() {
        let tokens = kinds("f(a,\n  b)\n");
        assert_eq!(tokens.iter().filter(|(k, _)| *k == TokenKind::Newline).count(), 1);
    }

    #[test]
    fn test_errors() {
        assert!(tokenize("f(a").is_err());
        assert!(tokenize("a)").is_err());
        assert!(tokenize("(a]").is_err());
        assert!(tokenize("'open").is_err());
        assert!(tokenize("a ! b").is_err());
        assert_eq!(tokenize("a != b").unwrap()[1].text, "!=");
    }

    #[test]
    fn test_numbers() {
        let tokens = kinds("1e-3 + 0x1F + 1_000.5j");
        let numbers: Vec<_> =
            tokens.iter().filter(|(k, _)| *k == TokenKind::Number).map(|(_, t)| t.as_str()).collect();
        assert_eq!(numbers, vec!["1e-3", "0x1F", "1_000.5j"]);
    }
}
