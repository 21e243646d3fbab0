use super::lexer::{self, Token, TokenKind};
use super::prelude::ENTRY_MARKERS;
use crate::error::{ProbeError, Result};

/// Static check of a generated worker before it is handed to an interpreter
///
/// Lexes the whole text, then walks logical lines checking that every line
/// ending in `:` opens an indented block and that each dedent returns to an
/// enclosing indentation level.
pub fn validate_script(text: &str) -> Result<()> {
    for marker in ENTRY_MARKERS {
        if !text.contains(marker) {
            return Err(ProbeError::Script(format!("Script is missing entry point marker '{}'", marker)));
        }
    }

    let tokens = lexer::tokenize(text)
        .map_err(|e| ProbeError::Script(format!("Script is not valid Python: {}", e)))?;

    check_indentation(&tokens)
}

fn check_indentation(tokens: &[Token]) -> Result<()> {
    let mut stack = vec![0usize];
    let mut expect_block = false;
    let mut last_line = 0;

    for line in tokens.split(|t| t.kind == TokenKind::Newline) {
        let Some(first) = line.first() else { continue };
        let indent = first.col;
        let top = stack.last().copied().unwrap_or(0);

        if expect_block {
            if indent <= top {
                return Err(indentation_error(first.line, "expected an indented block"));
            }
            stack.push(indent);
        } else if indent > top {
            return Err(indentation_error(first.line, "unexpected indent"));
        } else if indent < top {
            while stack.last().is_some_and(|&level| level > indent) {
                stack.pop();
            }
            if stack.last() != Some(&indent) {
                return Err(indentation_error(
                    first.line,
                    "unindent does not match any outer indentation level",
                ));
            }
        }

        expect_block = line.last().is_some_and(|t| t.kind == TokenKind::Op && t.text == ":");
        last_line = first.line;
    }

    if expect_block {
        return Err(indentation_error(last_line, "expected an indented block at end of script"));
    }
    Ok(())
}

fn indentation_error(line: usize, message: &str) -> ProbeError {
    ProbeError::Script(format!("Script is not valid Python: line {}: {}", line, message))
}
