//! Scanning and substitution of `${NAME}` variable tokens.
//!
//! Three token forms are recognized:
//!
//! - `${NAME}`: the first non-empty value from the lookup layers
//! - `${NAME:-default}`: as above, falling back to `default` when every
//!   layer is unset or empty
//! - `${NAME-default}`: the first layer that sets `NAME` wins, even when the
//!   value is empty; `default` applies only when no layer sets it
//!
//! `$$` produces a literal `$`, and a `$` that does not open a brace is
//! copied through unchanged. Defaults may themselves contain tokens.

use std::collections::BTreeMap;
use thiserror::Error;

/// Errors produced while scanning or substituting variable tokens.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VariableError {
    /// A token is unterminated or names an invalid variable.
    #[error("malformed variable token in '{raw}'")]
    Malformed {
        /// The full input that failed to scan.
        raw: String,
    },

    /// No lookup layer and no embedded default supplied a value.
    #[error("unresolved variable '{name}'")]
    Unresolved {
        /// Name of the unresolved variable.
        name: String,
    },
}

/// Ordered lookup layers, highest precedence first.
pub type VariableLayers<'a> = [&'a BTreeMap<String, String>];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Fallback {
    None,
    IfUnsetOrEmpty,
    IfUnset,
}

#[derive(Debug, Clone, Copy)]
struct Token<'a> {
    name: &'a str,
    fallback: Fallback,
    default: &'a str,
}

#[derive(Debug, Clone, Copy)]
enum Piece<'a> {
    Literal(&'a str),
    Token(Token<'a>),
}

/// Substitutes every token in `input` using `layers`, highest precedence
/// first.
///
/// # Errors
///
/// Returns [`VariableError::Malformed`] for unterminated braces or invalid
/// names, and [`VariableError::Unresolved`] when a token has no value and no
/// default.
pub fn substitute(input: &str, layers: &VariableLayers<'_>) -> Result<String, VariableError> {
    let mut output = String::with_capacity(input.len());
    for piece in scan(input)? {
        match piece {
            Piece::Literal(text) => output.push_str(text),
            Piece::Token(token) => output.push_str(&resolve_token(token, layers)?),
        }
    }
    Ok(output)
}

/// Checks that `input` scans cleanly, including tokens nested in defaults.
///
/// # Errors
///
/// Returns [`VariableError::Malformed`] when any token is malformed.
pub fn validate(input: &str) -> Result<(), VariableError> {
    for piece in scan(input)? {
        if let Piece::Token(token) = piece {
            validate(token.default)?;
        }
    }
    Ok(())
}

/// Returns the name of every token in `input`, including tokens nested in
/// defaults, in order of appearance.
///
/// # Errors
///
/// Returns [`VariableError::Malformed`] when any token is malformed.
pub fn referenced_names(input: &str) -> Result<Vec<&str>, VariableError> {
    let mut names = Vec::new();
    for piece in scan(input)? {
        if let Piece::Token(token) = piece {
            names.push(token.name);
            names.extend(referenced_names(token.default)?);
        }
    }
    Ok(names)
}

/// Returns the variable name when `input` consists of exactly one token.
///
/// Used to find the env var that carries a port expression such as
/// `${CACHE_PORT:-6379}`.
#[must_use]
pub fn sole_variable(input: &str) -> Option<&str> {
    let pieces = scan(input.trim()).ok()?;
    match pieces.as_slice() {
        [Piece::Token(token)] => Some(token.name),
        _ => None,
    }
}

/// Returns whether `input` contains at least one token.
#[must_use]
pub fn has_tokens(input: &str) -> bool {
    scan(input).is_ok_and(|pieces| pieces.iter().any(|piece| matches!(piece, Piece::Token(_))))
}

fn resolve_token(token: Token<'_>, layers: &VariableLayers<'_>) -> Result<String, VariableError> {
    let found = layers
        .iter()
        .filter_map(|layer| layer.get(token.name))
        .find(|value| token.fallback == Fallback::IfUnset || !value.is_empty());

    if let Some(value) = found {
        return Ok(value.clone());
    }

    match token.fallback {
        Fallback::None => Err(VariableError::Unresolved {
            name: token.name.to_owned(),
        }),
        Fallback::IfUnsetOrEmpty | Fallback::IfUnset => substitute(token.default, layers),
    }
}

fn scan(input: &str) -> Result<Vec<Piece<'_>>, VariableError> {
    let malformed = || VariableError::Malformed {
        raw: input.to_owned(),
    };

    let mut pieces = Vec::new();
    let mut rest = input;
    while let Some(position) = rest.find('$') {
        let (literal, tail) = rest.split_at(position);
        if !literal.is_empty() {
            pieces.push(Piece::Literal(literal));
        }

        if let Some(after) = tail.strip_prefix("$$") {
            pieces.push(Piece::Literal("$"));
            rest = after;
            continue;
        }

        let Some(opened) = tail.strip_prefix("${") else {
            pieces.push(Piece::Literal("$"));
            rest = tail.strip_prefix('$').unwrap_or_default();
            continue;
        };

        let (body, after) = split_braced(opened).ok_or_else(malformed)?;
        pieces.push(Piece::Token(parse_token(body).ok_or_else(malformed)?));
        rest = after;
    }

    if !rest.is_empty() {
        pieces.push(Piece::Literal(rest));
    }
    Ok(pieces)
}

/// Splits `text` (positioned just after `${`) at its matching `}`.
fn split_braced(text: &str) -> Option<(&str, &str)> {
    let mut depth = 1_usize;
    for (index, character) in text.char_indices() {
        match character {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let (body, closing) = text.split_at(index);
                    return Some((body, closing.strip_prefix('}').unwrap_or_default()));
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_token(body: &str) -> Option<Token<'_>> {
    let name_length = body
        .find(|character: char| !(character.is_ascii_alphanumeric() || character == '_'))
        .unwrap_or(body.len());
    let (name, modifier) = body.split_at(name_length);

    if !is_variable_name(name) {
        return None;
    }

    if modifier.is_empty() {
        return Some(Token {
            name,
            fallback: Fallback::None,
            default: "",
        });
    }
    if let Some(default) = modifier.strip_prefix(":-") {
        return Some(Token {
            name,
            fallback: Fallback::IfUnsetOrEmpty,
            default,
        });
    }
    modifier.strip_prefix('-').map(|default| Token {
        name,
        fallback: Fallback::IfUnset,
        default,
    })
}

/// Returns whether `name` is a valid variable name (`[A-Za-z_][A-Za-z0-9_]*`).
#[must_use]
pub fn is_variable_name(name: &str) -> bool {
    let mut characters = name.chars();
    characters
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && characters.all(|character| character.is_ascii_alphanumeric() || character == '_')
}
