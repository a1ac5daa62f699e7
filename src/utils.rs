use std::collections::HashSet;
use std::io;

use regex::Regex;
use thiserror::Error;

/// Custom error types for the grammar engine
#[derive(Error, Debug)]
pub enum GrammarError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Invalid grammar: {0}")]
    InvalidGrammar(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for grammar operations
pub type Result<T> = std::result::Result<T, GrammarError>;

/// Parse a list of symbols such as `"M, R, S, V, X"` or `"MRSVX"`.
///
/// Separators are commas and whitespace. A single token without separators
/// is split into its characters. Duplicates are rejected.
pub fn parse_symbols(text: &str) -> Result<Vec<char>> {
    let separator = Regex::new(r"[,\s]+").map_err(|e| GrammarError::InvalidConfig(e.to_string()))?;
    let tokens: Vec<&str> = separator
        .split(text.trim())
        .filter(|t| !t.is_empty())
        .collect();

    let symbols: Vec<char> = match tokens.as_slice() {
        [single] => single.chars().collect(),
        many => {
            let mut symbols = Vec::with_capacity(many.len());
            for token in many {
                let mut chars = token.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => symbols.push(c),
                    _ => {
                        return Err(GrammarError::InvalidConfig(format!(
                            "symbol '{}' must be a single character",
                            token
                        )));
                    }
                }
            }
            symbols
        }
    };

    ensure_distinct(&symbols)?;
    Ok(symbols)
}

/// Reject alphabets that repeat a symbol
pub fn ensure_distinct(symbols: &[char]) -> Result<()> {
    let mut seen = HashSet::new();
    for symbol in symbols {
        if !seen.insert(symbol) {
            return Err(GrammarError::InvalidConfig(format!(
                "symbol '{}' appears more than once",
                symbol
            )));
        }
    }
    Ok(())
}

/// Render a string over `alphabet` using one display token per symbol.
///
/// Symbol `alphabet[i]` is shown as `tokens[i]`, tokens are joined with spaces.
/// Symbols without a token are shown as themselves.
pub fn render_tokens(string: &str, alphabet: &[char], tokens: &[String]) -> String {
    string
        .chars()
        .map(|c| {
            alphabet
                .iter()
                .position(|&a| a == c)
                .and_then(|i| tokens.get(i))
                .cloned()
                .unwrap_or_else(|| c.to_string())
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Trait extension for Option<T> to convert to GrammarError
pub trait OptionExt<T> {
    fn ok_or_grammar_err<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_grammar_err<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.ok_or_else(|| GrammarError::InvalidGrammar(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_symbols_separated() {
        assert_eq!(parse_symbols("M, R,S  V\tX").unwrap(), vec!['M', 'R', 'S', 'V', 'X']);
    }

    #[test]
    fn test_parse_symbols_compact() {
        assert_eq!(parse_symbols("TPSXV").unwrap(), vec!['T', 'P', 'S', 'X', 'V']);
    }

    #[test]
    fn test_parse_symbols_rejects_words_and_duplicates() {
        assert!(parse_symbols("ab, c").is_err());
        let err = parse_symbols("A, B, A").unwrap_err();
        assert!(format!("{}", err).contains("more than once"));
    }

    #[test]
    fn test_render_tokens() {
        let tokens = vec!["ba".to_string(), "ku".to_string()];
        assert_eq!(render_tokens("ABBA", &['A', 'B'], &tokens), "ba ku ku ba");
        assert_eq!(render_tokens("AZ", &['A', 'B'], &tokens), "ba Z");
    }

    #[test]
    fn test_option_ext() {
        let missing: Option<u8> = None;
        let err = missing.ok_or_grammar_err(|| "state 9".to_string()).unwrap_err();
        assert!(matches!(err, GrammarError::InvalidGrammar(ref s) if s == "state 9"));
    }
}
