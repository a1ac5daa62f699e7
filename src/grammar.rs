use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::codec;
use crate::mutator;
use crate::utils::{GrammarError, Result, ensure_distinct};

/// Configuration options for grammar generation and stimulus production
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrammarConfig {
    /// The alphabet strings are made of
    pub symbols: Vec<char>,
    /// Fewest states in a random regular grammar
    pub min_states: usize,
    /// Most states in a random regular grammar
    pub max_states: usize,
    /// Fewest symbols on the shortest way from the start to an exit
    pub min_path_length: usize,
    /// Shortest stimulus
    pub min_string_length: usize,
    /// Longest stimulus
    pub max_string_length: usize,
    /// Budget of random walks or draws per production call
    pub max_attempts: usize,
    /// Fewest patterns in a random pattern grammar
    pub min_patterns: usize,
    /// Most patterns in a random pattern grammar
    pub max_patterns: usize,
    /// Shortest pattern
    pub min_pattern_length: usize,
    /// Longest pattern
    pub max_pattern_length: usize,
    /// Whether grammars with loops are allowed
    pub allow_recursion: bool,
    /// Randomizations tried per grammar size before growing it
    pub max_grammar_attempts: usize,
    /// How many times the size bounds may grow by one
    pub max_oversize_attempts: usize,
    /// Grammatical strings shown during training
    pub training_strings: usize,
    /// Grammatical strings in the test phase
    pub test_strings_grammatical: usize,
    /// Ungrammatical strings in the test phase
    pub test_strings_ungrammatical: usize,
}

impl Default for GrammarConfig {
    fn default() -> Self {
        GrammarConfig {
            symbols: vec!['M', 'R', 'S', 'V', 'X'],
            min_states: 3,
            max_states: 7,
            min_path_length: 2,
            min_string_length: 2,
            max_string_length: 8,
            max_attempts: 10_000,
            min_patterns: 1,
            max_patterns: 4,
            min_pattern_length: 3,
            max_pattern_length: 6,
            allow_recursion: true,
            max_grammar_attempts: 64,
            max_oversize_attempts: 5,
            training_strings: 15,
            test_strings_grammatical: 5,
            test_strings_ungrammatical: 5,
        }
    }
}

impl GrammarConfig {
    /// Load a configuration from a JSON file, filling in defaults
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Load a configuration from a JSON string, filling in defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: GrammarConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that all bounds are consistent
    pub fn validate(&self) -> Result<()> {
        if self.symbols.len() < 2 {
            return Err(GrammarError::InvalidConfig(
                "at least two symbols are required".to_string(),
            ));
        }
        ensure_distinct(&self.symbols)?;

        let ranges = [
            ("states", self.min_states, self.max_states),
            ("string length", self.min_string_length, self.max_string_length),
            ("patterns", self.min_patterns, self.max_patterns),
            ("pattern length", self.min_pattern_length, self.max_pattern_length),
        ];
        for (name, min, max) in ranges {
            if min > max {
                return Err(GrammarError::InvalidConfig(format!(
                    "minimum {} ({}) exceeds maximum ({})",
                    name, min, max
                )));
            }
        }

        if self.min_states == 0 || self.min_patterns == 0 || self.min_pattern_length == 0 {
            return Err(GrammarError::InvalidConfig(
                "states, patterns and pattern lengths must be positive".to_string(),
            ));
        }

        // A path of length d visits d + 1 distinct states.
        if self.min_path_length >= self.max_states {
            return Err(GrammarError::InvalidConfig(format!(
                "minimum path length ({}) needs more than {} states",
                self.min_path_length, self.max_states
            )));
        }
        Ok(())
    }

    /// How many distinct grammatical strings a session needs
    pub fn required_grammatical(&self) -> usize {
        self.training_strings + self.test_strings_grammatical
    }
}

/// The contract shared by every grammar kind
pub trait Grammar: Sized + fmt::Display {
    fn config(&self) -> &GrammarConfig;

    fn set_config(&mut self, config: GrammarConfig);

    /// The symbols strings are made of
    fn alphabet(&self) -> &[char] {
        &self.config().symbols
    }

    /// Bind a new alphabet to the existing structure, symbol by symbol
    fn set_alphabet(&mut self, alphabet: Vec<char>) -> Result<()>;

    /// Randomize with the configured size bounds grown by `oversize`
    fn randomize_oversized_with<R: Rng + ?Sized>(&mut self, rng: &mut R, oversize: usize);

    /// Collect up to `num_strings` distinct accepted strings
    fn produce_grammatical_with<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        num_strings: usize,
        min_length: usize,
        max_length: usize,
        max_attempts: usize,
    ) -> HashSet<String>;

    /// Decide whether the string conforms to the grammar
    fn recognize(&self, string: &str) -> bool;

    /// Whether the grammar can loop
    fn has_cycle(&self) -> bool;

    /// Compare structure, ignoring which symbols are bound to it
    fn same_structure(&self, other: &Self) -> bool;

    /// The plain text form stored inside the obfuscated representation
    fn canonical_repr(&self) -> Result<String>;

    /// Rebuild a grammar from its plain text form
    fn from_canonical_repr(text: &str) -> Result<Self>;

    fn produce_grammatical(
        &self,
        num_strings: usize,
        min_length: usize,
        max_length: usize,
    ) -> HashSet<String> {
        let max_attempts = self.config().max_attempts;
        self.produce_grammatical_with(
            &mut rand::thread_rng(),
            num_strings,
            min_length,
            max_length,
            max_attempts,
        )
    }

    /// Collect up to `num_strings` distinct rejected strings
    fn produce_ungrammatical_with<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        num_strings: usize,
        min_length: usize,
        max_length: usize,
    ) -> HashSet<String> {
        let max_attempts = self.config().max_attempts;
        mutator::produce_ungrammatical(self, rng, num_strings, min_length, max_length, max_attempts)
    }

    fn produce_ungrammatical(
        &self,
        num_strings: usize,
        min_length: usize,
        max_length: usize,
    ) -> HashSet<String> {
        self.produce_ungrammatical_with(&mut rand::thread_rng(), num_strings, min_length, max_length)
    }

    fn obfuscated_repr_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<String> {
        Ok(codec::obfuscate(&self.canonical_repr()?, rng))
    }

    /// Scramble the grammar so a participant can't read it from a saved file
    fn obfuscated_repr(&self) -> Result<String> {
        self.obfuscated_repr_with(&mut rand::thread_rng())
    }

    /// Decode a grammar produced by [`Grammar::obfuscated_repr`]
    fn from_obfuscated_repr(text: &str) -> Result<Self> {
        let plain = codec::deobfuscate(text)?;
        Self::from_canonical_repr(&plain)
    }
}

/// Check that a rebinding alphabet can replace `current`
pub(crate) fn check_rebinding(current: &[char], alphabet: &[char]) -> Result<()> {
    if alphabet.len() != current.len() {
        return Err(GrammarError::InvalidConfig(format!(
            "expected {} symbols, got {}",
            current.len(),
            alphabet.len()
        )));
    }
    ensure_distinct(alphabet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config_is_valid() {
        let config = GrammarConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.required_grammatical(), 20);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            GrammarConfig::from_json_str(r#"{ "symbols": ["A", "B", "C"], "max_states": 9 }"#)
                .unwrap();
        assert_eq!(config.symbols, vec!['A', 'B', 'C']);
        assert_eq!(config.max_states, 9);
        assert_eq!(config.min_states, GrammarConfig::default().min_states);
    }

    #[test]
    fn test_invalid_bounds_rejected() {
        let err = GrammarConfig::from_json_str(r#"{ "min_string_length": 9 }"#).unwrap_err();
        assert!(format!("{}", err).contains("string length"));

        let err = GrammarConfig::from_json_str(r#"{ "symbols": ["A"] }"#).unwrap_err();
        assert!(matches!(err, GrammarError::InvalidConfig(_)));
    }

    #[test]
    fn test_unreachable_path_length_rejected() {
        let config = GrammarConfig {
            min_path_length: 8,
            ..GrammarConfig::default()
        };
        assert!(matches!(config.validate(), Err(GrammarError::InvalidConfig(_))));

        let config = GrammarConfig {
            min_path_length: 7,
            ..GrammarConfig::default()
        };
        assert!(config.validate().is_err());

        let config = GrammarConfig {
            min_path_length: 6,
            ..GrammarConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rebinding_checks() {
        assert!(check_rebinding(&['A', 'B'], &['x', 'y']).is_ok());
        assert!(check_rebinding(&['A', 'B'], &['x']).is_err());
        assert!(check_rebinding(&['A', 'B'], &['x', 'x']).is_err());
    }
}
