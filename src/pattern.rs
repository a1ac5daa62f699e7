//! Finite grammars made of class patterns.
//!
//! The alphabet is split into disjoint classes and every grammatical string
//! follows one of a few fixed-length patterns of classes. Classes form a
//! strict partition; nested classes are not supported.

use std::collections::HashSet;
use std::fmt;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::grammar::{Grammar, GrammarConfig, check_rebinding};
use crate::utils::{GrammarError, Result, ensure_distinct};

/// A grammar accepting strings that match one of its class patterns
#[derive(Debug, Clone)]
pub struct PatternGrammar {
    classes: Vec<Vec<char>>,
    patterns: Vec<Vec<usize>>,
    config: GrammarConfig,
}

#[derive(Serialize, Deserialize)]
struct PatternRepr {
    #[serde(rename = "a")]
    alphabet: String,
    #[serde(rename = "c")]
    classes: Vec<String>,
    #[serde(rename = "p")]
    patterns: Vec<Vec<usize>>,
}

impl PatternGrammar {
    /// Create an empty grammar over the default alphabet
    pub fn new() -> Self {
        Self::with_config(GrammarConfig::default())
    }

    pub fn with_config(config: GrammarConfig) -> Self {
        PatternGrammar {
            classes: Vec::new(),
            patterns: Vec::new(),
            config,
        }
    }

    /// Build a grammar from explicit classes and patterns of class indices
    pub fn from_parts(
        symbols: &[char],
        classes: Vec<Vec<char>>,
        patterns: Vec<Vec<usize>>,
    ) -> Result<Self> {
        let grammar = PatternGrammar {
            classes,
            patterns,
            config: GrammarConfig {
                symbols: symbols.to_vec(),
                ..GrammarConfig::default()
            },
        };
        grammar.check_structure().map_err(GrammarError::InvalidGrammar)?;
        Ok(grammar)
    }

    pub fn classes(&self) -> &[Vec<char>] {
        &self.classes
    }

    pub fn patterns(&self) -> &[Vec<usize>] {
        &self.patterns
    }

    /// Construct an arbitrary grammar with between `min_patterns` and `max_patterns` patterns
    pub fn randomize(&mut self, min_patterns: usize, max_patterns: usize) {
        self.randomize_with(&mut rand::thread_rng(), min_patterns, max_patterns);
    }

    pub fn randomize_with<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        min_patterns: usize,
        max_patterns: usize,
    ) {
        self.classes = self.random_partition(rng);

        let min_patterns = min_patterns.max(1);
        let num_patterns = rng.gen_range(min_patterns..=max_patterns.max(min_patterns));
        let min_length = self.config.min_pattern_length.max(1);
        let max_length = self.config.max_pattern_length.max(min_length);
        let num_classes = self.classes.len();

        self.patterns = (0..num_patterns)
            .map(|_| {
                let length = rng.gen_range(min_length..=max_length);
                (0..length).map(|_| rng.gen_range(0..num_classes)).collect()
            })
            .collect();

        debug!(
            classes = num_classes,
            patterns = num_patterns,
            "randomized pattern grammar"
        );
    }

    /// Split the alphabet into between one and `|alphabet| - 1` non-empty classes
    fn random_partition<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<Vec<char>> {
        let symbols = &self.config.symbols;
        if symbols.len() < 2 {
            return vec![symbols.clone()];
        }

        let num_classes = rng.gen_range(1..symbols.len());
        let mut classes: Vec<Vec<char>> = vec![Vec::new(); num_classes];
        for &symbol in symbols {
            classes[rng.gen_range(0..num_classes)].push(symbol);
        }

        // Fewer classes than symbols, so a donor with two or more always exists.
        while let Some(empty) = classes.iter().position(|c| c.is_empty()) {
            let donors: Vec<usize> = (0..num_classes).filter(|&i| classes[i].len() > 1).collect();
            let Some(&donor) = donors.choose(rng) else { break };
            let taken = rng.gen_range(0..classes[donor].len());
            let symbol = classes[donor].swap_remove(taken);
            classes[empty].push(symbol);
        }

        for class in &mut classes {
            class.sort_by_key(|c| symbols.iter().position(|s| s == c));
        }
        classes
    }

    /// Describe the first violated structural invariant, if any
    fn check_structure(&self) -> std::result::Result<(), String> {
        let symbols = &self.config.symbols;
        if self.classes.iter().any(|c| c.is_empty()) {
            return Err("empty class".to_string());
        }
        let mut seen = HashSet::new();
        for symbol in self.classes.iter().flatten() {
            if !symbols.contains(symbol) {
                return Err(format!("symbol '{}' is not in the alphabet", symbol));
            }
            if !seen.insert(*symbol) {
                return Err(format!("symbol '{}' belongs to two classes", symbol));
            }
        }
        if seen.len() != symbols.len() {
            return Err("classes do not cover the alphabet".to_string());
        }
        if symbols.len() > 1 && self.classes.iter().all(|c| c.len() == 1) {
            return Err("every class is a single symbol".to_string());
        }
        if self.patterns.iter().flatten().any(|&c| c >= self.classes.len()) {
            return Err("pattern refers to a missing class".to_string());
        }
        Ok(())
    }

    /// Check the class partition and that pattern lengths respect the configured bounds
    pub fn is_well_formed(&self) -> bool {
        let bounds = self.config.min_pattern_length..=self.config.max_pattern_length;
        self.check_structure().is_ok()
            && !self.patterns.is_empty()
            && self.patterns.iter().all(|p| bounds.contains(&p.len()))
    }
}

impl Default for PatternGrammar {
    fn default() -> Self {
        Self::new()
    }
}

impl Grammar for PatternGrammar {
    fn config(&self) -> &GrammarConfig {
        &self.config
    }

    fn set_config(&mut self, config: GrammarConfig) {
        self.config = config;
    }

    fn set_alphabet(&mut self, alphabet: Vec<char>) -> Result<()> {
        check_rebinding(&self.config.symbols, &alphabet)?;
        let old = &self.config.symbols;
        for class in &mut self.classes {
            for symbol in class.iter_mut() {
                if let Some(i) = old.iter().position(|o| o == symbol) {
                    *symbol = alphabet[i];
                }
            }
        }
        self.config.symbols = alphabet;
        Ok(())
    }

    fn randomize_oversized_with<R: Rng + ?Sized>(&mut self, rng: &mut R, oversize: usize) {
        let min_patterns = self.config.min_patterns + oversize;
        let max_patterns = self.config.max_patterns + oversize;
        self.randomize_with(rng, min_patterns, max_patterns);
    }

    fn produce_grammatical_with<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        num_strings: usize,
        min_length: usize,
        max_length: usize,
        max_attempts: usize,
    ) -> HashSet<String> {
        let mut grammatical = HashSet::new();
        let usable: Vec<&Vec<usize>> = self
            .patterns
            .iter()
            .filter(|p| (min_length..=max_length).contains(&p.len()))
            .collect();
        if usable.is_empty() {
            debug!(min_length, max_length, "no pattern fits the length bounds");
            return grammatical;
        }

        let mut attempts = 0;
        while grammatical.len() < num_strings && attempts < max_attempts {
            attempts += 1;
            let Some(pattern) = usable.choose(rng) else { break };
            let string: Option<String> = pattern
                .iter()
                .map(|&c| self.classes.get(c).and_then(|class| class.choose(rng)).copied())
                .collect();
            if let Some(string) = string {
                grammatical.insert(string);
            }
        }

        if grammatical.len() < num_strings {
            debug!(
                requested = num_strings,
                produced = grammatical.len(),
                attempts,
                "grammatical string budget exhausted"
            );
        }
        grammatical
    }

    fn recognize(&self, string: &str) -> bool {
        let symbols: Vec<char> = string.chars().collect();
        self.patterns.iter().any(|pattern| {
            pattern.len() == symbols.len()
                && pattern.iter().zip(&symbols).all(|(&c, symbol)| {
                    self.classes.get(c).is_some_and(|class| class.contains(symbol))
                })
        })
    }

    fn has_cycle(&self) -> bool {
        false
    }

    fn same_structure(&self, other: &Self) -> bool {
        let ours = &self.config.symbols;
        let theirs = &other.config.symbols;
        if ours.len() != theirs.len() || self.classes.len() != other.classes.len() {
            return false;
        }
        let rebind = |c: &char| {
            theirs
                .iter()
                .position(|t| t == c)
                .and_then(|i| ours.get(i).copied())
        };
        let classes_match = self.classes.iter().zip(&other.classes).all(|(mine, yours)| {
            let mut rebound: Vec<Option<char>> = yours.iter().map(&rebind).collect();
            let mut mine: Vec<Option<char>> = mine.iter().copied().map(Some).collect();
            rebound.sort();
            mine.sort();
            rebound == mine
        });
        classes_match && self.patterns == other.patterns
    }

    fn canonical_repr(&self) -> Result<String> {
        let repr = PatternRepr {
            alphabet: self.config.symbols.iter().collect(),
            classes: self.classes.iter().map(|c| c.iter().collect()).collect(),
            patterns: self.patterns.clone(),
        };
        Ok(serde_json::to_string(&repr)?)
    }

    fn from_canonical_repr(text: &str) -> Result<Self> {
        let repr: PatternRepr =
            serde_json::from_str(text).map_err(|e| GrammarError::Decode(e.to_string()))?;
        let symbols: Vec<char> = repr.alphabet.chars().collect();
        ensure_distinct(&symbols).map_err(|e| GrammarError::Decode(e.to_string()))?;

        let grammar = PatternGrammar {
            classes: repr.classes.iter().map(|c| c.chars().collect()).collect(),
            patterns: repr.patterns,
            config: GrammarConfig {
                symbols,
                ..GrammarConfig::default()
            },
        };
        grammar.check_structure().map_err(GrammarError::Decode)?;
        if grammar.patterns.is_empty() {
            return Err(GrammarError::Decode("no patterns".to_string()));
        }
        Ok(grammar)
    }
}

impl PartialEq for PatternGrammar {
    fn eq(&self, other: &Self) -> bool {
        self.classes == other.classes
            && self.patterns == other.patterns
            && self.config.symbols == other.config.symbols
    }
}

impl fmt::Display for PatternGrammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut lines = Vec::new();
        for (i, class) in self.classes.iter().enumerate() {
            let members: Vec<String> = class.iter().map(|c| c.to_string()).collect();
            lines.push(format!("class {}: {}", i + 1, members.join(" ")));
        }
        for pattern in &self.patterns {
            let names: Vec<String> = pattern.iter().map(|c| (c + 1).to_string()).collect();
            lines.push(format!("pattern: {}", names.join(" ")));
        }
        write!(f, "{}", lines.join("\n"))
    }
}
