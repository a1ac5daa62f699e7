//! Search for a grammar that can supply enough stimuli.
//!
//! Random grammars are tried in batches. Whenever a batch fails, the size
//! bounds grow by one and the search continues, up to a fixed number of times.

use std::collections::HashSet;

use rand::Rng;
use tracing::{debug, info, instrument, warn};

use crate::grammar::{Grammar, GrammarConfig};

/// Outcome of a [`GrammarSearch`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    /// The grammar passed in now holds an acceptable grammar
    Found {
        /// The grammatical strings harvested while testing it
        strings: HashSet<String>,
        /// How far the size bounds had to grow
        oversize: usize,
        /// Randomizations tried in total
        attempts: usize,
    },
    /// No grammar satisfied the settings; relax them and retry
    NotFound { attempts: usize },
}

impl SearchOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, SearchOutcome::Found { .. })
    }
}

/// Bounded, escalating search over random grammars
#[derive(Debug, Clone)]
pub struct GrammarSearch {
    pub required_strings: usize,
    pub min_length: usize,
    pub max_length: usize,
    pub allow_recursion: bool,
    pub max_grammar_attempts: usize,
    pub max_oversize_attempts: usize,
}

impl GrammarSearch {
    /// Derive search parameters from a configuration
    pub fn from_config(config: &GrammarConfig) -> Self {
        GrammarSearch {
            required_strings: config.required_grammatical(),
            min_length: config.min_string_length,
            max_length: config.max_string_length,
            allow_recursion: config.allow_recursion,
            max_grammar_attempts: config.max_grammar_attempts,
            max_oversize_attempts: config.max_oversize_attempts,
        }
    }

    /// Randomize `grammar` until it can produce `required_strings` distinct strings.
    ///
    /// On [`SearchOutcome::NotFound`] the grammar holds the last rejected candidate.
    #[instrument(
        name = "search.run",
        skip(self, grammar, rng),
        fields(required = self.required_strings, recursion = self.allow_recursion)
    )]
    pub fn run<G, R>(&self, grammar: &mut G, rng: &mut R) -> SearchOutcome
    where
        G: Grammar,
        R: Rng + ?Sized,
    {
        let max_attempts = grammar.config().max_attempts;
        let mut attempts = 0;

        for oversize in 0..=self.max_oversize_attempts {
            for _ in 0..self.max_grammar_attempts {
                attempts += 1;
                grammar.randomize_oversized_with(rng, oversize);
                if !self.allow_recursion && grammar.has_cycle() {
                    continue;
                }
                let strings = grammar.produce_grammatical_with(
                    rng,
                    self.required_strings,
                    self.min_length,
                    self.max_length,
                    max_attempts,
                );
                if strings.len() == self.required_strings {
                    debug!(attempts, oversize, "grammar found");
                    return SearchOutcome::Found {
                        strings,
                        oversize,
                        attempts,
                    };
                }
            }
            if oversize < self.max_oversize_attempts {
                info!(oversize = oversize + 1, "none found, expanding search to larger grammars");
            }
        }

        warn!(attempts, "no grammar satisfies the current settings");
        SearchOutcome::NotFound { attempts }
    }
}
