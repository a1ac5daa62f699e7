use std::collections::HashSet;
use std::fmt;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::grammar::{Grammar, GrammarConfig, check_rebinding};
use crate::graph::{Label, START, StateId, TransitionTable};
use crate::utils::{GrammarError, OptionExt, Result, ensure_distinct};
use crate::validator::Acceptance;

/// A regular grammar: a directed graph with a symbol on each edge.
///
/// State 0 is the start state. A string is accepted if following its symbols
/// from the start ends in a state that offers the exit.
#[derive(Debug, Clone)]
pub struct RegularGrammar {
    table: TransitionTable,
    config: GrammarConfig,
}

/// Plain text form: the alphabet and the states
#[derive(Serialize, Deserialize)]
struct RegularRepr {
    #[serde(rename = "a")]
    alphabet: String,
    #[serde(rename = "s")]
    states: TransitionTable,
}

impl RegularGrammar {
    /// Create an empty grammar over the default alphabet
    pub fn new() -> Self {
        Self::with_config(GrammarConfig::default())
    }

    /// Create an empty grammar with custom configuration
    pub fn with_config(config: GrammarConfig) -> Self {
        RegularGrammar {
            table: TransitionTable::default(),
            config,
        }
    }

    /// The grammar from Reber (1967) over `T P S X V`
    pub fn reber() -> Self {
        let config = GrammarConfig {
            symbols: vec!['T', 'P', 'S', 'X', 'V'],
            ..GrammarConfig::default()
        };
        let mut table = TransitionTable::with_states(6);
        let edges = [
            (0, 'T', 1),
            (0, 'V', 3),
            (1, 'P', 1),
            (1, 'T', 2),
            (2, 'X', 3),
            (2, 'S', 5),
            (3, 'X', 3),
            (3, 'V', 4),
            (4, 'P', 2),
            (4, 'S', 5),
        ];
        for (from, symbol, to) in edges {
            table.set_edge(from, symbol, to);
        }
        table.set_exit(5, true);
        RegularGrammar { table, config }
    }

    pub fn table(&self) -> &TransitionTable {
        &self.table
    }

    /// Construct an arbitrary grammar by choosing states and transitions at random
    pub fn randomize(&mut self, min_states: usize, max_states: usize) {
        self.randomize_with(&mut rand::thread_rng(), min_states, max_states);
    }

    /// Like [`RegularGrammar::randomize`], drawing from `rng`.
    ///
    /// Loops until the candidate passes [`Acceptance::standard`].
    pub fn randomize_with<R: Rng + ?Sized>(&mut self, rng: &mut R, min_states: usize, max_states: usize) {
        let acceptance = Acceptance::standard(self.config.min_path_length);
        let min_states = min_states.max(1);
        // Fewer states than this can never reach the minimum exit distance.
        let max_states = max_states
            .max(min_states)
            .max(self.config.min_path_length + 1);

        let mut candidates = 0usize;
        loop {
            candidates += 1;
            let num_states = rng.gen_range(min_states..=max_states);
            let table = self.random_table(rng, num_states);
            match acceptance.first_failure(&table) {
                None => {
                    debug!(states = num_states, candidates, "accepted random grammar");
                    self.table = table;
                    return;
                }
                Some(check) => trace!(states = num_states, check, "rejected candidate grammar"),
            }
        }
    }

    fn random_table<R: Rng + ?Sized>(&self, rng: &mut R, num_states: usize) -> TransitionTable {
        let symbols = &self.config.symbols;
        let mut labels: Vec<Label> = symbols.iter().map(|&c| Label::Symbol(c)).collect();
        labels.push(Label::Exit);

        let mut table = TransitionTable::with_states(num_states);
        for from in 0..num_states {
            // avoid running out of symbols
            let out_degree = rng.gen_range(0..=num_states).min(symbols.len());
            for _ in 0..out_degree {
                let Some(&label) = labels.choose(rng) else { break };
                match label {
                    Label::Exit => {
                        table.set_exit(from, true);
                    }
                    Label::Symbol(symbol) => {
                        // no more than one edge between the same states
                        let free: Vec<StateId> = match table.state(from) {
                            Some(state) => (0..num_states).filter(|&to| !state.leads_to(to)).collect(),
                            None => Vec::new(),
                        };
                        if let Some(&to) = free.choose(rng) {
                            table.set_edge(from, symbol, to);
                        }
                    }
                }
            }
        }
        table.seal_empty_states();
        table
    }

    /// Take one random walk from the start state.
    ///
    /// Returns `None` if the walk would grow past `max_length`.
    fn walk<R: Rng + ?Sized>(&self, rng: &mut R, max_length: usize) -> Option<String> {
        let mut string = String::new();
        let mut length = 0;
        let mut current = START;
        loop {
            let labels = self.table.state(current)?.labels();
            match *labels.choose(rng)? {
                Label::Exit => return Some(string),
                Label::Symbol(symbol) => {
                    if length == max_length {
                        return None;
                    }
                    string.push(symbol);
                    length += 1;
                    current = self.table.state(current)?.next(symbol)?;
                }
            }
        }
    }

    /// Minimum number of symbols emitted from `state` to an exit
    pub fn shortest_path_through(&self, state: StateId) -> Option<usize> {
        self.table.shortest_path_through(state)
    }

    pub fn is_connected(&self) -> bool {
        self.table.is_connected()
    }

    pub fn has_dead_cycle(&self) -> bool {
        self.table.has_dead_cycle()
    }
}

impl Default for RegularGrammar {
    fn default() -> Self {
        Self::new()
    }
}

impl Grammar for RegularGrammar {
    fn config(&self) -> &GrammarConfig {
        &self.config
    }

    fn set_config(&mut self, config: GrammarConfig) {
        self.config = config;
    }

    fn set_alphabet(&mut self, alphabet: Vec<char>) -> Result<()> {
        check_rebinding(&self.config.symbols, &alphabet)?;
        let old = self.config.symbols.clone();
        self.table.relabel(|c| {
            old.iter()
                .position(|&o| o == c)
                .and_then(|i| alphabet.get(i).copied())
                .unwrap_or(c)
        });
        self.config.symbols = alphabet;
        Ok(())
    }

    fn randomize_oversized_with<R: Rng + ?Sized>(&mut self, rng: &mut R, oversize: usize) {
        let min_states = self.config.min_states + oversize;
        let max_states = self.config.max_states + oversize;
        self.randomize_with(rng, min_states, max_states);
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
        if self.table.is_empty() {
            return grammatical;
        }

        let mut attempts = 0;
        while grammatical.len() < num_strings && attempts < max_attempts {
            attempts += 1;
            let Some(string) = self.walk(rng, max_length) else {
                continue;
            };
            if string.chars().count() >= min_length {
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
        let mut state = START;
        for symbol in string.chars() {
            match self.table.state(state).and_then(|s| s.next(symbol)) {
                Some(next) => state = next,
                None => return false,
            }
        }
        self.table.state(state).is_some_and(|s| s.is_exit())
    }

    fn has_cycle(&self) -> bool {
        self.table.has_cycle()
    }

    fn same_structure(&self, other: &Self) -> bool {
        if self.config.symbols.len() != other.config.symbols.len() {
            return false;
        }
        let mut rebound = other.table.clone();
        let theirs = &other.config.symbols;
        let ours = &self.config.symbols;
        rebound.relabel(|c| {
            theirs
                .iter()
                .position(|&t| t == c)
                .and_then(|i| ours.get(i).copied())
                .unwrap_or(c)
        });
        rebound == self.table
    }

    fn canonical_repr(&self) -> Result<String> {
        let repr = RegularRepr {
            alphabet: self.config.symbols.iter().collect(),
            states: self.table.clone(),
        };
        Ok(serde_json::to_string(&repr)?)
    }

    fn from_canonical_repr(text: &str) -> Result<Self> {
        let repr: RegularRepr =
            serde_json::from_str(text).map_err(|e| GrammarError::Decode(e.to_string()))?;
        let symbols: Vec<char> = repr.alphabet.chars().collect();
        ensure_distinct(&symbols).map_err(|e| GrammarError::Decode(e.to_string()))?;

        if repr.states.is_empty() || !repr.states.indices_in_range() {
            return Err(GrammarError::Decode(
                "transition table refers to missing states".to_string(),
            ));
        }
        if let Some(stray) = repr.states.symbols_used().into_iter().find(|c| !symbols.contains(c)) {
            return Err(GrammarError::Decode(format!(
                "symbol '{}' is not in the alphabet",
                stray
            )));
        }

        Ok(RegularGrammar {
            table: repr.states,
            config: GrammarConfig {
                symbols,
                ..GrammarConfig::default()
            },
        })
    }
}

impl PartialEq for RegularGrammar {
    fn eq(&self, other: &Self) -> bool {
        self.table == other.table && self.config.symbols == other.config.symbols
    }
}

impl fmt::Display for RegularGrammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut lines = Vec::new();
        for (id, state) in self.table.states().iter().enumerate() {
            for (symbol, to) in state.transitions() {
                lines.push(format!("{} -{}-> {}", id, symbol, to));
            }
            if state.is_exit() {
                lines.push(format!("{} -> OUT", id));
            }
        }
        write!(f, "{}", lines.join("\n"))
    }
}

/// Builder for constructing RegularGrammar instances by hand
pub struct GrammarBuilder {
    grammar: RegularGrammar,
}

impl GrammarBuilder {
    /// Create a builder for a grammar with `num_states` states over `symbols`
    pub fn new(symbols: &[char], num_states: usize) -> Self {
        let config = GrammarConfig {
            symbols: symbols.to_vec(),
            ..GrammarConfig::default()
        };
        GrammarBuilder {
            grammar: RegularGrammar {
                table: TransitionTable::with_states(num_states),
                config,
            },
        }
    }

    /// Set the configuration, keeping the alphabet
    pub fn config(mut self, config: GrammarConfig) -> Self {
        let symbols = std::mem::take(&mut self.grammar.config.symbols);
        self.grammar.config = GrammarConfig { symbols, ..config };
        self
    }

    /// Add the edge `from -symbol-> to`
    pub fn edge(mut self, from: StateId, symbol: char, to: StateId) -> Self {
        self.grammar.table.set_edge(from, symbol, to);
        self
    }

    /// Let `state` offer the exit
    pub fn exit(mut self, state: StateId) -> Self {
        self.grammar.table.set_exit(state, true);
        self
    }

    /// Build the grammar, checking that every edge is valid
    pub fn build(self) -> Result<RegularGrammar> {
        let grammar = self.grammar;
        if grammar.table.is_empty() {
            return Err(GrammarError::InvalidGrammar("no states".to_string()));
        }
        for (id, state) in grammar.table.states().iter().enumerate() {
            if state.is_empty() {
                return Err(GrammarError::InvalidGrammar(format!(
                    "state {} has no edges",
                    id
                )));
            }
            for symbol in state.transitions().keys() {
                grammar
                    .config
                    .symbols
                    .iter()
                    .find(|&&c| c == *symbol)
                    .ok_or_grammar_err(|| format!("symbol '{}' is not in the alphabet", symbol))?;
            }
        }
        Ok(grammar)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_reber_fixtures() {
        let grammar = RegularGrammar::reber();
        for accepted in ["TTS", "VVS", "TPTXVPXVPS"] {
            assert!(grammar.recognize(accepted), "{} should be accepted", accepted);
        }
        for rejected in ["V", "TPS", "VVPSV", ""] {
            assert!(!grammar.recognize(rejected), "{} should be rejected", rejected);
        }
        assert!(grammar.has_cycle());
        assert_eq!(grammar.shortest_path_through(START), Some(3));
    }

    #[test]
    fn test_randomize_meets_invariants() {
        let mut rng = StdRng::seed_from_u64(2024);
        let mut grammar = RegularGrammar::new();
        for _ in 0..100 {
            grammar.randomize_with(&mut rng, 3, 7);
            let states = grammar.table().len();
            assert!((3..=7).contains(&states));
            assert!(grammar.is_connected());
            assert!(!grammar.has_dead_cycle());
            let distance = grammar.shortest_path_through(START).unwrap();
            assert!(distance >= 2);
            assert!(grammar.table().states().iter().all(|s| !s.is_empty()));
        }
    }

    #[test]
    fn test_produced_strings_are_recognized() {
        let mut rng = StdRng::seed_from_u64(99);
        let mut grammar = RegularGrammar::new();
        for _ in 0..50 {
            grammar.randomize_with(&mut rng, 3, 7);
            let strings = grammar.produce_grammatical_with(&mut rng, 5, 2, 8, 10_000);
            for s in &strings {
                assert!((2..=8).contains(&s.len()), "{} out of bounds", s);
                assert!(grammar.recognize(s), "{} not recognized", s);
            }
        }
    }

    #[test]
    fn test_randomize_grows_too_small_bounds() {
        let config = GrammarConfig {
            min_path_length: 3,
            ..GrammarConfig::default()
        };
        let mut grammar = RegularGrammar::with_config(config);
        let mut rng = StdRng::seed_from_u64(11);

        for _ in 0..5 {
            grammar.randomize_with(&mut rng, 2, 2);
            assert!(grammar.table().len() >= 4);
            assert!(grammar.shortest_path_through(START).is_some_and(|d| d >= 3));
        }
    }

    #[test]
    fn test_shortfall_is_silent() {
        let grammar = GrammarBuilder::new(&['A', 'B'], 3)
            .edge(0, 'A', 1)
            .edge(1, 'B', 2)
            .exit(2)
            .build()
            .unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        let strings = grammar.produce_grammatical_with(&mut rng, 10, 1, 8, 500);
        assert_eq!(strings, HashSet::from(["AB".to_string()]));

        let none = grammar.produce_grammatical_with(&mut rng, 3, 3, 8, 500);
        assert!(none.is_empty());
    }

    #[test]
    fn test_display() {
        let grammar = GrammarBuilder::new(&['A', 'B'], 2)
            .edge(0, 'A', 1)
            .edge(1, 'B', 1)
            .exit(1)
            .build()
            .unwrap();
        assert_eq!(grammar.to_string(), "0 -A-> 1\n1 -B-> 1\n1 -> OUT");
    }

    #[test]
    fn test_builder_rejects_bad_grammars() {
        let err = GrammarBuilder::new(&['A', 'B'], 2).edge(0, 'C', 1).exit(1).build();
        assert!(matches!(err, Err(GrammarError::InvalidGrammar(_))));

        let err = GrammarBuilder::new(&['A', 'B'], 2).edge(0, 'A', 1).build();
        assert!(err.is_err());
    }

    #[test]
    fn test_set_alphabet_rebinds_edges() {
        let mut grammar = RegularGrammar::reber();
        let original = grammar.clone();
        grammar.set_alphabet(vec!['a', 'b', 'c', 'd', 'e']).unwrap();

        // T P S X V -> a b c d e
        assert!(grammar.recognize("aac"));
        assert!(!grammar.recognize("TTS"));
        assert!(grammar.same_structure(&original));
        assert!(original.same_structure(&grammar));
        assert!(grammar != original);

        assert!(grammar.set_alphabet(vec!['a', 'b']).is_err());
    }

    #[test]
    fn test_canonical_round_trip() {
        let grammar = RegularGrammar::reber();
        let text = grammar.canonical_repr().unwrap();
        let decoded = RegularGrammar::from_canonical_repr(&text).unwrap();
        assert_eq!(decoded.table(), grammar.table());
        assert_eq!(decoded.alphabet(), grammar.alphabet());
    }

    #[test]
    fn test_canonical_repr_rejects_bad_tables() {
        let out_of_range = r#"{"a":"AB","s":[{"t":{"A":3},"x":false}]}"#;
        assert!(matches!(
            RegularGrammar::from_canonical_repr(out_of_range),
            Err(GrammarError::Decode(_))
        ));

        let stray_symbol = r#"{"a":"AB","s":[{"t":{"Z":0},"x":true}]}"#;
        assert!(RegularGrammar::from_canonical_repr(stray_symbol).is_err());

        let empty = r#"{"a":"AB","s":[]}"#;
        assert!(RegularGrammar::from_canonical_repr(empty).is_err());
    }
}
