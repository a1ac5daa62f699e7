//! Derivation of ungrammatical strings from grammatical ones.
//!
//! Loosely follows Reber & Allen (1978): a grammatical string is broken in one
//! of several ways and kept only if the grammar really rejects the result.

use std::collections::HashSet;

use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};
use rand::seq::SliceRandom;
use tracing::{debug, trace};

use crate::grammar::Grammar;

/// The ways a grammatical string can be made ungrammatical
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    WrongFirst,
    WrongSecond,
    WrongPenultimate,
    WrongTermination,
    WrongInternal,
    Backwards,
    /// An arbitrary string over the alphabet
    Random,
}

/// Relative frequency of each kind of error
pub const ERROR_WEIGHTS: [(ErrorKind, u32); 7] = [
    (ErrorKind::WrongFirst, 5),
    (ErrorKind::WrongSecond, 5),
    (ErrorKind::WrongPenultimate, 5),
    (ErrorKind::WrongTermination, 5),
    (ErrorKind::WrongInternal, 2),
    (ErrorKind::Backwards, 3),
    (ErrorKind::Random, 5),
];

impl ErrorKind {
    /// Whether this kind needs a grammatical string to start from
    pub fn needs_source(self) -> bool {
        self != ErrorKind::Random
    }

    /// Apply the error to `source`.
    ///
    /// Returns `None` when the source is too short for this kind of error.
    pub fn apply<R: Rng + ?Sized>(
        self,
        rng: &mut R,
        source: &str,
        alphabet: &[char],
        min_length: usize,
        max_length: usize,
    ) -> Option<String> {
        let symbols: Vec<char> = source.chars().collect();
        let len = symbols.len();
        match self {
            ErrorKind::Random => {
                let length = rng.gen_range(min_length..=max_length);
                (0..length)
                    .map(|_| alphabet.choose(rng).copied())
                    .collect::<Option<String>>()
            }
            ErrorKind::Backwards => Some(symbols.iter().rev().collect()),
            ErrorKind::WrongTermination => {
                if len < min_length + 1 {
                    return None;
                }
                Some(symbols[..len - 1].iter().collect())
            }
            ErrorKind::WrongFirst => replace_at(rng, symbols, 0, alphabet),
            ErrorKind::WrongSecond => replace_at(rng, symbols, 1, alphabet),
            ErrorKind::WrongPenultimate => {
                let index = len.checked_sub(2)?;
                replace_at(rng, symbols, index, alphabet)
            }
            ErrorKind::WrongInternal => {
                if len < 5 {
                    return None;
                }
                let index = rng.gen_range(2..=len - 3);
                replace_at(rng, symbols, index, alphabet)
            }
        }
    }
}

/// Swap the symbol at `index` for a different one from the alphabet
fn replace_at<R: Rng + ?Sized>(
    rng: &mut R,
    mut symbols: Vec<char>,
    index: usize,
    alphabet: &[char],
) -> Option<String> {
    let current = *symbols.get(index)?;
    let others: Vec<char> = alphabet.iter().copied().filter(|&c| c != current).collect();
    symbols[index] = *others.choose(rng)?;
    Some(symbols.into_iter().collect())
}

/// Pick an error kind according to [`ERROR_WEIGHTS`]
pub fn pick_error_kind<R: Rng + ?Sized>(rng: &mut R, weights: &WeightedIndex<u32>) -> ErrorKind {
    ERROR_WEIGHTS[weights.sample(rng)].0
}

/// Grammatical source strings drawn per requested ungrammatical string
const SOURCES_PER_STRING: usize = 4;

fn error_distribution() -> Option<WeightedIndex<u32>> {
    WeightedIndex::new(ERROR_WEIGHTS.iter().map(|(_, w)| *w)).ok()
}

/// Collect up to `num_strings` distinct strings the grammar rejects.
///
/// At most `max_attempts` candidates are tried, and the grammatical sources
/// they are derived from come from one draw of at most `max_attempts` walks.
/// A shortfall is not an error, callers must count the result.
pub fn produce_ungrammatical<G, R>(
    grammar: &G,
    rng: &mut R,
    num_strings: usize,
    min_length: usize,
    max_length: usize,
    max_attempts: usize,
) -> HashSet<String>
where
    G: Grammar,
    R: Rng + ?Sized,
{
    let mut ungrammatical = HashSet::new();
    let Some(weights) = error_distribution() else {
        return ungrammatical;
    };
    if min_length > max_length {
        return ungrammatical;
    }

    // Drawn on first use. If empty, only random errors remain.
    let mut sources: Option<Vec<String>> = None;
    let mut attempts = 0;
    while ungrammatical.len() < num_strings && attempts < max_attempts {
        attempts += 1;
        let kind = pick_error_kind(rng, &weights);

        let source = if kind.needs_source() {
            let pool = sources.get_or_insert_with(|| {
                let wanted = num_strings.saturating_mul(SOURCES_PER_STRING);
                let mut drawn: Vec<String> = grammar
                    .produce_grammatical_with(rng, wanted, min_length, max_length, max_attempts)
                    .into_iter()
                    .collect();
                // set order is not seeded
                drawn.sort_unstable();
                if drawn.is_empty() {
                    debug!("grammar yielded no source string, falling back to random errors");
                }
                drawn
            });
            match pool.choose(rng) {
                Some(source) => source.clone(),
                None => continue,
            }
        } else {
            String::new()
        };

        let Some(candidate) = kind.apply(rng, &source, grammar.alphabet(), min_length, max_length)
        else {
            continue;
        };

        let length = candidate.chars().count();
        if (min_length..=max_length).contains(&length) && !grammar.recognize(&candidate) {
            trace!(?kind, %candidate, "ungrammatical string");
            ungrammatical.insert(candidate);
        }
    }

    if ungrammatical.len() < num_strings {
        debug!(
            requested = num_strings,
            produced = ungrammatical.len(),
            attempts,
            "ungrammatical string budget exhausted"
        );
    }
    ungrammatical
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::fmt;

    use crate::grammar::GrammarConfig;
    use crate::regular::RegularGrammar;
    use crate::utils::Result;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const ALPHABET: [char; 3] = ['A', 'B', 'C'];

    #[test]
    fn test_weights_sum() {
        let total: u32 = ERROR_WEIGHTS.iter().map(|(_, w)| w).sum();
        assert_eq!(total, 30);
        assert!(error_distribution().is_some());
    }

    #[test]
    fn test_positional_replacements() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..50 {
            let first = ErrorKind::WrongFirst.apply(&mut rng, "AAAA", &ALPHABET, 2, 8).unwrap();
            assert_ne!(&first[..1], "A");
            assert_eq!(&first[1..], "AAA");

            let second = ErrorKind::WrongSecond.apply(&mut rng, "AAAA", &ALPHABET, 2, 8).unwrap();
            assert_eq!(&second[..1], "A");
            assert_ne!(&second[1..2], "A");

            let penultimate = ErrorKind::WrongPenultimate
                .apply(&mut rng, "AAAA", &ALPHABET, 2, 8)
                .unwrap();
            assert_eq!(&penultimate[..2], "AA");
            assert_ne!(&penultimate[2..3], "A");
            assert_eq!(&penultimate[3..], "A");

            let internal = ErrorKind::WrongInternal
                .apply(&mut rng, "AAAAAA", &ALPHABET, 2, 8)
                .unwrap();
            assert_eq!(&internal[..2], "AA");
            assert_eq!(&internal[4..], "AA");
            assert_eq!(internal.matches('A').count(), 5);
        }
    }

    #[test]
    fn test_short_sources_are_skipped() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(ErrorKind::WrongInternal.apply(&mut rng, "ABCA", &ALPHABET, 2, 8), None);
        assert_eq!(ErrorKind::WrongSecond.apply(&mut rng, "A", &ALPHABET, 1, 8), None);
        assert_eq!(ErrorKind::WrongTermination.apply(&mut rng, "AB", &ALPHABET, 2, 8), None);
        assert_eq!(
            ErrorKind::WrongTermination.apply(&mut rng, "ABC", &ALPHABET, 2, 8),
            Some("AB".to_string())
        );
        assert_eq!(ErrorKind::WrongFirst.apply(&mut rng, "A", &['A'], 1, 8), None);
    }

    #[test]
    fn test_backwards_and_random() {
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(
            ErrorKind::Backwards.apply(&mut rng, "ABC", &ALPHABET, 2, 8),
            Some("CBA".to_string())
        );
        for _ in 0..50 {
            let random = ErrorKind::Random.apply(&mut rng, "", &ALPHABET, 3, 5).unwrap();
            assert!((3..=5).contains(&random.len()));
            assert!(random.chars().all(|c| ALPHABET.contains(&c)));
        }
    }

    /// Wraps a grammar and records every budget handed to its producer
    struct Budgeted {
        inner: RegularGrammar,
        budgets: RefCell<Vec<usize>>,
    }

    impl fmt::Display for Budgeted {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            fmt::Display::fmt(&self.inner, f)
        }
    }

    impl Grammar for Budgeted {
        fn config(&self) -> &GrammarConfig {
            self.inner.config()
        }

        fn set_config(&mut self, config: GrammarConfig) {
            self.inner.set_config(config)
        }

        fn set_alphabet(&mut self, alphabet: Vec<char>) -> Result<()> {
            self.inner.set_alphabet(alphabet)
        }

        fn randomize_oversized_with<R: Rng + ?Sized>(&mut self, rng: &mut R, oversize: usize) {
            self.inner.randomize_oversized_with(rng, oversize)
        }

        fn produce_grammatical_with<R: Rng + ?Sized>(
            &self,
            rng: &mut R,
            num_strings: usize,
            min_length: usize,
            max_length: usize,
            max_attempts: usize,
        ) -> HashSet<String> {
            self.budgets.borrow_mut().push(max_attempts);
            self.inner
                .produce_grammatical_with(rng, num_strings, min_length, max_length, max_attempts)
        }

        fn recognize(&self, string: &str) -> bool {
            self.inner.recognize(string)
        }

        fn has_cycle(&self) -> bool {
            self.inner.has_cycle()
        }

        fn same_structure(&self, other: &Self) -> bool {
            self.inner.same_structure(&other.inner)
        }

        fn canonical_repr(&self) -> Result<String> {
            self.inner.canonical_repr()
        }

        fn from_canonical_repr(text: &str) -> Result<Self> {
            Ok(Budgeted {
                inner: RegularGrammar::from_canonical_repr(text)?,
                budgets: RefCell::new(Vec::new()),
            })
        }
    }

    #[test]
    fn test_sources_share_one_walk_budget() {
        let grammar = Budgeted {
            inner: RegularGrammar::reber(),
            budgets: RefCell::new(Vec::new()),
        };
        let mut rng = StdRng::seed_from_u64(5);

        let strings = produce_ungrammatical(&grammar, &mut rng, 10, 3, 10, 500);
        assert_eq!(strings.len(), 10);
        assert!(strings.iter().all(|s| !grammar.recognize(s)));
        assert_eq!(*grammar.budgets.borrow(), vec![500]);
    }

    #[test]
    fn test_sourceless_grammar_falls_back_to_random() {
        // The only accepted string is "AB", which is shorter than the minimum.
        let inner = crate::regular::GrammarBuilder::new(&['A', 'B'], 3)
            .edge(0, 'A', 1)
            .edge(1, 'B', 2)
            .exit(2)
            .build()
            .unwrap();
        let grammar = Budgeted {
            inner,
            budgets: RefCell::new(Vec::new()),
        };
        let mut rng = StdRng::seed_from_u64(6);

        let strings = produce_ungrammatical(&grammar, &mut rng, 5, 3, 6, 2_000);
        assert_eq!(strings.len(), 5);
        assert_eq!(grammar.budgets.borrow().len(), 1);
    }

    #[test]
    fn test_every_kind_gets_picked() {
        let mut rng = StdRng::seed_from_u64(11);
        let weights = error_distribution().unwrap();
        let picked: HashSet<ErrorKind> = (0..2_000).map(|_| pick_error_kind(&mut rng, &weights)).collect();
        assert_eq!(picked.len(), ERROR_WEIGHTS.len());
    }
}
