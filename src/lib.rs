//! AGL-Grammar generates the hidden languages of artificial grammar learning
//! experiments.
//!
//! Two kinds of grammar are supported: regular grammars, i.e. random finite
//! state machines checked for connectivity and reachable exits, and pattern
//! grammars built from fixed-length sequences of symbol classes. Both produce
//! grammatical stimuli, derive ungrammatical ones, recognize arbitrary strings
//! and can be stored in an obfuscated text form.
//!
//! # Example
//!
//! ```rust
//! use agl_grammar::{Grammar, RegularGrammar};
//!
//! let grammar = RegularGrammar::reber();
//! assert!(grammar.recognize("TPTXVPXVPS"));
//! assert!(!grammar.recognize("TPS"));
//!
//! let stored = grammar.obfuscated_repr().unwrap();
//! let restored = RegularGrammar::from_obfuscated_repr(&stored).unwrap();
//! assert_eq!(restored, grammar);
//! ```

pub mod codec;
pub mod grammar;
pub mod graph;
pub mod logging;
pub mod mutator;
pub mod pattern;
pub mod regular;
pub mod search;
pub mod utils;
pub mod validator;

pub use grammar::{Grammar, GrammarConfig};
pub use pattern::PatternGrammar;
pub use regular::{GrammarBuilder, RegularGrammar};
pub use search::{GrammarSearch, SearchOutcome};
pub use utils::{GrammarError, Result};

// Re-export the graph model
pub use graph::{Label, State, StateId, TransitionTable};
