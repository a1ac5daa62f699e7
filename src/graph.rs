//! The state/transition representation shared by regular-grammar operations.
//!
//! States live in an arena and refer to each other by index only, so cyclic
//! graphs need no shared ownership. State 0 is always the start state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Index of a state in a [`TransitionTable`]
pub type StateId = usize;

/// The start state of every table
pub const START: StateId = 0;

/// An outgoing edge label: either a symbol or the exit marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Label {
    /// Consumes and emits a symbol
    Symbol(char),
    /// Accepts the string at the current state
    Exit,
}

/// One state with its outgoing edges
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    /// Destination per symbol
    #[serde(rename = "t", default)]
    pub(crate) transitions: BTreeMap<char, StateId>,
    /// Whether this state offers the exit marker
    #[serde(rename = "x", default)]
    pub(crate) exit: bool,
}

impl State {
    /// A state with no edges at all
    pub fn new() -> Self {
        State::default()
    }

    /// A dead end that only offers the exit
    pub fn exit_only() -> Self {
        State {
            transitions: BTreeMap::new(),
            exit: true,
        }
    }

    pub fn is_exit(&self) -> bool {
        self.exit
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty() && !self.exit
    }

    /// Follow the edge labelled `symbol`
    pub fn next(&self, symbol: char) -> Option<StateId> {
        self.transitions.get(&symbol).copied()
    }

    /// Distinct destination states, excluding the exit
    pub fn destinations(&self) -> impl Iterator<Item = StateId> + '_ {
        self.transitions.values().copied()
    }

    /// Whether some symbol edge already leads to `to`
    pub fn leads_to(&self, to: StateId) -> bool {
        self.transitions.values().any(|&d| d == to)
    }

    /// All outgoing labels in a stable order, exit last
    pub fn labels(&self) -> Vec<Label> {
        let mut labels: Vec<Label> = self.transitions.keys().map(|&c| Label::Symbol(c)).collect();
        if self.exit {
            labels.push(Label::Exit);
        }
        labels
    }

    pub fn transitions(&self) -> &BTreeMap<char, StateId> {
        &self.transitions
    }
}

/// The arena of states making up a regular grammar's graph
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransitionTable {
    states: Vec<State>,
}

impl TransitionTable {
    /// Create a table with `count` empty states
    pub fn with_states(count: usize) -> Self {
        TransitionTable {
            states: vec![State::new(); count],
        }
    }

    pub fn from_states(states: Vec<State>) -> Self {
        TransitionTable { states }
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn state(&self, id: StateId) -> Option<&State> {
        self.states.get(id)
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    /// Insert or overwrite the edge `from -symbol-> to`.
    ///
    /// Returns false if either state is out of range.
    pub fn set_edge(&mut self, from: StateId, symbol: char, to: StateId) -> bool {
        if to >= self.states.len() {
            return false;
        }
        match self.states.get_mut(from) {
            Some(state) => {
                state.transitions.insert(symbol, to);
                true
            }
            None => false,
        }
    }

    /// Remove the edge labelled `symbol` leaving `from`
    pub fn remove_edge(&mut self, from: StateId, symbol: char) -> Option<StateId> {
        self.states.get_mut(from)?.transitions.remove(&symbol)
    }

    pub fn set_exit(&mut self, id: StateId, exit: bool) -> bool {
        match self.states.get_mut(id) {
            Some(state) => {
                state.exit = exit;
                true
            }
            None => false,
        }
    }

    /// Turn every edgeless state into an exit-only dead end
    pub fn seal_empty_states(&mut self) {
        for state in &mut self.states {
            if state.is_empty() {
                state.exit = true;
            }
        }
    }

    /// Check that every destination is a valid state index
    pub fn indices_in_range(&self) -> bool {
        let n = self.states.len();
        self.states.iter().all(|s| s.destinations().all(|d| d < n))
    }

    /// Every symbol appearing on some edge, sorted
    pub fn symbols_used(&self) -> Vec<char> {
        let mut used: Vec<char> = self
            .states
            .iter()
            .flat_map(|s| s.transitions.keys().copied())
            .collect();
        used.sort_unstable();
        used.dedup();
        used
    }

    /// Replace each symbol through `map`, keeping every edge
    pub(crate) fn relabel<F>(&mut self, map: F)
    where
        F: Fn(char) -> char,
    {
        for state in &mut self.states {
            state.transitions = state
                .transitions
                .iter()
                .map(|(&symbol, &to)| (map(symbol), to))
                .collect();
        }
    }
}
