//! Structural checks over a [`TransitionTable`].
//!
//! The generator accepts a candidate graph only if every check in its
//! [`Acceptance`] chain passes. All traversals are iterative.

use std::collections::VecDeque;
use std::fmt;

use crate::graph::{START, StateId, TransitionTable};

impl TransitionTable {
    /// Check if every state is reachable from the start state
    pub fn is_connected(&self) -> bool {
        if self.is_empty() {
            return false;
        }
        let mut visited = vec![false; self.len()];
        let mut queue = VecDeque::from([START]);
        visited[START] = true;

        while let Some(id) = queue.pop_front() {
            let Some(state) = self.state(id) else { continue };
            for next in state.destinations() {
                if let Some(seen) = visited.get_mut(next) {
                    if !*seen {
                        *seen = true;
                        queue.push_back(next);
                    }
                }
            }
        }

        visited.iter().all(|&v| v)
    }

    /// Check if at least one state offers the exit
    pub fn has_exit(&self) -> bool {
        self.states().iter().any(|s| s.is_exit())
    }

    /// Minimum number of symbols emitted on the way from `from` to an exit.
    ///
    /// `None` stands for infinity: no exit is reachable.
    pub fn shortest_path_through(&self, from: StateId) -> Option<usize> {
        let mut visited = vec![false; self.len()];
        let mut queue = VecDeque::new();
        if let Some(seen) = visited.get_mut(from) {
            *seen = true;
            queue.push_back((from, 0));
        }

        while let Some((id, distance)) = queue.pop_front() {
            let Some(state) = self.state(id) else { continue };
            if state.is_exit() {
                return Some(distance);
            }
            for next in state.destinations() {
                if let Some(seen) = visited.get_mut(next) {
                    if !*seen {
                        *seen = true;
                        queue.push_back((next, distance + 1));
                    }
                }
            }
        }

        None
    }

    /// Determine if some state can never escape to an exit
    pub fn has_dead_cycle(&self) -> bool {
        (0..self.len()).any(|id| self.shortest_path_through(id).is_none())
    }

    /// Check for a loop reachable from the start state
    pub fn has_cycle(&self) -> bool {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Unseen,
            OnPath,
            Done,
        }

        if self.is_empty() {
            return false;
        }
        let mut marks = vec![Mark::Unseen; self.len()];
        // Each frame holds a state and the destinations still to explore.
        let mut stack: Vec<(StateId, Vec<StateId>)> = Vec::new();
        marks[START] = Mark::OnPath;
        stack.push((START, self.successors(START)));

        while let Some(frame) = stack.last_mut() {
            let id = frame.0;
            match frame.1.pop() {
                Some(next) => match marks.get(next).copied() {
                    Some(Mark::OnPath) => return true,
                    Some(Mark::Unseen) => {
                        marks[next] = Mark::OnPath;
                        let successors = self.successors(next);
                        stack.push((next, successors));
                    }
                    _ => {}
                },
                None => {
                    marks[id] = Mark::Done;
                    stack.pop();
                }
            }
        }

        false
    }

    fn successors(&self, id: StateId) -> Vec<StateId> {
        self.state(id)
            .map(|s| s.destinations().collect())
            .unwrap_or_default()
    }
}

/// A named acceptance predicate on candidate graphs
pub trait StructuralCheck: Send + Sync + fmt::Debug {
    /// Get the name of this check
    fn name(&self) -> &str;

    /// Whether the table satisfies this check
    fn accepts(&self, table: &TransitionTable) -> bool;
}

/// Every state is reachable from the start
#[derive(Debug, Clone)]
pub struct Connected;

impl StructuralCheck for Connected {
    fn name(&self) -> &str {
        "connected"
    }

    fn accepts(&self, table: &TransitionTable) -> bool {
        table.is_connected()
    }
}

/// Some state offers the exit
#[derive(Debug, Clone)]
pub struct HasExit;

impl StructuralCheck for HasExit {
    fn name(&self) -> &str {
        "has_exit"
    }

    fn accepts(&self, table: &TransitionTable) -> bool {
        table.has_exit()
    }
}

/// The exit is reachable from the start, but not too quickly
#[derive(Debug, Clone)]
pub struct ExitDistance {
    pub min_path_length: usize,
}

impl StructuralCheck for ExitDistance {
    fn name(&self) -> &str {
        "exit_distance"
    }

    fn accepts(&self, table: &TransitionTable) -> bool {
        table
            .shortest_path_through(START)
            .is_some_and(|d| d >= self.min_path_length)
    }
}

/// Every state can reach an exit
#[derive(Debug, Clone)]
pub struct NoDeadCycle;

impl StructuralCheck for NoDeadCycle {
    fn name(&self) -> &str {
        "no_dead_cycle"
    }

    fn accepts(&self, table: &TransitionTable) -> bool {
        !table.has_dead_cycle()
    }
}

/// A chain of checks applied in sequence, stopping at the first failure
#[derive(Debug)]
pub struct Acceptance {
    checks: Vec<Box<dyn StructuralCheck>>,
}

impl Acceptance {
    /// Create an empty chain that accepts everything
    pub fn new() -> Self {
        Acceptance { checks: Vec::new() }
    }

    /// The four well-formedness invariants every generated grammar must meet
    pub fn standard(min_path_length: usize) -> Self {
        Acceptance::new()
            .add(Connected)
            .add(HasExit)
            .add(ExitDistance { min_path_length })
            .add(NoDeadCycle)
    }

    /// Add another check to the chain
    pub fn add<C: StructuralCheck + 'static>(mut self, check: C) -> Self {
        self.checks.push(Box::new(check));
        self
    }

    /// Name of the first check the table fails, if any
    pub fn first_failure(&self, table: &TransitionTable) -> Option<&str> {
        self.checks
            .iter()
            .find(|c| !c.accepts(table))
            .map(|c| c.name())
    }

    pub fn accepts(&self, table: &TransitionTable) -> bool {
        self.first_failure(table).is_none()
    }

    /// Names of the checks in order
    pub fn names(&self) -> Vec<&str> {
        self.checks.iter().map(|c| c.name()).collect()
    }
}

impl Default for Acceptance {
    fn default() -> Self {
        Acceptance::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 0 -> 1 -> 2 -> 3 -> 4 -> 5 -> 6 with an exit on 6
    fn chain_of_seven() -> TransitionTable {
        let mut table = TransitionTable::with_states(7);
        let symbols = ['A', 'B', 'C', 'D', 'E', 'F'];
        for (from, symbol) in symbols.iter().enumerate() {
            table.set_edge(from, *symbol, from + 1);
        }
        table.set_exit(6, true);
        table
    }

    #[test]
    fn test_cycle_detection() {
        let mut table = chain_of_seven();
        table.set_edge(5, 'G', 1);
        assert!(table.has_cycle());

        table.remove_edge(5, 'G');
        assert!(!table.has_cycle());
    }

    #[test]
    fn test_self_loop_is_a_cycle() {
        let mut table = chain_of_seven();
        table.set_edge(3, 'Z', 3);
        assert!(table.has_cycle());
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let mut table = TransitionTable::with_states(4);
        table.set_edge(0, 'A', 1);
        table.set_edge(0, 'B', 2);
        table.set_edge(1, 'A', 3);
        table.set_edge(2, 'B', 3);
        table.set_exit(3, true);
        assert!(!table.has_cycle());
    }

    #[test]
    fn test_dead_cycle_detection() {
        // 1 -> 3 -> 5 -> 1 never reaches the exit on 6
        let mut table = TransitionTable::with_states(7);
        table.set_edge(0, 'A', 1);
        table.set_edge(0, 'B', 2);
        table.set_edge(1, 'A', 3);
        table.set_edge(3, 'A', 5);
        table.set_edge(5, 'A', 1);
        table.set_edge(2, 'A', 4);
        table.set_edge(4, 'A', 6);
        table.set_exit(6, true);
        assert!(table.has_dead_cycle());
        assert_eq!(table.shortest_path_through(1), None);

        // Without the closing edge 5 is a dead end, sealed as an exit.
        table.remove_edge(5, 'A');
        table.seal_empty_states();
        assert!(!table.has_dead_cycle());
        assert_eq!(table.shortest_path_through(1), Some(2));
    }

    #[test]
    fn test_shortest_path_picks_minimum() {
        let mut table = chain_of_seven();
        assert_eq!(table.shortest_path_through(START), Some(6));
        table.set_edge(0, 'Z', 5);
        assert_eq!(table.shortest_path_through(START), Some(2));
        assert_eq!(table.shortest_path_through(6), Some(0));
        assert_eq!(table.shortest_path_through(42), None);
    }

    #[test]
    fn test_connectivity() {
        let mut table = chain_of_seven();
        assert!(table.is_connected());
        table.remove_edge(2, 'C');
        assert!(!table.is_connected());
        assert!(!TransitionTable::default().is_connected());
    }

    #[test]
    fn test_acceptance_reports_first_failure() {
        let acceptance = Acceptance::standard(2);
        assert_eq!(
            acceptance.names(),
            vec!["connected", "has_exit", "exit_distance", "no_dead_cycle"]
        );

        let table = chain_of_seven();
        assert!(acceptance.accepts(&table));

        let mut early_exit = chain_of_seven();
        early_exit.set_exit(1, true);
        assert_eq!(acceptance.first_failure(&early_exit), Some("exit_distance"));

        let mut no_exit = chain_of_seven();
        no_exit.set_exit(6, false);
        assert_eq!(acceptance.first_failure(&no_exit), Some("has_exit"));

        assert!(Acceptance::new().accepts(&TransitionTable::default()));
    }
}
