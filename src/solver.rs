use std::collections::{HashMap, VecDeque};

use bit_set::BitSet;
use instant::{Duration, Instant};
use log::{debug, info, warn};

use crate::grid::{Grid, Variable};
use crate::words::{Word, WordList};
use crate::{VarId, WordId};

/// A complete mapping from variable to the word filling it.
pub type Assignment = HashMap<Variable, String>;

/// A struct tracking statistics about a solve run.
#[derive(Debug, Clone, Default)]
pub struct Statistics {
    /// How many partial assignments the search visited.
    pub states: u64,
    /// How many tentative assignments were undone.
    pub backtracks: u64,
    pub duration: Duration,
}

/// Per-variable candidate words plus the per-branch bookkeeping of the
/// backtracking search. Domains are pruned by node and arc consistency before
/// the search starts and are read-only afterwards; the search tracks its
/// partial assignment here instead of undoing domain pruning.
struct SearchState {
    chosen: Vec<Option<WordId>>,
    used_words: BitSet,
    assigned_count: usize,
}

impl SearchState {
    fn new(variable_count: usize, word_count: usize) -> SearchState {
        SearchState {
            chosen: vec![None; variable_count],
            used_words: BitSet::with_capacity(word_count),
            assigned_count: 0,
        }
    }

    fn assign(&mut self, variable: VarId, word: WordId) {
        self.chosen[variable] = Some(word);
        self.used_words.insert(word);
        self.assigned_count += 1;
    }

    fn unassign(&mut self, variable: VarId, word: WordId) {
        self.chosen[variable] = None;
        self.used_words.remove(word);
        self.assigned_count -= 1;
    }
}

/// The constraint solver for one puzzle. Owns the domain store for a run;
/// the grid and word list are shared, read-only collaborators.
pub struct Solver<'a> {
    grid: &'a Grid,
    words: &'a WordList,
    domains: Vec<Vec<WordId>>,
    statistics: Statistics,
}

impl<'a> Solver<'a> {
    /// Create a solver with every variable's domain initialized to the whole
    /// vocabulary.
    pub fn new(grid: &'a Grid, words: &'a WordList) -> Solver<'a> {
        if words.is_empty() {
            warn!("solver constructed with an empty word list");
        }

        let full_domain: Vec<WordId> = (0..words.len()).collect();
        Solver {
            grid,
            words,
            domains: vec![full_domain; grid.len()],
            statistics: Statistics::default(),
        }
    }

    /// The current candidates for a variable, in vocabulary order.
    pub fn domain(&self, variable: VarId) -> &[WordId] {
        &self.domains[variable]
    }

    /// Statistics from the most recent [`Solver::solve`] call.
    pub fn statistics(&self) -> &Statistics {
        &self.statistics
    }

    /// Find a complete, consistent assignment, or report that none exists.
    ///
    /// Node consistency and arc consistency run first; if either empties a
    /// domain the puzzle is unsatisfiable and the search is never entered.
    /// Otherwise domains are frozen and backtracking search runs over them.
    pub fn solve(&mut self) -> Option<Assignment> {
        self.statistics = Statistics::default();
        let start = Instant::now();
        let solution = self.solve_inner();
        self.statistics.duration = start.elapsed();
        solution
    }

    fn solve_inner(&mut self) -> Option<Assignment> {
        self.enforce_node_consistency();
        if let Some(variable) = self.first_empty_domain() {
            info!(
                "no candidate of matching length for {:?}; puzzle is unsatisfiable",
                self.grid.variable(variable)
            );
            return None;
        }

        if !self.ac3() {
            info!("arc consistency proved the puzzle unsatisfiable");
            return None;
        }

        let mut state = SearchState::new(self.grid.len(), self.words.len());
        let solved = self.backtrack(&mut state);
        debug!(
            "search visited {} states with {} backtracks",
            self.statistics.states, self.statistics.backtracks
        );

        if solved {
            Some(self.to_assignment(&state))
        } else {
            None
        }
    }

    /// Remove from every domain the candidates that violate the variable's
    /// unary constraints: word length must equal the slot length, and any
    /// prefilled letters must match. Reapplying is a no-op.
    pub fn enforce_node_consistency(&mut self) {
        let words = self.words;
        for (variable, domain) in self.domains.iter_mut().enumerate() {
            let length = self.grid.variable(variable).length;
            let pattern = self.grid.pattern(variable);
            domain.retain(|&word| {
                let word = words.get(word);
                word.chars.len() == length
                    && pattern.map_or(true, |pattern| {
                        word.chars
                            .iter()
                            .zip(pattern)
                            .all(|(c, fixed)| fixed.map_or(true, |fixed| *c == fixed))
                    })
            });
        }
    }

    fn first_empty_domain(&self) -> Option<VarId> {
        self.domains.iter().position(Vec::is_empty)
    }

    /// Prune from `x`'s domain every candidate with no compatible partner in
    /// `y`'s domain at the shared cell. Pairs that do not cross are trivially
    /// compatible and nothing is pruned. Returns whether anything was
    /// removed.
    pub fn revise(&mut self, x: VarId, y: VarId) -> bool {
        let (x_offset, y_offset) = match self.grid.overlap(x, y) {
            Some(offsets) => offsets,
            None => return false,
        };

        let words = self.words;
        let (x_domain, y_domain) = pair_mut(&mut self.domains, x, y);
        let before = x_domain.len();
        x_domain.retain(|&x_word| {
            let shared = match words.get(x_word).chars.get(x_offset) {
                Some(&shared) => shared,
                None => return false,
            };
            y_domain.iter().any(|&y_word| {
                words
                    .get(y_word)
                    .chars
                    .get(y_offset)
                    .map_or(false, |&c| c == shared)
            })
        });
        x_domain.len() != before
    }

    /// Enforce arc consistency across every crossing pair. Returns `false`
    /// as soon as any domain is emptied, leaving that domain observable.
    pub fn ac3(&mut self) -> bool {
        let mut arcs = VecDeque::new();
        for x in 0..self.grid.len() {
            for &y in self.grid.neighbors(x) {
                arcs.push_back((x, y));
            }
        }
        self.ac3_seeded(arcs)
    }

    /// Drain a FIFO worklist of arcs, revising each in turn. When revising
    /// `(x, y)` prunes `x`, every arc `(z, x)` from `x`'s other neighbors is
    /// requeued, since their support may have been in the removed words.
    pub fn ac3_seeded(&mut self, mut arcs: VecDeque<(VarId, VarId)>) -> bool {
        while let Some((x, y)) = arcs.pop_front() {
            if !self.revise(x, y) {
                continue;
            }
            if self.domains[x].is_empty() {
                debug!(
                    "domain of {:?} emptied while revising against {:?}",
                    self.grid.variable(x),
                    self.grid.variable(y)
                );
                return false;
            }
            for &z in self.grid.neighbors(x) {
                if z != y {
                    arcs.push_back((z, x));
                }
            }
        }
        true
    }

    /// Choose the unassigned variable with the fewest remaining candidates,
    /// breaking ties toward the one crossing the most unassigned neighbors.
    /// Ties on both counts keep the first-seen variable, so selection is
    /// deterministic.
    fn select_unassigned_variable(&self, state: &SearchState) -> VarId {
        let mut best: Option<(VarId, usize, usize)> = None;

        for variable in 0..self.grid.len() {
            if state.chosen[variable].is_some() {
                continue;
            }
            let size = self.domains[variable].len();
            let degree = self
                .grid
                .neighbors(variable)
                .iter()
                .filter(|&&n| state.chosen[n].is_none())
                .count();
            let better = match best {
                None => true,
                Some((_, best_size, best_degree)) => {
                    size < best_size || (size == best_size && degree > best_degree)
                }
            };
            if better {
                best = Some((variable, size, degree));
            }
        }

        best.expect("no unassigned variable left to select").0
    }

    /// Order a variable's candidates by how many options each would eliminate
    /// from the domains of unassigned neighbors, fewest first. The sort is
    /// stable, so equally constraining words stay in vocabulary order.
    fn order_domain_values(&self, variable: VarId, state: &SearchState) -> Vec<WordId> {
        let mut ordered = self.domains[variable].clone();
        ordered.sort_by_cached_key(|&word| {
            let word = self.words.get(word);
            let mut eliminated = 0usize;
            for &neighbor in self.grid.neighbors(variable) {
                if state.chosen[neighbor].is_some() {
                    continue;
                }
                // Neighbor lists only hold crossing pairs.
                let (offset, neighbor_offset) =
                    self.grid.overlap(variable, neighbor).unwrap();
                let shared = word.chars[offset];
                eliminated += self.domains[neighbor]
                    .iter()
                    .filter(|&&w| self.words.get(w).chars[neighbor_offset] != shared)
                    .count();
            }
            eliminated
        });
        ordered
    }

    /// Check a tentative extension against the assignment built so far: the
    /// word must be unused, and every crossing with an assigned neighbor must
    /// agree on the shared character. Applied on every extension, this keeps
    /// the whole assignment pairwise consistent without rechecking old pairs.
    fn extension_is_consistent(&self, state: &SearchState, variable: VarId, word: WordId) -> bool {
        if state.used_words.contains(word) {
            return false;
        }

        let word = self.words.get(word);
        for &neighbor in self.grid.neighbors(variable) {
            if let Some(neighbor_word) = state.chosen[neighbor] {
                let (offset, neighbor_offset) =
                    self.grid.overlap(variable, neighbor).unwrap();
                if word.chars[offset] != self.words.get(neighbor_word).chars[neighbor_offset] {
                    return false;
                }
            }
        }
        true
    }

    /// Check an arbitrary assignment pairwise: every two distinct variables
    /// must hold distinct words, and crossing pairs must agree on the shared
    /// character. Words of the wrong length, and variables that are not part
    /// of this grid, make the assignment inconsistent.
    pub fn is_consistent(&self, assignment: &Assignment) -> bool {
        let mut entries: Vec<(VarId, &str, Vec<char>)> = Vec::with_capacity(assignment.len());
        for (variable, word) in assignment {
            let id = match self.grid.index_of(variable) {
                Some(id) => id,
                None => return false,
            };
            let chars: Vec<char> = word.chars().collect();
            if chars.len() != variable.length {
                return false;
            }
            entries.push((id, word.as_str(), chars));
        }

        for (i, (a, a_word, a_chars)) in entries.iter().enumerate() {
            for (b, b_word, b_chars) in &entries[i + 1..] {
                if a_word == b_word {
                    return false;
                }
                if let Some((a_offset, b_offset)) = self.grid.overlap(*a, *b) {
                    if a_chars[a_offset] != b_chars[b_offset] {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// The canonical backtracking search: if the assignment is complete we
    /// are done, otherwise pick a variable, try its candidates in order, and
    /// undo any extension whose subtree fails.
    fn backtrack(&mut self, state: &mut SearchState) -> bool {
        self.statistics.states += 1;

        if state.assigned_count == self.grid.len() {
            return true;
        }

        let variable = self.select_unassigned_variable(state);
        for word in self.order_domain_values(variable, state) {
            if !self.extension_is_consistent(state, variable, word) {
                continue;
            }
            state.assign(variable, word);
            if self.backtrack(state) {
                return true;
            }
            state.unassign(variable, word);
            self.statistics.backtracks += 1;
        }
        false
    }

    fn to_assignment(&self, state: &SearchState) -> Assignment {
        state
            .chosen
            .iter()
            .enumerate()
            .map(|(variable, &word)| {
                let word = word.expect("complete search state is missing a variable");
                (
                    self.grid.variable(variable),
                    self.words.get(word).text.clone(),
                )
            })
            .collect()
    }

    /// The vocabulary entry behind a [`WordId`].
    pub fn word(&self, id: WordId) -> &Word {
        self.words.get(id)
    }
}

/// Split mutable access to `x`'s domain from shared access to `y`'s.
fn pair_mut(domains: &mut [Vec<WordId>], x: VarId, y: VarId) -> (&mut Vec<WordId>, &Vec<WordId>) {
    if x < y {
        let (head, tail) = domains.split_at_mut(y);
        (&mut head[x], &tail[0])
    } else {
        let (head, tail) = domains.split_at_mut(x);
        (&mut tail[0], &head[y])
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::{SearchState, Solver};
    use crate::grid::{Direction, Grid, SlotSpec, Variable};
    use crate::words::WordList;

    fn open(row: usize, col: usize, direction: Direction, length: usize) -> SlotSpec {
        SlotSpec {
            row,
            col,
            direction,
            length,
            fill: None,
        }
    }

    fn texts(solver: &Solver, ids: &[usize]) -> Vec<String> {
        ids.iter().map(|&id| solver.word(id).text.clone()).collect()
    }

    /// Two crossing slots, across length 3 and down length 4, sharing the
    /// across slot's offset 1 and the down slot's offset 0. Only "dog" and
    /// "oboe" agree on the shared letter.
    #[test]
    fn crossing_pair_takes_the_only_matching_words() {
        let grid = Grid::from_slots(&[
            open(0, 0, Direction::Across, 3),
            open(0, 1, Direction::Down, 4),
        ])
        .unwrap();
        let words = WordList::new(["cat", "dog", "code", "data", "oboe"]);

        let mut solver = Solver::new(&grid, &words);
        let assignment = solver.solve().expect("puzzle has a solution");

        assert_eq!(assignment[&grid.variable(0)], "dog");
        assert_eq!(assignment[&grid.variable(1)], "oboe");
    }

    #[test]
    fn lone_slot_takes_the_only_word_of_its_length() {
        let grid = Grid::from_slots(&[open(0, 0, Direction::Across, 3)]).unwrap();
        let words = WordList::new(["oboe", "cat", "data"]);

        let mut solver = Solver::new(&grid, &words);
        let assignment = solver.solve().expect("puzzle has a solution");

        assert_eq!(assignment[&grid.variable(0)], "cat");
    }

    #[test]
    fn no_word_of_matching_length_means_no_solution() {
        let grid = Grid::from_slots(&[open(0, 0, Direction::Across, 5)]).unwrap();
        let words = WordList::new(["cat", "dog"]);

        let mut solver = Solver::new(&grid, &words);
        assert!(solver.solve().is_none());
        assert_eq!(solver.statistics().states, 0);
        assert_eq!(solver.statistics().backtracks, 0);
    }

    /// The across candidates place 'a' or 'b' in the shared cell, the down
    /// candidates 'c' or 'd'. Arc consistency alone proves unsatisfiability,
    /// so the search never starts.
    #[test]
    fn disjoint_overlap_letters_fail_before_search() {
        let grid = Grid::from_slots(&[
            open(0, 0, Direction::Across, 3),
            open(0, 1, Direction::Down, 4),
        ])
        .unwrap();
        let words = WordList::new(["aaa", "bbb", "cccc", "dddd"]);

        let mut solver = Solver::new(&grid, &words);
        assert!(solver.solve().is_none());
        assert_eq!(solver.statistics().states, 0);
        assert_eq!(solver.statistics().backtracks, 0);
    }

    #[test]
    fn node_consistency_is_idempotent() {
        let grid = Grid::from_slots(&[
            open(0, 0, Direction::Across, 3),
            open(0, 1, Direction::Down, 4),
        ])
        .unwrap();
        let words = WordList::new(["cat", "dog", "code", "data", "oboe"]);

        let mut solver = Solver::new(&grid, &words);
        solver.enforce_node_consistency();
        let first: Vec<Vec<usize>> = vec![solver.domain(0).to_vec(), solver.domain(1).to_vec()];

        solver.enforce_node_consistency();
        let second = vec![solver.domain(0).to_vec(), solver.domain(1).to_vec()];

        assert_eq!(first, second);
        assert_eq!(texts(&solver, solver.domain(0)), ["cat", "dog"]);
        assert_eq!(texts(&solver, solver.domain(1)), ["code", "data", "oboe"]);
    }

    #[test]
    fn node_consistency_applies_prefilled_letters() {
        let grid = Grid::from_slots(&[SlotSpec {
            row: 0,
            col: 0,
            direction: Direction::Across,
            length: 3,
            fill: Some("c..".to_string()),
        }])
        .unwrap();
        let words = WordList::new(["dog", "cat", "cow"]);

        let mut solver = Solver::new(&grid, &words);
        solver.enforce_node_consistency();

        assert_eq!(texts(&solver, solver.domain(0)), ["cat", "cow"]);
    }

    /// After a successful AC-3 pass, every remaining candidate has at least
    /// one compatible partner in each crossing slot's domain.
    #[test]
    fn ac3_leaves_every_candidate_supported() {
        let grid = Grid::from_template(
            "
            ...
            ...
            ...
            ",
        )
        .unwrap();
        let words = WordList::new(["abc", "def", "ghi", "adg", "beh", "cfi", "zzz"]);

        let mut solver = Solver::new(&grid, &words);
        solver.enforce_node_consistency();
        assert!(solver.ac3());

        for x in 0..grid.len() {
            assert!(!solver.domain(x).is_empty());
            for &y in grid.neighbors(x) {
                let (x_offset, y_offset) = grid.overlap(x, y).unwrap();
                for &x_word in solver.domain(x) {
                    let shared = solver.word(x_word).chars[x_offset];
                    assert!(
                        solver
                            .domain(y)
                            .iter()
                            .any(|&y_word| solver.word(y_word).chars[y_offset] == shared),
                        "{} has no support at offset {} of its crossing",
                        solver.word(x_word).text,
                        x_offset,
                    );
                }
            }
        }
    }

    #[test]
    fn seeded_ac3_revises_only_the_given_arcs() {
        let grid = Grid::from_slots(&[
            open(0, 0, Direction::Across, 3),
            open(0, 1, Direction::Down, 4),
        ])
        .unwrap();
        let words = WordList::new(["cat", "dog", "oboe", "code"]);

        let mut solver = Solver::new(&grid, &words);
        solver.enforce_node_consistency();

        // Revising only (down, across) prunes the down slot against the
        // across candidates but leaves the across domain untouched.
        assert!(solver.ac3_seeded(VecDeque::from([(1, 0)])));
        assert_eq!(texts(&solver, solver.domain(0)), ["cat", "dog"]);
        assert_eq!(texts(&solver, solver.domain(1)), ["oboe"]);
    }

    #[test]
    fn a_word_is_never_used_twice() {
        // Two slots of the same length with no shared cell and only one word
        // of that length: the second slot can never be filled.
        let grid = Grid::from_slots(&[
            open(0, 0, Direction::Across, 3),
            open(5, 0, Direction::Across, 3),
        ])
        .unwrap();
        let words = WordList::new(["cat"]);

        let mut solver = Solver::new(&grid, &words);
        assert!(solver.solve().is_none());
    }

    #[test]
    fn solved_square_satisfies_every_constraint() {
        let grid = Grid::from_template(
            "
            ...
            ...
            ...
            ",
        )
        .unwrap();
        let words = WordList::new(["abc", "def", "ghi", "adg", "beh", "cfi"]);

        let mut solver = Solver::new(&grid, &words);
        let assignment = solver.solve().expect("word square has a fill");

        assert_eq!(assignment.len(), grid.len());
        assert!(solver.is_consistent(&assignment));
        for (variable, word) in &assignment {
            assert_eq!(word.chars().count(), variable.length);
        }
    }

    #[test]
    fn prefilled_grids_solve_around_their_letters() {
        let grid = Grid::from_template(
            "
            d..
            ...
            ...
            ",
        )
        .unwrap();
        let words = WordList::new(["abc", "def", "ghi", "dag", "ebh", "fci"]);

        let mut solver = Solver::new(&grid, &words);
        let assignment = solver.solve().expect("prefilled square has a fill");

        let top = Variable {
            row: 0,
            col: 0,
            direction: Direction::Across,
            length: 3,
        };
        assert!(assignment[&top].starts_with('d'));
        assert!(solver.is_consistent(&assignment));
    }

    #[test]
    fn least_constraining_values_come_first() {
        let grid = Grid::from_slots(&[
            open(0, 0, Direction::Across, 2),
            open(0, 0, Direction::Down, 2),
        ])
        .unwrap();
        let words = WordList::new(["ba", "aa", "bb", "ab", "ax"]);

        let mut solver = Solver::new(&grid, &words);
        solver.enforce_node_consistency();

        // Words starting with 'a' eliminate two of the crossing slot's five
        // candidates, words starting with 'b' eliminate three. Ties keep
        // vocabulary order.
        let state = SearchState::new(grid.len(), words.len());
        let ordered = solver.order_domain_values(0, &state);
        assert_eq!(texts(&solver, &ordered), ["aa", "ab", "ax", "ba", "bb"]);
    }

    #[test]
    fn smallest_domain_is_selected_first() {
        let grid = Grid::from_slots(&[
            open(0, 0, Direction::Across, 3),
            open(5, 0, Direction::Across, 4),
        ])
        .unwrap();
        let words = WordList::new(["cat", "dog", "oboe"]);

        let mut solver = Solver::new(&grid, &words);
        solver.enforce_node_consistency();

        let state = SearchState::new(grid.len(), words.len());
        assert_eq!(solver.select_unassigned_variable(&state), 1);
    }

    #[test]
    fn degree_breaks_domain_size_ties() {
        // All three slots see the same two-word domain; the down slot
        // crosses both across slots while each across slot crosses only it.
        // It is declared second so plain first-seen selection would miss it.
        let grid = Grid::from_slots(&[
            open(0, 0, Direction::Across, 2),
            open(0, 0, Direction::Down, 2),
            open(1, 0, Direction::Across, 2),
        ])
        .unwrap();
        let words = WordList::new(["ab", "ba"]);

        let mut solver = Solver::new(&grid, &words);
        solver.enforce_node_consistency();

        let state = SearchState::new(grid.len(), words.len());
        assert_eq!(solver.select_unassigned_variable(&state), 1);
    }

    #[test]
    fn full_consistency_check_rejects_reuse_and_mismatches() {
        let grid = Grid::from_slots(&[
            open(0, 0, Direction::Across, 3),
            open(0, 1, Direction::Down, 4),
        ])
        .unwrap();
        let words = WordList::new(["dog", "oboe"]);
        let solver = Solver::new(&grid, &words);

        let mut good = super::Assignment::new();
        good.insert(grid.variable(0), "dog".to_string());
        good.insert(grid.variable(1), "oboe".to_string());
        assert!(solver.is_consistent(&good));

        // Shared cell disagrees: 'a' vs 'o'.
        let mut mismatched = super::Assignment::new();
        mismatched.insert(grid.variable(0), "cat".to_string());
        mismatched.insert(grid.variable(1), "oboe".to_string());
        assert!(!solver.is_consistent(&mismatched));

        // Same word in two slots.
        let grid = Grid::from_slots(&[
            open(0, 0, Direction::Across, 3),
            open(5, 0, Direction::Across, 3),
        ])
        .unwrap();
        let solver = Solver::new(&grid, &words);
        let mut reused = super::Assignment::new();
        reused.insert(grid.variable(0), "dog".to_string());
        reused.insert(grid.variable(1), "dog".to_string());
        assert!(!solver.is_consistent(&reused));
    }

    #[test]
    fn statistics_reset_between_runs() {
        let grid = Grid::from_slots(&[open(0, 0, Direction::Across, 3)]).unwrap();
        let words = WordList::new(["cat"]);

        let mut solver = Solver::new(&grid, &words);
        assert!(solver.solve().is_some());
        let first_states = solver.statistics().states;
        assert!(first_states > 0);

        assert!(solver.solve().is_some());
        assert_eq!(solver.statistics().states, first_states);
    }
}
