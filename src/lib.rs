//! Fill crossword-style grids from a vocabulary by constraint solving.
//!
//! Length filtering and arc consistency (AC-3) prune each slot's candidate
//! words, then backtracking search guided by the minimum-remaining-values and
//! least-constraining-value heuristics assigns a distinct word to every slot
//! so that crossing slots agree on their shared letters.

pub mod grid;
pub mod render;
pub mod solver;
pub mod words;

pub use grid::{Direction, FillPattern, Grid, GridError, SlotSpec, Variable};
pub use render::render_grid;
pub use solver::{Assignment, Solver, Statistics};
pub use words::{Word, WordList};

/// The expected maximum length for a single slot.
pub const MAX_SLOT_LENGTH: usize = 21;

/// An identifier for a given slot, based on its index in the grid's variable
/// list.
pub type VarId = usize;

/// An identifier for a given word, based on its index in the word list.
pub type WordId = usize;
