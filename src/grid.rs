use std::collections::{HashMap, HashSet};

use smallvec::{smallvec, SmallVec};

use crate::{VarId, MAX_SLOT_LENGTH};

/// Zero-indexed (row, col) coords for a cell in the grid, where row 0 is the
/// top row.
type CellCoord = (usize, usize);

/// Direction that a slot is facing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Across,
    Down,
}

/// Identity and geometry of a single fillable slot. Two variables are equal
/// iff all four fields match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Variable {
    pub row: usize,
    pub col: usize,
    pub direction: Direction,
    pub length: usize,
}

impl Variable {
    /// Generate the coords for each cell of this variable, in word order.
    pub fn cells(&self) -> SmallVec<[CellCoord; MAX_SLOT_LENGTH]> {
        (0..self.length)
            .map(|k| match self.direction {
                Direction::Across => (self.row, self.col + k),
                Direction::Down => (self.row + k, self.col),
            })
            .collect()
    }
}

/// A declared slot in the input to [`Grid::from_slots`]. `fill` optionally
/// prefills cells with letters, using `.` for cells left open.
#[derive(Debug, Clone)]
pub struct SlotSpec {
    pub row: usize,
    pub col: usize,
    pub direction: Direction,
    pub length: usize,
    pub fill: Option<String>,
}

/// Prefilled letters for a slot, indexed by character offset.
pub type FillPattern = SmallVec<[Option<char>; MAX_SLOT_LENGTH]>;

/// A malformed puzzle description. Distinct from an unsatisfiable puzzle,
/// which is a valid solver outcome rather than an input error.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    #[error("grid contains no slots")]
    Empty,

    #[error("template line {line} has a different width than the first line")]
    RaggedTemplate { line: usize },

    #[error("slot at row {row}, column {col} has length {length}; slots must span at least two cells")]
    SlotTooShort { row: usize, col: usize, length: usize },

    #[error("slot at row {row}, column {col} is declared more than once")]
    DuplicateSlot { row: usize, col: usize },

    #[error("prefill \"{fill}\" does not fit a slot of length {length}")]
    FillLengthMismatch { fill: String, length: usize },

    #[error("conflicting prefilled letters at row {row}, column {col}")]
    ConflictingFill { row: usize, col: usize },

    #[error("more than two slots occupy the cell at row {row}, column {col}")]
    CrowdedCell { row: usize, col: usize },

    #[error("slots at row {row_a}, column {col_a} and row {row_b}, column {col_b} share more than one cell")]
    RepeatedCrossing {
        row_a: usize,
        col_a: usize,
        row_b: usize,
        col_b: usize,
    },
}

/// A cell of the grid during construction, tracking which slots cover it (as
/// slot id and character offset pairs) and any prefilled letter.
struct Cell {
    covering: SmallVec<[(VarId, usize); 2]>,
    letter: Option<char>,
}

/// The static model of a puzzle: its variables, their pairwise overlaps and
/// any prefilled letters. Built once by the loader and never mutated; the
/// solver reads it for both consistency enforcement and assignment
/// validation.
#[derive(Debug, Clone)]
pub struct Grid {
    variables: Vec<Variable>,
    /// For each ordered pair of variables, the character offsets of their
    /// shared cell, or `None` when they do not cross.
    overlaps: Vec<Vec<Option<(usize, usize)>>>,
    neighbors: Vec<Vec<VarId>>,
    patterns: Vec<Option<FillPattern>>,
}

impl Grid {
    /// Build a grid from explicit slot declarations.
    pub fn from_slots(slots: &[SlotSpec]) -> Result<Grid, GridError> {
        let mut variables = Vec::with_capacity(slots.len());
        let mut seen: HashSet<Variable> = HashSet::new();

        for spec in slots {
            if spec.length < 2 {
                return Err(GridError::SlotTooShort {
                    row: spec.row,
                    col: spec.col,
                    length: spec.length,
                });
            }
            if let Some(fill) = &spec.fill {
                if fill.chars().count() != spec.length {
                    return Err(GridError::FillLengthMismatch {
                        fill: fill.clone(),
                        length: spec.length,
                    });
                }
            }

            let variable = Variable {
                row: spec.row,
                col: spec.col,
                direction: spec.direction,
                length: spec.length,
            };
            if !seen.insert(variable) {
                return Err(GridError::DuplicateSlot {
                    row: spec.row,
                    col: spec.col,
                });
            }
            variables.push(variable);
        }

        if variables.is_empty() {
            return Err(GridError::Empty);
        }

        // Map each cell to the slots covering it and any prefilled letter.
        // Letters prefilled through one slot constrain every slot sharing the
        // cell.
        let mut cells: HashMap<CellCoord, Cell> = HashMap::new();
        for (id, spec) in slots.iter().enumerate() {
            for (offset, coord) in variables[id].cells().into_iter().enumerate() {
                let letter = spec.fill.as_ref().and_then(|fill| {
                    let ch = fill.chars().nth(offset).unwrap();
                    (ch != '.').then(|| ch)
                });

                let cell = cells.entry(coord).or_insert_with(|| Cell {
                    covering: smallvec![],
                    letter: None,
                });
                if cell.covering.len() == 2 {
                    return Err(GridError::CrowdedCell {
                        row: coord.0,
                        col: coord.1,
                    });
                }
                match (cell.letter, letter) {
                    (Some(a), Some(b)) if a != b => {
                        return Err(GridError::ConflictingFill {
                            row: coord.0,
                            col: coord.1,
                        });
                    }
                    (None, Some(_)) => cell.letter = letter,
                    _ => {}
                }
                cell.covering.push((id, offset));
            }
        }

        // Derive the pairwise overlap table and neighbor lists. Iterating
        // variables rather than the cell map keeps neighbor order, and with
        // it the solver's arc queue, deterministic.
        let count = variables.len();
        let mut overlaps = vec![vec![None; count]; count];
        let mut neighbors: Vec<Vec<VarId>> = vec![Vec::new(); count];

        for a in 0..count {
            for (offset_a, coord) in variables[a].cells().into_iter().enumerate() {
                for &(b, offset_b) in &cells[&coord].covering {
                    if b <= a {
                        continue;
                    }
                    if overlaps[a][b].is_some() {
                        return Err(GridError::RepeatedCrossing {
                            row_a: variables[a].row,
                            col_a: variables[a].col,
                            row_b: variables[b].row,
                            col_b: variables[b].col,
                        });
                    }
                    overlaps[a][b] = Some((offset_a, offset_b));
                    overlaps[b][a] = Some((offset_b, offset_a));
                    neighbors[a].push(b);
                    neighbors[b].push(a);
                }
            }
        }

        let patterns = variables
            .iter()
            .map(|variable| {
                let pattern: FillPattern = variable
                    .cells()
                    .into_iter()
                    .map(|coord| cells[&coord].letter)
                    .collect();
                pattern.iter().any(Option::is_some).then(|| pattern)
            })
            .collect();

        Ok(Grid {
            variables,
            overlaps,
            neighbors,
            patterns,
        })
    }

    /// Build a grid from a string template, with `.` representing empty
    /// cells, `#` representing blocks, and letters prefilling themselves.
    /// Maximal runs of at least two open cells become slots; across runs are
    /// collected row by row, then down runs column by column.
    pub fn from_template(template: &str) -> Result<Grid, GridError> {
        let rows: Vec<Vec<char>> = template
            .lines()
            .filter_map(|line| {
                let line = line.trim();
                if line.is_empty() {
                    None
                } else {
                    Some(line.chars().map(|c| c.to_ascii_lowercase()).collect())
                }
            })
            .collect();

        if rows.is_empty() {
            return Err(GridError::Empty);
        }
        let width = rows[0].len();
        for (line, row) in rows.iter().enumerate() {
            if row.len() != width {
                return Err(GridError::RaggedTemplate { line });
            }
        }

        let mut slots: Vec<SlotSpec> = Vec::new();
        for (row, line) in rows.iter().enumerate() {
            for (col, run) in runs(line.iter().copied()) {
                slots.push(slot_spec(row, col, Direction::Across, run));
            }
        }
        for col in 0..width {
            for (row, run) in runs(rows.iter().map(|line| line[col])) {
                slots.push(slot_spec(row, col, Direction::Down, run));
            }
        }

        Grid::from_slots(&slots)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn variable(&self, id: VarId) -> Variable {
        self.variables[id]
    }

    /// Look up the id of a variable by its identity.
    pub fn index_of(&self, variable: &Variable) -> Option<VarId> {
        self.variables.iter().position(|v| v == variable)
    }

    /// The character offsets at which `x` and `y` share a cell, as (offset in
    /// x, offset in y), or `None` when they do not cross. Absence is distinct
    /// from an offset of zero.
    pub fn overlap(&self, x: VarId, y: VarId) -> Option<(usize, usize)> {
        self.overlaps[x][y]
    }

    /// The ids of every variable sharing a cell with `x`.
    pub fn neighbors(&self, x: VarId) -> &[VarId] {
        &self.neighbors[x]
    }

    /// The prefilled letters constraining `x`, if any.
    pub fn pattern(&self, x: VarId) -> Option<&FillPattern> {
        self.patterns[x].as_ref()
    }
}

/// Split a line of template cells into maximal open runs of length >= 2,
/// returning each run's start index and characters.
fn runs(line: impl Iterator<Item = char>) -> Vec<(usize, Vec<char>)> {
    let mut found = Vec::new();
    let mut start = 0;
    let mut current: Vec<char> = Vec::new();

    for (index, cell) in line.enumerate() {
        if cell == '#' {
            if current.len() > 1 {
                found.push((start, current));
            }
            current = Vec::new();
            start = index + 1;
        } else {
            current.push(cell);
        }
    }
    if current.len() > 1 {
        found.push((start, current));
    }

    found
}

fn slot_spec(row: usize, col: usize, direction: Direction, run: Vec<char>) -> SlotSpec {
    let length = run.len();
    let fill = if run.iter().all(|&c| c == '.') {
        None
    } else {
        Some(run.into_iter().collect())
    };
    SlotSpec {
        row,
        col,
        direction,
        length,
        fill,
    }
}
