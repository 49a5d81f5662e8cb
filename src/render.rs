use crate::grid::{Direction, Grid};
use crate::solver::Assignment;

/// Turn the given grid and assignment into a rendered string, one row per
/// line, with `#` for blocked cells and `.` for open cells that have no
/// letter.
pub fn render_grid(grid: &Grid, assignment: &Assignment) -> String {
    let max_row = grid
        .variables()
        .iter()
        .map(|v| match v.direction {
            Direction::Down => v.row + v.length - 1,
            Direction::Across => v.row,
        })
        .max()
        .expect("grid must have slots");
    let max_col = grid
        .variables()
        .iter()
        .map(|v| match v.direction {
            Direction::Across => v.col + v.length - 1,
            Direction::Down => v.col,
        })
        .max()
        .expect("grid must have slots");

    let mut cells = vec![vec!['#'; max_col + 1]; max_row + 1];
    for variable in grid.variables() {
        for (row, col) in variable.cells() {
            cells[row][col] = '.';
        }
    }
    for variable in grid.variables() {
        if let Some(word) = assignment.get(variable) {
            for ((row, col), letter) in variable.cells().into_iter().zip(word.chars()) {
                cells[row][col] = letter;
            }
        }
    }

    cells
        .into_iter()
        .map(|row| row.into_iter().collect::<String>())
        .collect::<Vec<_>>()
        .join("\n")
}
