use std::env;
use std::fs;
use std::process::ExitCode;

use crossfill::{render_grid, Grid, Solver, WordList};

fn main() -> ExitCode {
    env_logger::init();

    let mut args = env::args().skip(1);
    let (structure_path, words_path) = match (args.next(), args.next()) {
        (Some(structure), Some(words)) => (structure, words),
        _ => {
            eprintln!("Usage: crossfill STRUCTURE WORDS");
            return ExitCode::FAILURE;
        }
    };

    let template = match fs::read_to_string(&structure_path) {
        Ok(template) => template,
        Err(err) => {
            eprintln!("failed to read {}: {}", structure_path, err);
            return ExitCode::FAILURE;
        }
    };
    let word_text = match fs::read_to_string(&words_path) {
        Ok(text) => text,
        Err(err) => {
            eprintln!("failed to read {}: {}", words_path, err);
            return ExitCode::FAILURE;
        }
    };

    let grid = match Grid::from_template(&template) {
        Ok(grid) => grid,
        Err(err) => {
            eprintln!("invalid grid: {}", err);
            return ExitCode::FAILURE;
        }
    };
    let words = WordList::parse(&word_text);

    let mut solver = Solver::new(&grid, &words);
    match solver.solve() {
        Some(assignment) => {
            println!("{:?}", solver.statistics());
            println!("{}", render_grid(&grid, &assignment));
        }
        None => println!("No solution."),
    }

    ExitCode::SUCCESS
}
