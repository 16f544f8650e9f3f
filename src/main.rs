mod polyomino;
mod puzzle;
mod solver;

use puzzle::{Line, Puzzle};
use solver::Solver;
use std::env;
use std::time::Instant;

#[derive(Debug, PartialEq)]
pub enum CliError {
    Usage,
    UnknownFlag(String),
    WrongArity(usize),
    BadMax(String),
    Other(String),
    Unsolvable,
}

struct Options {
    color: bool,
    max_solutions: usize,
    path: String,
}

fn parse_args(args: &[String]) -> Result<Options, CliError> {
    if args.is_empty() {
        return Err(CliError::Usage);
    }
    let mut color = true;
    let mut max_solutions = 0usize;
    let mut positional: Vec<String> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--no-color" | "--no-colors" | "-nc" => color = false,
            "--max" => {
                i += 1;
                let Some(value) = args.get(i) else {
                    return Err(CliError::BadMax("--max requires a value".into()));
                };
                max_solutions = value
                    .parse()
                    .map_err(|_| CliError::BadMax(value.clone()))?;
            }
            a if a.starts_with('-') => return Err(CliError::UnknownFlag(a.to_string())),
            a => positional.push(a.to_string()),
        }
        i += 1;
    }
    if positional.len() != 1 {
        return Err(CliError::WrongArity(positional.len()));
    }
    Ok(Options {
        color,
        max_solutions,
        path: positional.remove(0),
    })
}

/// Core CLI logic, extracted for unit testing. Accepts the already-split
/// argument list (no program name).
pub fn run_cli(args: &[String]) -> Result<String, CliError> {
    let opts = parse_args(args)?;
    let puzzle = Puzzle::from_file(&opts.path).map_err(|e| CliError::Other(e.to_string()))?;

    let mut solver = Solver::new(puzzle);
    solver.set_max_solutions(opts.max_solutions);

    let started = Instant::now();
    let solutions = solver.solve();
    let elapsed = started.elapsed();

    if solutions.is_empty() {
        return Err(CliError::Unsolvable);
    }

    let mut out = String::new();
    for (i, path) in solutions.iter().enumerate() {
        out.push_str(&format!("Solution {}:\n  ", i + 1));
        for (j, (x, y)) in path.positions.iter().enumerate() {
            if j > 0 {
                out.push_str(" -> ");
            }
            out.push_str(&format!("({x},{y})"));
        }
        out.push('\n');

        let mut drawn = solver.puzzle().clone();
        drawn.clear_lines();
        for &(x, y) in &path.positions {
            if let Some(cell) = drawn.get_cell_mut(x, y) {
                cell.set_line(Line::Black);
            }
        }
        out.push_str(&drawn.board_to_string(opts.color));
        out.push('\n');
    }
    out.push_str(&format!(
        "{} solution(s) found in {:.3}s\n",
        solutions.len(),
        elapsed.as_secs_f64()
    ));
    Ok(out)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().skip(1).collect();
    match run_cli(&args) {
        Ok(out) => {
            print!("{out}");
            Ok(())
        }
        Err(err) => {
            match &err {
                CliError::Usage => eprintln!(
                    "Usage: witness_solver [--no-color|-nc] [--max N] <path-to-puzzle.json>"
                ),
                CliError::UnknownFlag(f) => eprintln!("Unknown flag: {f}"),
                CliError::WrongArity(n) => eprintln!("Expected exactly one JSON path. Got {n}."),
                CliError::BadMax(v) => eprintln!("Invalid --max value: {v}"),
                CliError::Other(msg) => eprintln!("{msg}"),
                CliError::Unsolvable => {
                    eprintln!("No solution found.");
                    std::process::exit(2);
                }
            }
            if !matches!(err, CliError::Unsolvable) {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(name: &str) -> String {
        let mut p = std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        p.push("tests/puzzles");
        p.push(name);
        p.to_string_lossy().into_owned()
    }

    #[test]
    fn cli_usage_branch() {
        assert_eq!(run_cli(&[]), Err(CliError::Usage));
    }

    #[test]
    fn cli_unknown_flag_branch() {
        assert_eq!(
            run_cli(&["--weird".into(), fixture("straight_line.json")]),
            Err(CliError::UnknownFlag("--weird".into()))
        );
    }

    #[test]
    fn cli_wrong_arity_branch() {
        assert_eq!(
            run_cli(&[fixture("straight_line.json"), fixture("star_pair.json")]),
            Err(CliError::WrongArity(2))
        );
    }

    #[test]
    fn cli_unsolvable_branch() {
        let res = run_cli(&[fixture("unsolvable.json")]);
        assert_eq!(res, Err(CliError::Unsolvable));
    }

    #[test]
    fn cli_success_color_and_no_color() {
        let out_color = run_cli(&[fixture("straight_line.json")]).expect("should solve");
        assert!(out_color.contains("\x1b["));
        let out_plain =
            run_cli(&["--no-color".into(), fixture("straight_line.json")]).expect("should solve");
        assert!(!out_plain.contains("\x1b["));
    }

    #[test]
    fn cli_max_flag_limits_reported_solutions() {
        let out =
            run_cli(&["--max".into(), "1".into(), fixture("straight_line.json")]).expect("should solve");
        assert!(out.contains("1 solution(s) found"));
    }

    #[test]
    fn cli_bad_max_value_branch() {
        let res = run_cli(&[
            "--max".into(),
            "not-a-number".into(),
            fixture("straight_line.json"),
        ]);
        assert!(matches!(res, Err(CliError::BadMax(_))));
    }
}
