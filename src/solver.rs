//! The Hamiltonian-path-with-constraints solver: enumerates every simple
//! path from a start cell to any endpoint cell, keeping those whose final
//! board state passes `Puzzle::validate`.

use crate::puzzle::{Gap, Line, Puzzle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    None,
    Left,
    Right,
    Top,
    Bottom,
}

#[derive(Debug, Clone, Default)]
pub struct Path {
    pub positions: Vec<(i32, i32)>,
    pub directions: Vec<Direction>,
}

pub struct Solver {
    puzzle: Puzzle,
    solutions: Vec<Path>,
    max_solutions: usize,
}

impl Solver {
    pub fn new(puzzle: Puzzle) -> Solver {
        Solver {
            puzzle,
            solutions: Vec::new(),
            max_solutions: 0,
        }
    }

    /// `0` (the default) means unlimited.
    pub fn set_max_solutions(&mut self, max: usize) {
        self.max_solutions = max;
    }

    pub fn puzzle(&self) -> &Puzzle {
        &self.puzzle
    }

    pub fn solve(&mut self) -> Vec<Path> {
        self.solutions.clear();

        let start_points = self.find_start_points();
        if start_points.is_empty() {
            eprintln!("no start points found in puzzle");
            return self.solutions.clone();
        }

        let num_endpoints = self.count_endpoints();
        if num_endpoints == 0 {
            eprintln!("no endpoints found in puzzle");
            return self.solutions.clone();
        }

        for (start_x, start_y) in start_points {
            self.solve_from_start(start_x, start_y, num_endpoints);
            if self.max_solutions > 0 && self.solutions.len() >= self.max_solutions {
                break;
            }
        }

        self.solutions.clone()
    }

    fn solve_from_start(&mut self, start_x: i32, start_y: i32, num_endpoints: i32) {
        eprintln!("starting solve from {start_x},{start_y}");
        let mut path = Path::default();
        path.positions.push((start_x, start_y));
        path.directions.push(Direction::None);

        self.puzzle.clear_lines();

        if let Some(cell) = self.puzzle.get_cell_mut(start_x, start_y) {
            cell.set_line(Line::Black);
            self.solve_loop(start_x, start_y, num_endpoints, &mut path);
        } else {
            eprintln!("failed to get start cell");
        }
    }

    /// Depth-first search over legal moves. Horizontal moves are only legal
    /// from even `y` (edge cells), vertical moves only from even `x` —
    /// the path alternates content/vertex cells with the edge cells between
    /// them, so it can never move diagonally. Reaching an endpoint does not
    /// stop the search: every endpoint hit is validated and recorded, then
    /// the search backtracks to look for other solutions through it.
    fn solve_loop(&mut self, x: i32, y: i32, num_endpoints: i32, path: &mut Path) {
        if self.max_solutions > 0 && self.solutions.len() >= self.max_solutions {
            return;
        }

        let Some(cell) = self.puzzle.get_cell(x, y) else {
            return;
        };

        if cell.gap() > Gap::None {
            return;
        }

        if cell.end().is_some() && self.validate_path(path) {
            self.solutions.push(path.clone());
        }

        if y % 2 == 0 {
            self.try_move(x - 1, y, Direction::Left, num_endpoints, path);
            self.try_move(x + 1, y, Direction::Right, num_endpoints, path);
        }
        if x % 2 == 0 {
            self.try_move(x, y - 1, Direction::Top, num_endpoints, path);
            self.try_move(x, y + 1, Direction::Bottom, num_endpoints, path);
        }
    }

    fn try_move(
        &mut self,
        nx: i32,
        ny: i32,
        direction: Direction,
        num_endpoints: i32,
        path: &mut Path,
    ) {
        if ny < 0 || ny >= self.puzzle.actual_height() {
            return;
        }
        // Wrap before bounds-checking so a pillar puzzle's seam (x == -1 or
        // x == actual_width()) is actually reachable, matching the wrap
        // `get_cell`/`flood_fill` already apply.
        let nx = self.puzzle.wrap_x(nx);

        let Some(next_cell) = self.puzzle.get_cell_mut(nx, ny) else {
            return;
        };
        if next_cell.line() != Line::None || next_cell.gap() > Gap::None {
            return;
        }
        next_cell.set_line(Line::Black);
        path.directions.push(direction);
        path.positions.push((nx, ny));

        self.solve_loop(nx, ny, num_endpoints, path);

        path.positions.pop();
        path.directions.pop();
        if let Some(cell) = self.puzzle.get_cell_mut(nx, ny) {
            cell.set_line(Line::None);
        }
    }

    fn find_start_points(&self) -> Vec<(i32, i32)> {
        eprintln!("finding start points...");
        let mut starts = Vec::new();
        for x in 0..self.puzzle.actual_width() {
            for y in 0..self.puzzle.actual_height() {
                if let Some(cell) = self.puzzle.get_cell(x, y) {
                    if cell.start() {
                        eprintln!("found start at {x},{y}");
                        starts.push((x, y));
                    }
                }
            }
        }
        starts
    }

    fn count_endpoints(&self) -> i32 {
        eprintln!("counting endpoints in puzzle...");
        let (aw, ah) = (self.puzzle.actual_width(), self.puzzle.actual_height());
        eprintln!("searching in grid of size {aw}x{ah}");
        let mut count = 0;
        for x in 0..aw {
            for y in 0..ah {
                if let Some(cell) = self.puzzle.get_cell(x, y) {
                    if let Some(dir) = cell.end() {
                        eprintln!("found endpoint at {x},{y} with direction {dir:?}");
                        count += 1;
                    }
                }
            }
        }
        eprintln!("found {count} endpoints");
        count
    }

    /// Clones the whole puzzle, draws `path` fresh onto the clone, and runs
    /// `validate` against that copy — the live puzzle's line markings stay
    /// untouched by validation.
    fn validate_path(&self, path: &Path) -> bool {
        let mut test_puzzle = self.puzzle.clone();
        test_puzzle.clear_lines();
        for &(x, y) in &path.positions {
            if let Some(cell) = test_puzzle.get_cell_mut(x, y) {
                cell.set_line(Line::Black);
            }
        }
        test_puzzle.validate()
    }
}
