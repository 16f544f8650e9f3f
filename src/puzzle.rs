//! The expanded puzzle grid: typed cell model, JSON (de)serialization,
//! region flood-fill, ASCII board printing, and the `validate()` region
//! checker (squares, paired stars, triangles, dots, negations, polys/ylops).

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::json;

use crate::polyomino::Polyshape;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    None,
    Black,
    Blue,
    Yellow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Gap {
    None,
    Break,
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dot {
    None,
    Black,
    Blue,
    Yellow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndDir {
    Top,
    Bottom,
    Left,
    Right,
}

/// A content cell's symbol. `Empty` covers plain content cells and the
/// unrecognized-but-tolerated `"line"` content type from the wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    Empty,
    Square { color: i32 },
    Star { color: i32 },
    Triangle { count: u8 },
    Nega { color: i32 },
    Poly { shape: Polyshape },
    Ylop { shape: Polyshape },
}

/// A single cell of the expanded grid. Which variant is legal at a given
/// `(x, y)` is determined by coordinate parity (see `Puzzle::build_cell`);
/// the type system then makes "content cell carrying a line" or "junction
/// cell carrying a symbol" unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Content {
        symbol: Symbol,
    },
    Junction {
        line: Line,
        gap: Gap,
        dot: Dot,
        start: bool,
        end: Option<EndDir>,
    },
}

impl Cell {
    pub fn is_content(&self) -> bool {
        matches!(self, Cell::Content { .. })
    }

    pub fn line(&self) -> Line {
        match self {
            Cell::Junction { line, .. } => *line,
            Cell::Content { .. } => Line::None,
        }
    }

    pub fn set_line(&mut self, new_line: Line) {
        if let Cell::Junction { line, .. } = self {
            *line = new_line;
        }
    }

    pub fn gap(&self) -> Gap {
        match self {
            Cell::Junction { gap, .. } => *gap,
            Cell::Content { .. } => Gap::None,
        }
    }

    pub fn dot(&self) -> Dot {
        match self {
            Cell::Junction { dot, .. } => *dot,
            Cell::Content { .. } => Dot::None,
        }
    }

    pub fn start(&self) -> bool {
        matches!(self, Cell::Junction { start: true, .. })
    }

    pub fn end(&self) -> Option<EndDir> {
        match self {
            Cell::Junction { end, .. } => *end,
            Cell::Content { .. } => None,
        }
    }

    pub fn symbol(&self) -> Option<Symbol> {
        match self {
            Cell::Content { symbol } => Some(*symbol),
            Cell::Junction { .. } => None,
        }
    }
}

#[derive(Debug)]
pub enum PuzzleError {
    Malformed(String),
    Io(std::io::Error),
}

impl std::fmt::Display for PuzzleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PuzzleError::Malformed(msg) => write!(f, "malformed puzzle: {msg}"),
            PuzzleError::Io(e) => write!(f, "could not read puzzle file: {e}"),
        }
    }
}

impl std::error::Error for PuzzleError {}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawColor {
    Num(i32),
    Name(String),
}

impl RawColor {
    fn to_i32(&self) -> i32 {
        match self {
            RawColor::Num(n) => *n,
            RawColor::Name(s) if s == "black" => 1,
            RawColor::Name(_) => 0,
        }
    }
}

#[derive(Deserialize, Default)]
struct RawCell {
    start: Option<bool>,
    end: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    color: Option<RawColor>,
    count: Option<u8>,
    polyshape: Option<u32>,
    line: Option<u8>,
    gap: Option<u8>,
    dot: Option<u8>,
}

#[derive(Deserialize)]
struct RawPuzzle {
    grid: Vec<Vec<Option<RawCell>>>,
    #[serde(default)]
    pillar: bool,
}

/// The expanded `(2W+1) x (2H+1)` grid. Indexed `cells[x][y]`, matching the
/// wire format's column-major convention.
#[derive(Clone)]
pub struct Puzzle {
    cells: Vec<Vec<Cell>>,
    width: i32,
    height: i32,
    pillar: bool,
    /// Default `false`: the restrictive negation rule (`N mod 2 == I`).
    /// When `true`, the permissive rule (`I <= N` and `N - I` even) applies.
    pub permissive_negation: bool,
}

impl Puzzle {
    pub fn deserialize(json_text: &str) -> Result<Puzzle, PuzzleError> {
        let raw: RawPuzzle =
            serde_json::from_str(json_text).map_err(|e| PuzzleError::Malformed(e.to_string()))?;
        Puzzle::from_raw(raw)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Puzzle, PuzzleError> {
        let text = fs::read_to_string(path).map_err(PuzzleError::Io)?;
        Puzzle::deserialize(&text)
    }

    fn from_raw(raw: RawPuzzle) -> Result<Puzzle, PuzzleError> {
        if raw.grid.is_empty() || raw.grid[0].is_empty() {
            return Err(PuzzleError::Malformed("grid must be a non-empty 2D array".into()));
        }
        let actual_width = raw.grid.len();
        let actual_height = raw.grid[0].len();
        for (x, col) in raw.grid.iter().enumerate() {
            if col.len() != actual_height {
                return Err(PuzzleError::Malformed(format!(
                    "column {x} has length {} but column 0 has length {actual_height}",
                    col.len()
                )));
            }
        }
        if actual_width % 2 == 0 || actual_height % 2 == 0 {
            return Err(PuzzleError::Malformed(
                "grid dimensions must both be odd".into(),
            ));
        }
        let width = (actual_width as i32 - 1) / 2;
        let height = (actual_height as i32 - 1) / 2;
        if width <= 0 || height <= 0 {
            return Err(PuzzleError::Malformed("grid is too small".into()));
        }

        let mut cells = Vec::with_capacity(actual_width);
        for (x, col) in raw.grid.iter().enumerate() {
            let mut built_col = Vec::with_capacity(actual_height);
            for (y, raw_cell) in col.iter().enumerate() {
                built_col.push(build_cell(x as i32, y as i32, raw_cell.as_ref())?);
            }
            cells.push(built_col);
        }

        Ok(Puzzle {
            cells,
            width,
            height,
            pillar: raw.pillar,
            permissive_negation: false,
        })
    }

    pub fn serialize(&self) -> String {
        let mut grid = Vec::with_capacity(self.cells.len());
        for col in &self.cells {
            let row: Vec<serde_json::Value> = col.iter().map(cell_to_json).collect();
            grid.push(serde_json::Value::Array(row));
        }
        json!({
            "width": self.width,
            "height": self.height,
            "pillar": self.pillar,
            "grid": grid,
        })
        .to_string()
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn is_pillar(&self) -> bool {
        self.pillar
    }

    pub fn actual_width(&self) -> i32 {
        self.cells.len() as i32
    }

    pub fn actual_height(&self) -> i32 {
        self.cells[0].len() as i32
    }

    /// Normalize `x` under the pillar topology (identity when `pillar` is
    /// false). Callers that step through `x ± 1` outside `get_cell` — the
    /// path solver's move enumeration, in particular — must wrap through
    /// this before bounds-checking, the same way `get_cell`/`flood_fill` do.
    pub fn wrap_x(&self, x: i32) -> i32 {
        if self.pillar {
            x.rem_euclid(self.actual_width())
        } else {
            x
        }
    }

    pub fn get_cell(&self, x: i32, y: i32) -> Option<&Cell> {
        let x = self.wrap_x(x);
        if x < 0 || x >= self.actual_width() || y < 0 || y >= self.actual_height() {
            return None;
        }
        Some(&self.cells[x as usize][y as usize])
    }

    pub fn get_cell_mut(&mut self, x: i32, y: i32) -> Option<&mut Cell> {
        let x = self.wrap_x(x);
        if x < 0 || x >= self.actual_width() || y < 0 || y >= self.actual_height() {
            return None;
        }
        Some(&mut self.cells[x as usize][y as usize])
    }

    pub fn clear_lines(&mut self) {
        for col in &mut self.cells {
            for cell in col {
                cell.set_line(Line::None);
            }
        }
    }

    /// Flood-fill starting at `(x, y)`, not shared with any other region.
    /// Mostly useful for tests and tooling; `get_regions` is the partition
    /// used by `validate`.
    pub fn get_region(&self, x: i32, y: i32) -> Vec<(i32, i32)> {
        let x = self.wrap_x(x);
        if x < 0 || x >= self.actual_width() || y < 0 || y >= self.actual_height() {
            return Vec::new();
        }
        let mut region = Vec::new();
        let mut visited = HashSet::new();
        self.flood_fill(x, y, &mut region, &mut visited);
        region
    }

    /// Partition every content cell into a maximal group reachable through
    /// edges/vertices with no drawn line. Iterated in row-major order over
    /// content cells for determinism.
    pub fn get_regions(&self) -> Vec<Vec<(i32, i32)>> {
        let mut regions = Vec::new();
        let mut visited = HashSet::new();
        let aw = self.actual_width();
        let ah = self.actual_height();
        let mut x = 1;
        while x < aw {
            let mut y = 1;
            while y < ah {
                if !visited.contains(&(x, y)) {
                    let mut region = Vec::new();
                    self.flood_fill(x, y, &mut region, &mut visited);
                    if !region.is_empty() {
                        regions.push(region);
                    }
                }
                y += 2;
            }
            x += 2;
        }
        regions
    }

    /// Iterative (explicit work-stack) flood-fill: a drawn-line edge/vertex
    /// blocks entry and is excluded from the region entirely; content cells
    /// are always admitted regardless of their (nonexistent) line state.
    fn flood_fill(
        &self,
        sx: i32,
        sy: i32,
        region: &mut Vec<(i32, i32)>,
        visited: &mut HashSet<(i32, i32)>,
    ) {
        let mut stack = vec![(sx, sy)];
        let aw = self.actual_width();
        let ah = self.actual_height();
        while let Some((x, y)) = stack.pop() {
            if visited.contains(&(x, y)) {
                continue;
            }
            let Some(cell) = self.get_cell(x, y) else {
                continue;
            };
            let is_content = x.rem_euclid(2) == 1 && y.rem_euclid(2) == 1;
            if !is_content && cell.line() != Line::None {
                continue;
            }
            visited.insert((x, y));
            region.push((x, y));

            if y + 1 < ah {
                stack.push((x, y + 1));
            }
            if y > 0 {
                stack.push((x, y - 1));
            }
            if x + 1 < aw {
                stack.push((x + 1, y));
            } else if self.pillar {
                stack.push((0, y));
            }
            if x > 0 {
                stack.push((x - 1, y));
            } else if self.pillar {
                stack.push((aw - 1, y));
            }
        }
    }

    /// Stage A + Stage B of region validation, run against the current
    /// `line` markings.
    pub fn validate(&self) -> bool {
        self.stage_a_path_shape_ok() && self.get_regions().iter().all(|r| self.validate_region(r))
    }

    fn stage_a_path_shape_ok(&self) -> bool {
        let aw = self.actual_width();
        let ah = self.actual_height();
        for x in 0..aw {
            for y in 0..ah {
                if x % 2 == 1 && y % 2 == 1 {
                    continue;
                }
                let Some(cell) = self.get_cell(x, y) else {
                    continue;
                };
                if cell.line() != Line::None {
                    continue;
                }
                let mut adjacent = 0;
                let mut has_vertical = false;
                let mut has_horizontal = false;
                if let Some(c) = self.get_cell(x, y - 1) {
                    if c.line() != Line::None {
                        adjacent += 1;
                        has_vertical = true;
                    }
                }
                if let Some(c) = self.get_cell(x, y + 1) {
                    if c.line() != Line::None {
                        adjacent += 1;
                        has_vertical = true;
                    }
                }
                if let Some(c) = self.get_cell(x - 1, y) {
                    if c.line() != Line::None {
                        adjacent += 1;
                        has_horizontal = true;
                    }
                }
                if let Some(c) = self.get_cell(x + 1, y) {
                    if c.line() != Line::None {
                        adjacent += 1;
                        has_horizontal = true;
                    }
                }
                if adjacent >= 2 && has_vertical && has_horizontal {
                    return false;
                }
            }
        }
        true
    }

    fn validate_region(&self, region: &[(i32, i32)]) -> bool {
        let mut invalid: HashSet<(i32, i32)> = HashSet::new();

        for &(x, y) in region {
            if let Some(cell) = self.get_cell(x, y) {
                if cell.dot() != Dot::None && cell.line() == Line::None {
                    invalid.insert((x, y));
                }
            }
        }

        let mut square_color: Option<i32> = None;
        for &(x, y) in region {
            if let Some(Cell::Content {
                symbol: Symbol::Square { color },
            }) = self.get_cell(x, y)
            {
                match square_color {
                    None => square_color = Some(*color),
                    Some(c) if c != *color => {
                        invalid.insert((x, y));
                    }
                    _ => {}
                }
            }
        }

        let mut color_members: HashMap<i32, usize> = HashMap::new();
        let mut star_positions: HashMap<i32, Vec<(i32, i32)>> = HashMap::new();
        for &(x, y) in region {
            match self.get_cell(x, y) {
                Some(Cell::Content {
                    symbol: Symbol::Square { color },
                }) => {
                    *color_members.entry(*color).or_insert(0) += 1;
                }
                Some(Cell::Content {
                    symbol: Symbol::Star { color },
                }) => {
                    *color_members.entry(*color).or_insert(0) += 1;
                    star_positions.entry(*color).or_default().push((x, y));
                }
                _ => {}
            }
        }
        for (color, positions) in &star_positions {
            if color_members.get(color).copied().unwrap_or(0) != 2 {
                for &pos in positions {
                    invalid.insert(pos);
                }
            }
        }

        for &(x, y) in region {
            if let Some(Cell::Content {
                symbol: Symbol::Triangle { count },
            }) = self.get_cell(x, y)
            {
                let mut drawn = 0;
                for (nx, ny) in [(x - 1, y), (x + 1, y), (x, y - 1), (x, y + 1)] {
                    if let Some(c) = self.get_cell(nx, ny) {
                        if c.line() != Line::None {
                            drawn += 1;
                        }
                    }
                }
                if drawn != *count as i32 {
                    invalid.insert((x, y));
                }
            }
        }

        let poly_cells: Vec<(i32, i32)> = region
            .iter()
            .copied()
            .filter(|&(x, y)| {
                matches!(
                    self.get_cell(x, y),
                    Some(Cell::Content {
                        symbol: Symbol::Poly { .. } | Symbol::Ylop { .. }
                    })
                )
            })
            .collect();
        if !poly_cells.is_empty() && !self.solve_polyominoes(region, &poly_cells) {
            for &pos in &poly_cells {
                invalid.insert(pos);
            }
        }

        let negations = region
            .iter()
            .filter(|&&(x, y)| {
                matches!(
                    self.get_cell(x, y),
                    Some(Cell::Content {
                        symbol: Symbol::Nega { .. }
                    })
                )
            })
            .count();
        let i = invalid.len();
        if self.permissive_negation {
            i <= negations && (negations - i) % 2 == 0
        } else {
            negations % 2 == i
        }
    }

    /// `R = content cells in region`, `P = sum(size(poly))`, `Y =
    /// sum(size(ylop))`; requires `P = R + Y`. Places ylops first (extending
    /// the demand outward onto cells just outside the region), then polys
    /// into whatever remains demanded. Greedy per piece: first
    /// position+rotation that fits is kept, no backtracking over piece
    /// order (see the placement routines' own docs).
    fn solve_polyominoes(&self, region: &[(i32, i32)], poly_cells: &[(i32, i32)]) -> bool {
        let region_set: HashSet<(i32, i32)> = region.iter().copied().collect();
        let content_in_region: Vec<(i32, i32)> = region
            .iter()
            .copied()
            .filter(|&(x, y)| x.rem_euclid(2) == 1 && y.rem_euclid(2) == 1)
            .collect();
        let r = content_in_region.len() as i64;

        let mut polys = Vec::new();
        let mut ylops = Vec::new();
        for &(x, y) in poly_cells {
            match self.get_cell(x, y) {
                Some(Cell::Content {
                    symbol: Symbol::Poly { shape },
                }) => polys.push(*shape),
                Some(Cell::Content {
                    symbol: Symbol::Ylop { shape },
                }) => ylops.push(((x, y), *shape)),
                _ => {}
            }
        }
        let p: i64 = polys.iter().map(|s: &Polyshape| s.size() as i64).sum();
        let y: i64 = ylops.iter().map(|(_, s)| s.size() as i64).sum();
        if p != r + y {
            return false;
        }

        let width = self.actual_width();
        let height = self.actual_height();
        let mut grid: HashMap<(i32, i32), i32> = HashMap::new();
        for &pos in &content_in_region {
            grid.insert(pos, -1);
        }

        for ((px, py), shape) in ylops {
            let mut candidates: Vec<(i32, i32)> = Vec::new();
            for (dx, dy) in [(-2, 0), (2, 0), (0, -2), (0, 2)] {
                let cand = (px + dx, py + dy);
                if !region_set.contains(&cand) {
                    candidates.push(cand);
                }
            }
            candidates.push((px, py));

            let mut placed = false;
            'search: for &(bx, by) in &candidates {
                for rotation in shape.with_rotation_bit().rotations() {
                    let cells = rotation.expand(true, true);
                    if let Some(touched) =
                        cells_outside_region(&cells, bx, by, width, height, &region_set)
                    {
                        for pos in touched {
                            grid.insert(pos, -1);
                        }
                        placed = true;
                        break 'search;
                    }
                }
            }
            if !placed {
                return false;
            }
        }

        for shape in polys {
            let mut demanded: Vec<(i32, i32)> = grid
                .iter()
                .filter(|(_, &v)| v == -1)
                .map(|(&pos, _)| pos)
                .collect();
            demanded.sort_unstable();

            let mut placed = false;
            'search2: for &(bx, by) in &demanded {
                for rotation in shape.with_rotation_bit().rotations() {
                    let cells = rotation.expand(false, true);
                    if let Some(touched) = cells_all_demanded(&cells, bx, by, width, height, &grid)
                    {
                        for pos in touched {
                            grid.insert(pos, 0);
                        }
                        placed = true;
                        break 'search2;
                    }
                }
            }
            if !placed {
                return false;
            }
        }

        content_in_region
            .iter()
            .all(|pos| *grid.get(pos).unwrap_or(&0) >= 0)
    }

    pub fn board_to_string(&self, color: bool) -> String {
        let mut out = String::new();
        let aw = self.actual_width();
        let ah = self.actual_height();
        write!(out, "   ").ok();
        for x in 0..aw {
            write!(out, "{} ", x % 10).ok();
        }
        out.push('\n');
        for y in 0..ah {
            write!(out, "{}  ", y % 10).ok();
            for x in 0..aw {
                let cell = &self.cells[x as usize][y as usize];
                let glyph = glyph_for(cell);
                if color {
                    if let Cell::Junction { line, .. } = cell {
                        if *line != Line::None {
                            let (start, end) = color_for_line(*line);
                            write!(out, "{start}{glyph}{end}").ok();
                            continue;
                        }
                    }
                }
                out.push_str(&glyph);
            }
            out.push('\n');
        }
        out
    }

    pub fn print_board(&self) {
        print!("{}", self.board_to_string(true));
    }
}

fn cells_outside_region(
    cells: &[(i32, i32)],
    ox: i32,
    oy: i32,
    width: i32,
    height: i32,
    region_set: &HashSet<(i32, i32)>,
) -> Option<Vec<(i32, i32)>> {
    let mut touched = Vec::new();
    for &(dx, dy) in cells {
        let (x, y) = (ox + dx, oy + dy);
        if x < 0 || y < 0 || x >= width || y >= height {
            return None;
        }
        if region_set.contains(&(x, y)) {
            return None;
        }
        if x.rem_euclid(2) == 1 && y.rem_euclid(2) == 1 {
            touched.push((x, y));
        }
    }
    Some(touched)
}

fn cells_all_demanded(
    cells: &[(i32, i32)],
    ox: i32,
    oy: i32,
    width: i32,
    height: i32,
    grid: &HashMap<(i32, i32), i32>,
) -> Option<Vec<(i32, i32)>> {
    let mut touched = Vec::new();
    for &(dx, dy) in cells {
        let (x, y) = (ox + dx, oy + dy);
        if x < 0 || y < 0 || x >= width || y >= height {
            return None;
        }
        if x.rem_euclid(2) == 1 && y.rem_euclid(2) == 1 {
            if grid.get(&(x, y)).copied().unwrap_or(0) != -1 {
                return None;
            }
            touched.push((x, y));
        }
    }
    Some(touched)
}

fn build_cell(x: i32, y: i32, raw: Option<&RawCell>) -> Result<Cell, PuzzleError> {
    let is_content = x % 2 == 1 && y % 2 == 1;
    let Some(raw) = raw else {
        return Ok(if is_content {
            Cell::Content {
                symbol: Symbol::Empty,
            }
        } else {
            Cell::Junction {
                line: Line::None,
                gap: Gap::Break,
                dot: Dot::None,
                start: false,
                end: None,
            }
        });
    };

    if is_content {
        Ok(Cell::Content {
            symbol: symbol_from_raw(raw, x, y)?,
        })
    } else {
        let line = match raw.line.unwrap_or(0) {
            0 => Line::None,
            1 => Line::Black,
            2 => Line::Blue,
            3 => Line::Yellow,
            n => return Err(PuzzleError::Malformed(format!("invalid line {n} at ({x},{y})"))),
        };
        let gap = match raw.gap.unwrap_or(0) {
            0 => Gap::None,
            1 => Gap::Break,
            2 => Gap::Full,
            n => return Err(PuzzleError::Malformed(format!("invalid gap {n} at ({x},{y})"))),
        };
        let dot = match raw.dot.unwrap_or(0) {
            0 => Dot::None,
            1 => Dot::Black,
            2 => Dot::Blue,
            3 => Dot::Yellow,
            n => return Err(PuzzleError::Malformed(format!("invalid dot {n} at ({x},{y})"))),
        };
        let end = match raw.end.as_deref() {
            None => None,
            Some("top") => Some(EndDir::Top),
            Some("bottom") => Some(EndDir::Bottom),
            Some("left") => Some(EndDir::Left),
            Some("right") => Some(EndDir::Right),
            Some(other) => {
                return Err(PuzzleError::Malformed(format!(
                    "unknown end direction {other:?} at ({x},{y})"
                )))
            }
        };
        Ok(Cell::Junction {
            line,
            gap,
            dot,
            start: raw.start.unwrap_or(false),
            end,
        })
    }
}

fn symbol_from_raw(raw: &RawCell, x: i32, y: i32) -> Result<Symbol, PuzzleError> {
    let color = raw.color.as_ref().map(|c| c.to_i32()).unwrap_or(0);
    match raw.kind.as_deref() {
        None | Some("") | Some("line") => Ok(Symbol::Empty),
        Some("square") => Ok(Symbol::Square { color }),
        Some("star") => Ok(Symbol::Star { color }),
        Some("triangle") => Ok(Symbol::Triangle {
            count: raw.count.unwrap_or(1),
        }),
        Some("nega") => Ok(Symbol::Nega { color }),
        Some("poly") => Ok(Symbol::Poly {
            shape: Polyshape::new(raw.polyshape.unwrap_or(0)),
        }),
        Some("ylop") => Ok(Symbol::Ylop {
            shape: Polyshape::new(raw.polyshape.unwrap_or(0)),
        }),
        Some(other) => Err(PuzzleError::Malformed(format!(
            "unknown content type {other:?} at ({x},{y})"
        ))),
    }
}

fn cell_to_json(cell: &Cell) -> serde_json::Value {
    match cell {
        Cell::Content { symbol } => {
            let mut obj = serde_json::Map::new();
            match symbol {
                Symbol::Empty => {}
                Symbol::Square { color } => {
                    obj.insert("type".into(), json!("square"));
                    obj.insert("color".into(), json!(color));
                }
                Symbol::Star { color } => {
                    obj.insert("type".into(), json!("star"));
                    obj.insert("color".into(), json!(color));
                }
                Symbol::Triangle { count } => {
                    obj.insert("type".into(), json!("triangle"));
                    obj.insert("count".into(), json!(count));
                }
                Symbol::Nega { color } => {
                    obj.insert("type".into(), json!("nega"));
                    obj.insert("color".into(), json!(color));
                }
                Symbol::Poly { shape } => {
                    obj.insert("type".into(), json!("poly"));
                    obj.insert("polyshape".into(), json!(shape.0));
                }
                Symbol::Ylop { shape } => {
                    obj.insert("type".into(), json!("ylop"));
                    obj.insert("polyshape".into(), json!(shape.0));
                }
            }
            if obj.is_empty() {
                serde_json::Value::Null
            } else {
                serde_json::Value::Object(obj)
            }
        }
        Cell::Junction {
            line,
            gap,
            dot,
            start,
            end,
        } => {
            let mut obj = serde_json::Map::new();
            if *start {
                obj.insert("start".into(), json!(true));
            }
            if let Some(e) = end {
                let s = match e {
                    EndDir::Top => "top",
                    EndDir::Bottom => "bottom",
                    EndDir::Left => "left",
                    EndDir::Right => "right",
                };
                obj.insert("end".into(), json!(s));
            }
            if *line != Line::None {
                obj.insert(
                    "line".into(),
                    json!(match line {
                        Line::Black => 1,
                        Line::Blue => 2,
                        Line::Yellow => 3,
                        Line::None => 0,
                    }),
                );
            }
            if *gap != Gap::None {
                obj.insert(
                    "gap".into(),
                    json!(match gap {
                        Gap::Break => 1,
                        Gap::Full => 2,
                        Gap::None => 0,
                    }),
                );
            }
            if *dot != Dot::None {
                obj.insert(
                    "dot".into(),
                    json!(match dot {
                        Dot::Black => 1,
                        Dot::Blue => 2,
                        Dot::Yellow => 3,
                        Dot::None => 0,
                    }),
                );
            }
            if obj.is_empty() {
                serde_json::Value::Null
            } else {
                serde_json::Value::Object(obj)
            }
        }
    }
}

fn glyph_for(cell: &Cell) -> String {
    match cell {
        Cell::Junction { start: true, .. } => "S ".to_string(),
        Cell::Junction { end: Some(_), .. } => "E ".to_string(),
        Cell::Junction { dot, .. } if *dot != Dot::None => "\u{2022} ".to_string(),
        Cell::Junction { line, .. } if *line != Line::None => "\u{2588} ".to_string(),
        Cell::Junction { gap, .. } if *gap != Gap::None => "\u{254c} ".to_string(),
        Cell::Junction { .. } => "\u{00b7} ".to_string(),
        Cell::Content {
            symbol: Symbol::Square { color },
        } => format!("s{color}"),
        Cell::Content {
            symbol: Symbol::Star { color },
        } => format!("*{color}"),
        Cell::Content {
            symbol: Symbol::Triangle { count },
        } => format!("^{count}"),
        Cell::Content {
            symbol: Symbol::Nega { color },
        } => format!("n{color}"),
        Cell::Content {
            symbol: Symbol::Poly { .. },
        } => "P ".to_string(),
        Cell::Content {
            symbol: Symbol::Ylop { .. },
        } => "Y ".to_string(),
        Cell::Content {
            symbol: Symbol::Empty,
        } => "  ".to_string(),
    }
}

fn color_for_line(line: Line) -> (&'static str, &'static str) {
    const RESET: &str = "\x1b[0m";
    match line {
        Line::Black => ("\x1b[1;38;5;250m", RESET),
        Line::Blue => ("\x1b[1;38;5;27m", RESET),
        Line::Yellow => ("\x1b[1;38;5;226m", RESET),
        Line::None => ("", ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trivial_json() -> &'static str {
        r#"{
            "grid": [
                [{"start": true}, {}, {}],
                [{}, {}, {}],
                [{"end": "right"}, {}, {}]
            ],
            "pillar": false
        }"#
    }

    #[test]
    fn deserialize_rejects_ragged_rows() {
        let bad = r#"{"grid": [[{}],[{},{}]], "pillar": false}"#;
        assert!(matches!(
            Puzzle::deserialize(bad),
            Err(PuzzleError::Malformed(_))
        ));
    }

    #[test]
    fn deserialize_rejects_even_dimensions() {
        let bad = r#"{"grid": [[{}],[{}]], "pillar": false}"#;
        assert!(matches!(
            Puzzle::deserialize(bad),
            Err(PuzzleError::Malformed(_))
        ));
    }

    #[test]
    fn deserialize_rejects_missing_grid() {
        let bad = r#"{"pillar": false}"#;
        assert!(matches!(
            Puzzle::deserialize(bad),
            Err(PuzzleError::Malformed(_))
        ));
    }

    #[test]
    fn deserialize_trivial_grid_has_start_and_end() {
        let p = Puzzle::deserialize(trivial_json()).unwrap();
        assert_eq!(p.actual_width(), 3);
        assert_eq!(p.actual_height(), 3);
        assert!(p.get_cell(0, 0).unwrap().start());
        assert_eq!(p.get_cell(2, 0).unwrap().end(), Some(EndDir::Right));
    }

    #[test]
    fn null_junction_cell_is_an_obstacle() {
        let json_text = r#"{"grid": [[null,{},{}],[{},{},{}],[{},{},{}]], "pillar": false}"#;
        let p = Puzzle::deserialize(json_text).unwrap();
        assert_eq!(p.get_cell(0, 0).unwrap().gap(), Gap::Break);
    }

    #[test]
    fn pillar_wraps_x_but_not_y() {
        let json_text = trivial_json().replace("\"pillar\": false", "\"pillar\": true");
        let p = Puzzle::deserialize(&json_text).unwrap();
        assert_eq!(p.get_cell(-1, 0), p.get_cell(2, 0));
        assert_eq!(p.get_cell(3, 0), p.get_cell(0, 0));
        assert!(p.get_cell(0, -1).is_none());
    }

    #[test]
    fn get_regions_partitions_every_content_cell_exactly_once() {
        let p = Puzzle::deserialize(trivial_json()).unwrap();
        let regions = p.get_regions();
        let mut seen = HashSet::new();
        for region in &regions {
            for &(x, y) in region {
                if x % 2 == 1 && y % 2 == 1 {
                    assert!(seen.insert((x, y)), "content cell visited twice");
                }
            }
        }
        assert_eq!(seen.len(), 1); // one content cell in a 3x3 grid
    }

    #[test]
    fn validate_uncovered_dot_rejects() {
        let json_text = r#"{
            "grid": [
                [{"start": true}, {}, {}],
                [{}, {}, {"dot": 1}],
                [{"end": "right"}, {}, {}]
            ],
            "pillar": false
        }"#;
        let mut p = Puzzle::deserialize(json_text).unwrap();
        // draw the straight line, never touching the dot at (1,2)
        for (x, y) in [(0, 0), (1, 0), (2, 0), (2, 1), (2, 2)] {
            p.get_cell_mut(x, y).unwrap().set_line(Line::Black);
        }
        assert!(!p.validate());
    }

    #[test]
    fn validate_triangle_count_must_match_drawn_edges() {
        let json_text = r#"{
            "grid": [
                [{"start": true}, {}, {}],
                [{}, {"type": "triangle", "count": 1}, {}],
                [{"end": "right"}, {}, {}]
            ],
            "pillar": false
        }"#;
        let mut p = Puzzle::deserialize(json_text).unwrap();
        for (x, y) in [(0, 0), (1, 0), (2, 0), (2, 1), (2, 2)] {
            p.get_cell_mut(x, y).unwrap().set_line(Line::Black);
        }
        // exactly one edge of the triangle's four neighbors is drawn: (1,0)
        assert!(p.validate());
    }

    #[test]
    fn validate_negation_restrictive_rule() {
        // one invalid square-color mismatch, one negation: N=1, I=1, 1%2==1 -> ok
        let json_text = r#"{
            "grid": [
                [{"start": true}, {}, {}, {}, {}],
                [{}, {"type": "square", "color": 1}, {}, {"type": "square", "color": 2}, {}],
                [{}, {}, {"type": "nega", "color": 0}, {}, {}],
                [{}, {}, {}, {}, {}],
                [{"end": "right"}, {}, {}, {}, {}]
            ],
            "pillar": false
        }"#;
        let mut p = Puzzle::deserialize(json_text).unwrap();
        // draw a full loop-free path that leaves all content cells in one region
        for (x, y) in [
            (0, 0),
            (1, 0),
            (2, 0),
            (3, 0),
            (4, 0),
            (4, 1),
            (4, 2),
            (4, 3),
            (4, 4),
            (3, 4),
            (2, 4),
            (1, 4),
            (0, 4),
        ] {
            p.get_cell_mut(x, y).unwrap().set_line(Line::Black);
        }
        assert!(p.validate());
    }

    #[test]
    fn validate_poly_accepts_exact_tiling_of_region() {
        // a horizontal domino (rotatable) exactly covers the region's two
        // content cells: P = 2, R = 2, Y = 0.
        let domino = (1u32 << (0 * 4 + 0)) | (1u32 << (1 * 4 + 0)) | crate::polyomino::ROTATION_BIT;
        let json_text = format!(
            r#"{{
                "grid": [
                    [{{"start": true}}, {{}}, {{}}],
                    [{{}}, {{"type": "poly", "polyshape": {domino}}}, {{}}],
                    [{{}}, {{}}, {{}}],
                    [{{}}, {{}}, {{}}],
                    [{{"end": "right"}}, {{}}, {{}}]
                ],
                "pillar": false
            }}"#
        );
        let mut p = Puzzle::deserialize(&json_text).unwrap();
        // draw along the top row only; the (2,1) edge between the two
        // content cells stays undrawn so they remain a single region.
        for (x, y) in [(0, 0), (1, 0), (2, 0), (3, 0), (4, 0)] {
            p.get_cell_mut(x, y).unwrap().set_line(Line::Black);
        }
        assert!(p.validate());
    }

    #[test]
    fn validate_poly_rejects_size_mismatch() {
        // a single-cell poly cannot cover a two-content-cell region: P = 1,
        // R = 2, Y = 0, so P != R + Y and the region is rejected outright.
        let single = (1u32 << (0 * 4 + 0)) | crate::polyomino::ROTATION_BIT;
        let json_text = format!(
            r#"{{
                "grid": [
                    [{{"start": true}}, {{}}, {{}}],
                    [{{}}, {{"type": "poly", "polyshape": {single}}}, {{}}],
                    [{{}}, {{}}, {{}}],
                    [{{}}, {{}}, {{}}],
                    [{{"end": "right"}}, {{}}, {{}}]
                ],
                "pillar": false
            }}"#
        );
        let mut p = Puzzle::deserialize(&json_text).unwrap();
        for (x, y) in [(0, 0), (1, 0), (2, 0), (3, 0), (4, 0)] {
            p.get_cell_mut(x, y).unwrap().set_line(Line::Black);
        }
        assert!(!p.validate());
    }

    #[test]
    fn serialize_round_trips_content_fields() {
        let p = Puzzle::deserialize(trivial_json()).unwrap();
        let round_tripped = Puzzle::deserialize(&p.serialize()).unwrap();
        assert!(round_tripped.get_cell(0, 0).unwrap().start());
        assert_eq!(
            round_tripped.get_cell(2, 0).unwrap().end(),
            Some(EndDir::Right)
        );
    }

    #[test]
    fn board_to_string_has_no_escapes_when_uncolored() {
        let p = Puzzle::deserialize(trivial_json()).unwrap();
        let plain = p.board_to_string(false);
        assert!(!plain.contains("\x1b["));
    }
}
