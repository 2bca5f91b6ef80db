//! Kitchen grid: cell classification, station positions and bin assignment.

use crate::recipe::VEGETABLES;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Grid cell coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn manhattan(self, other: Coord) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Orthogonal neighbours in the fixed order East, West, South, North.
    pub fn neighbours(self) -> [Coord; 4] {
        [
            Coord::new(self.x + 1, self.y),
            Coord::new(self.x - 1, self.y),
            Coord::new(self.x, self.y + 1),
            Coord::new(self.x, self.y - 1),
        ]
    }

    pub fn is_adjacent(self, other: Coord) -> bool {
        self.manhattan(other) == 1
    }
}

impl std::fmt::Display for Coord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Station classes found on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StationKind {
    Bin,
    CuttingBoard,
    Oven,
    Pan,
    Assembly,
    Service,
}

impl StationKind {
    pub const ALL: [StationKind; 6] = [
        StationKind::Bin,
        StationKind::CuttingBoard,
        StationKind::Oven,
        StationKind::Pan,
        StationKind::Assembly,
        StationKind::Service,
    ];

    pub fn symbol(self) -> char {
        match self {
            StationKind::Bin => 'B',
            StationKind::CuttingBoard => 'C',
            StationKind::Oven => 'O',
            StationKind::Pan => 'P',
            StationKind::Assembly => 'A',
            StationKind::Service => 'S',
        }
    }

    fn from_symbol(symbol: char) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.symbol() == symbol)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cell {
    Floor,
    Wall,
    Station(StationKind),
}

impl Cell {
    /// Walls and every station block movement; stations are only approached.
    pub fn is_blocking(self) -> bool {
        !matches!(self, Cell::Floor)
    }
}

/// What a bin hands out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinSupply {
    Ingredient(String),
    /// Wildcard dispenser yielding any vegetable on demand.
    Vegetable,
}

impl BinSupply {
    pub fn parse(name: &str) -> Self {
        if name == "vegetable" {
            BinSupply::Vegetable
        } else {
            BinSupply::Ingredient(name.to_string())
        }
    }

    pub fn supplies(&self, ingredient: &str) -> bool {
        match self {
            BinSupply::Ingredient(name) => name == ingredient,
            BinSupply::Vegetable => VEGETABLES.contains(&ingredient),
        }
    }
}

/// Immutable-shape kitchen grid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grid {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
    stations: BTreeMap<StationKind, Vec<Coord>>,
    bins: BTreeMap<Coord, BinSupply>,
}

impl Grid {
    /// Build a grid from text rows.
    ///
    /// `#` is a wall, `.` floor, and every other accepted symbol a station
    /// (see [`StationKind::symbol`]).
    ///
    /// # Errors
    /// Returns an error if the layout is empty, ragged or has unknown symbols.
    pub fn parse<S: AsRef<str>>(layout: &[S]) -> Result<Self> {
        let height = layout.len();
        if height == 0 {
            bail!("layout must have at least one row");
        }
        let width = layout[0].as_ref().chars().count();
        if width == 0 {
            bail!("layout rows must not be empty");
        }

        let mut cells = Vec::with_capacity(width * height);
        for (y, row) in layout.iter().enumerate() {
            let row = row.as_ref();
            let len = row.chars().count();
            if len != width {
                bail!("row {y} must have {width} cells, but has {len}");
            }
            for (x, symbol) in row.chars().enumerate() {
                let cell = match symbol {
                    '#' => Cell::Wall,
                    '.' => Cell::Floor,
                    other => StationKind::from_symbol(other)
                        .map(Cell::Station)
                        .with_context(|| format!("unknown symbol {other:?} at ({x}, {y})"))?,
                };
                cells.push(cell);
            }
        }

        let mut grid = Self {
            width,
            height,
            cells,
            stations: BTreeMap::new(),
            bins: BTreeMap::new(),
        };
        grid.index_stations();
        Ok(grid)
    }

    fn index_stations(&mut self) {
        self.stations.clear();
        for kind in StationKind::ALL {
            self.stations.insert(kind, Vec::new());
        }
        // Row-major scan keeps station lists in reading order.
        for y in 0..self.height {
            for x in 0..self.width {
                let pos = Coord::new(x as i32, y as i32);
                if let Cell::Station(kind) = self.cell(pos) {
                    self.stations.entry(kind).or_default().push(pos);
                }
            }
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn in_bounds(&self, pos: Coord) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as usize) < self.width && (pos.y as usize) < self.height
    }

    /// Cell at `pos`; anything outside the grid reads as a wall.
    pub fn cell(&self, pos: Coord) -> Cell {
        if !self.in_bounds(pos) {
            return Cell::Wall;
        }
        self.cells[pos.y as usize * self.width + pos.x as usize]
    }

    pub fn is_blocking(&self, pos: Coord) -> bool {
        self.cell(pos).is_blocking()
    }

    pub fn stations(&self, kind: StationKind) -> &[Coord] {
        self.stations.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Ovens followed by pans.
    pub fn cookers(&self) -> Vec<Coord> {
        let mut cookers = self.stations(StationKind::Oven).to_vec();
        cookers.extend_from_slice(self.stations(StationKind::Pan));
        cookers
    }

    /// Assign supplies to bins round-robin.
    ///
    /// When there are fewer bins than supplies, floor cells are converted into
    /// bins (reading order) until every supply has at least one bin.
    ///
    /// # Errors
    /// Returns an error if `supplies` is empty or the grid has no floor left.
    pub fn assign_bins(&mut self, supplies: &[BinSupply]) -> Result<()> {
        if supplies.is_empty() {
            bail!("at least one bin supply is required");
        }

        let mut missing = supplies
            .len()
            .saturating_sub(self.stations(StationKind::Bin).len());
        if missing > 0 {
            for idx in 0..self.cells.len() {
                if missing == 0 {
                    break;
                }
                if self.cells[idx] == Cell::Floor {
                    self.cells[idx] = Cell::Station(StationKind::Bin);
                    missing -= 1;
                }
            }
            if missing > 0 {
                bail!("not enough floor cells to place {missing} more bins");
            }
            self.index_stations();
            log::debug!("converted floor cells into bins to fit {} supplies", supplies.len());
        }

        self.bins = self
            .stations(StationKind::Bin)
            .iter()
            .enumerate()
            .map(|(idx, &pos)| (pos, supplies[idx % supplies.len()].clone()))
            .collect();
        Ok(())
    }

    pub fn bin_supply(&self, pos: Coord) -> Option<&BinSupply> {
        self.bins.get(&pos)
    }

    /// Bins able to hand out `ingredient`, ordered by coordinate.
    pub fn bins_supplying(&self, ingredient: &str) -> Vec<Coord> {
        self.bins
            .iter()
            .filter(|(_, supply)| supply.supplies(ingredient))
            .map(|(&pos, _)| pos)
            .collect()
    }
}

/// Default two-counter kitchen.
pub fn default_layout() -> Vec<String> {
    [
        "##########",
        "#..COO..A#",
        "#B......A#",
        "#B......S#",
        "#B......S#",
        "#B......S#",
        "#..PPC..S#",
        "##########",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_indexes_stations_in_reading_order() {
        let grid = Grid::parse(&default_layout()).unwrap();
        assert_eq!(grid.width(), 10);
        assert_eq!(grid.height(), 8);
        assert_eq!(
            grid.stations(StationKind::Oven),
            &[Coord::new(4, 1), Coord::new(5, 1)]
        );
        assert_eq!(
            grid.stations(StationKind::CuttingBoard),
            &[Coord::new(3, 1), Coord::new(5, 6)]
        );
        assert_eq!(grid.stations(StationKind::Service).len(), 4);
        assert_eq!(grid.cookers().len(), 4);
    }

    #[test]
    fn outside_cells_block() {
        let grid = Grid::parse(&["..", ".."]).unwrap();
        assert!(!grid.is_blocking(Coord::new(1, 1)));
        assert!(grid.is_blocking(Coord::new(-1, 0)));
        assert!(grid.is_blocking(Coord::new(2, 0)));
    }

    #[test]
    fn parse_rejects_ragged_and_unknown() {
        assert!(Grid::parse(&["...", ".."]).is_err());
        assert!(Grid::parse(&["..x"]).is_err());
        assert!(Grid::parse::<&str>(&[]).is_err());
    }

    #[test]
    fn bins_are_assigned_round_robin() {
        let mut grid = Grid::parse(&default_layout()).unwrap();
        let supplies: Vec<_> = ["tomato", "meat"].iter().map(|n| BinSupply::parse(n)).collect();
        grid.assign_bins(&supplies).unwrap();
        assert_eq!(grid.bins_supplying("tomato"), vec![Coord::new(1, 2), Coord::new(1, 4)]);
        assert_eq!(grid.bins_supplying("meat"), vec![Coord::new(1, 3), Coord::new(1, 5)]);
    }

    #[test]
    fn missing_bins_are_carved_from_floor() {
        let mut grid = Grid::parse(&["#B..", "#..."]).unwrap();
        let supplies: Vec<_> = ["tomato", "meat", "pasta"]
            .iter()
            .map(|n| BinSupply::parse(n))
            .collect();
        grid.assign_bins(&supplies).unwrap();
        assert_eq!(grid.stations(StationKind::Bin).len(), 3);
        assert!(grid.is_blocking(Coord::new(2, 0)));
        assert_eq!(grid.bins_supplying("pasta").len(), 1);
    }

    #[test]
    fn vegetable_bin_supplies_only_vegetables() {
        let supply = BinSupply::parse("vegetable");
        assert!(supply.supplies("tomato"));
        assert!(supply.supplies("lettuce"));
        assert!(!supply.supplies("meat"));
    }
}
