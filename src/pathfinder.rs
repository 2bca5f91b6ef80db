//! Breadth-first search over the 4-connected kitchen grid.

use crate::grid::{Coord, Grid};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Walkable neighbours of `pos`, East, West, South, North.
pub fn free_neighbours<'a>(
    grid: &'a Grid,
    pos: Coord,
    obstacles: &'a BTreeSet<Coord>,
) -> impl Iterator<Item = Coord> + 'a {
    pos.neighbours()
        .into_iter()
        .filter(move |&next| !grid.is_blocking(next) && !obstacles.contains(&next))
}

/// Shortest route from `start` to any cell of `goals`.
///
/// The returned cells exclude `start`, so the route is empty when `start` is
/// already a goal. Returns `None` when no goal can be reached. An obstacle on
/// `start` itself is ignored.
pub fn find_path(
    grid: &Grid,
    start: Coord,
    goals: &BTreeSet<Coord>,
    obstacles: &BTreeSet<Coord>,
) -> Option<Vec<Coord>> {
    if goals.contains(&start) {
        return Some(Vec::new());
    }

    let mut queue = VecDeque::from([start]);
    let mut parent: BTreeMap<Coord, Coord> = BTreeMap::new();

    while let Some(cur) = queue.pop_front() {
        if goals.contains(&cur) {
            let mut path = vec![cur];
            let mut step = cur;
            while let Some(&prev) = parent.get(&step) {
                if prev == start {
                    break;
                }
                path.push(prev);
                step = prev;
            }
            path.reverse();
            return Some(path);
        }

        for next in free_neighbours(grid, cur, obstacles) {
            if next != start && !parent.contains_key(&next) {
                parent.insert(next, cur);
                queue.push_back(next);
            }
        }
    }

    None
}

/// Walkable cells orthogonally adjacent to any of `stations`.
///
/// Agents work a station from one of these cells; they never enter it.
pub fn stations_to_adjacent_cells(
    grid: &Grid,
    stations: &[Coord],
    obstacles: &BTreeSet<Coord>,
) -> BTreeSet<Coord> {
    stations
        .iter()
        .flat_map(|&station| free_neighbours(grid, station, obstacles))
        .collect()
}

/// First station orthogonally adjacent to `pos`.
pub fn adjacent_station(pos: Coord, stations: &[Coord]) -> Option<Coord> {
    stations.iter().copied().find(|&station| pos.is_adjacent(station))
}
