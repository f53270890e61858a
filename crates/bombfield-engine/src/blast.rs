//! Blast propagation.

use bombfield_protocol::{Cell, Direction, Grid, Position};

/// Cells reached by a blast of `radius` centred on `origin`.
///
/// The origin always comes first. Each direction in [`Direction::ALL`]
/// then expands outward one cell at a time until `radius` is reached or
/// the ray hits:
///
/// - the grid edge or a [`Cell::Wall`]: stop, the cell is not included;
/// - a [`Cell::Block`]: include it and stop.
///
/// The grid is not modified; destroying the blocks is up to the caller.
pub fn blast_cells(grid: &Grid, origin: Position, radius: u32) -> Vec<Position> {
    let mut cells = vec![origin];

    for dir in Direction::ALL {
        for distance in 1..=radius as usize {
            let Some(pos) = grid.ray(origin, dir, distance) else {
                break;
            };
            match grid.get(pos) {
                Some(Cell::Empty) => cells.push(pos),
                Some(Cell::Block) => {
                    cells.push(pos);
                    break;
                }
                Some(Cell::Wall) | None => break,
            }
        }
    }

    cells
}
