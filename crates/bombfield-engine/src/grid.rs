//! Board generation.

use bombfield_protocol::{Cell, Grid, Position};
use rand::Rng;

/// Cells within this Chebyshev distance of a spawn point never start as
/// blocks, so every participant has room to place a first bomb and step
/// away from it.
pub const SPAWN_CLEARANCE: usize = 2;

/// Whether `pos` is a permanent wall on a `width`×`height` board: the
/// border plus every cell whose coordinates are both even.
pub fn is_fixed_wall(pos: Position, width: usize, height: usize) -> bool {
    pos.x == 0
        || pos.y == 0
        || pos.x + 1 == width
        || pos.y + 1 == height
        || (pos.x % 2 == 0 && pos.y % 2 == 0)
}

/// Builds a fresh board.
///
/// The wall layout is fixed by the dimensions. Every other cell outside
/// the spawn clearance becomes a [`Cell::Block`] with probability
/// `density`, otherwise it stays empty.
pub fn generate<R: Rng + ?Sized>(
    width: usize,
    height: usize,
    spawns: &[Position],
    density: f64,
    rng: &mut R,
) -> Grid {
    let mut grid = Grid::filled(width, height, Cell::Empty);

    for y in 0..height {
        for x in 0..width {
            let pos = Position::new(x, y);
            let cell = if is_fixed_wall(pos, width, height) {
                Cell::Wall
            } else if near_spawn(pos, spawns) {
                Cell::Empty
            } else if rng.random::<f64>() < density {
                Cell::Block
            } else {
                Cell::Empty
            };
            grid.set(pos, cell);
        }
    }

    grid
}

fn near_spawn(pos: Position, spawns: &[Position]) -> bool {
    spawns.iter().any(|s| s.chebyshev(&pos) <= SPAWN_CLEARANCE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn spawns() -> Vec<Position> {
        vec![Position::new(1, 1), Position::new(11, 1), Position::new(1, 9)]
    }

    #[test]
    fn test_walls_are_fixed_for_every_seed() {
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let grid = generate(13, 11, &spawns(), 0.7, &mut rng);

            for (pos, cell) in grid.iter() {
                if is_fixed_wall(pos, 13, 11) {
                    assert_eq!(cell, Cell::Wall, "seed {seed}: {pos} should be a wall");
                } else {
                    assert_ne!(cell, Cell::Wall, "seed {seed}: {pos} should not be a wall");
                }
            }
        }
    }

    #[test]
    fn test_no_blocks_near_spawns() {
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            let grid = generate(13, 11, &spawns(), 1.0, &mut rng);

            for (pos, cell) in grid.iter() {
                if spawns().iter().any(|s| s.chebyshev(&pos) <= 2) {
                    assert_ne!(cell, Cell::Block, "seed {seed}: block at {pos} near spawn");
                }
            }
        }
    }

    #[test]
    fn test_full_density_fills_every_free_cell() {
        let mut rng = StdRng::seed_from_u64(7);
        let grid = generate(13, 11, &spawns(), 1.0, &mut rng);

        let expected_block = |pos: Position| {
            !is_fixed_wall(pos, 13, 11) && spawns().iter().all(|s| s.chebyshev(&pos) > 2)
        };
        for (pos, cell) in grid.iter() {
            assert_eq!(cell == Cell::Block, expected_block(pos), "{pos}");
        }
    }

    #[test]
    fn test_zero_density_has_no_blocks() {
        let mut rng = StdRng::seed_from_u64(7);
        let grid = generate(13, 11, &spawns(), 0.0, &mut rng);
        assert!(grid.iter().all(|(_, c)| c != Cell::Block));
    }

    #[test]
    fn test_spawn_cells_are_open() {
        let mut rng = StdRng::seed_from_u64(1);
        let grid = generate(13, 11, &spawns(), 0.7, &mut rng);
        for s in spawns() {
            assert_eq!(grid.get(s), Some(Cell::Empty));
        }
    }

    #[test]
    fn test_fixed_wall_pattern() {
        assert!(is_fixed_wall(Position::new(0, 5), 13, 11));
        assert!(is_fixed_wall(Position::new(12, 5), 13, 11));
        assert!(is_fixed_wall(Position::new(4, 10), 13, 11));
        assert!(is_fixed_wall(Position::new(2, 2), 13, 11));
        assert!(!is_fixed_wall(Position::new(1, 1), 13, 11));
        assert!(!is_fixed_wall(Position::new(2, 1), 13, 11));
        assert!(!is_fixed_wall(Position::new(3, 2), 13, 11));
    }
}
