//! Pixel traversal orders.

use common::Strategy;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Right, down, left, up.
const SPIRAL_TURNS: [(i64, i64); 4] = [(1, 0), (0, 1), (-1, 0), (0, -1)];

/// Every `(x, y)` of a `width x height` grid exactly once, in the order
/// `strategy` prescribes. `seed` only matters for [`Strategy::Random`].
pub fn traversal(strategy: Strategy, width: u32, height: u32, seed: u64) -> Vec<(u32, u32)> {
    match strategy {
        Strategy::Down => (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .collect(),
        Strategy::Up => (0..height)
            .rev()
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .collect(),
        Strategy::Right => (0..width)
            .flat_map(|x| (0..height).map(move |y| (x, y)))
            .collect(),
        Strategy::Left => (0..width)
            .rev()
            .flat_map(|x| (0..height).map(move |y| (x, y)))
            .collect(),
        Strategy::Random => {
            let mut order = traversal(Strategy::Down, width, height, seed);
            order.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));
            order
        }
        Strategy::SpiralFromCenter => spiral_from_center(width, height),
        Strategy::SpiralToCenter => {
            let mut order = spiral_from_center(width, height);
            order.reverse();
            order
        }
    }
}

/// Square spiral outward from `(width/2, height/2)`. The walk continues past
/// the grid edges, emitting only in-bounds cells, until every cell is seen.
fn spiral_from_center(width: u32, height: u32) -> Vec<(u32, u32)> {
    let total = width as usize * height as usize;
    let mut order = Vec::with_capacity(total);
    if total == 0 {
        return order;
    }
    let mut visited = vec![false; total];
    let (w, h) = (width as i64, height as i64);
    let mut visit = |x: i64, y: i64, order: &mut Vec<(u32, u32)>| {
        if x < 0 || y < 0 || x >= w || y >= h {
            return;
        }
        let cell = (y * w + x) as usize;
        if !visited[cell] {
            visited[cell] = true;
            order.push((x as u32, y as u32));
        }
    };

    let (mut x, mut y) = (w / 2, h / 2);
    visit(x, y, &mut order);
    let mut step = 1;
    let mut turn = 0;
    while order.len() < total {
        for _ in 0..2 {
            let (dx, dy) = SPIRAL_TURNS[turn % 4];
            for _ in 0..step {
                x += dx;
                y += dy;
                visit(x, y, &mut order);
            }
            turn += 1;
        }
        step += 1;
    }
    order
}
