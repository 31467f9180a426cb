//! Greedy nearest-neighbour ordering of cuts within a pass.

use millpath_math::{distance_xy, Point3};

use crate::toolpath::Polyline;

fn start_of(p: &Polyline) -> Point3 {
    p.start().copied().unwrap_or_else(Point3::origin)
}

fn end_of(p: &Polyline) -> Point3 {
    p.end().copied().unwrap_or_else(Point3::origin)
}

/// Reorder `polylines` so each one starts as close as possible (in XY) to
/// where the previous one ended.
///
/// With a `seed`, the first cut is the one starting nearest to it; without
/// one, the cut starting nearest the origin by `|x| + |y|` goes first.
/// Returns the exit point of the reordered range.
pub fn reorder_range(polylines: &mut [Polyline], seed: Option<Point3>) -> Point3 {
    let count = polylines.len();
    match count {
        0 => return seed.unwrap_or_else(Point3::origin),
        1 => {
            return polylines[0]
                .end()
                .copied()
                .unwrap_or_else(|| seed.unwrap_or_else(Point3::origin))
        }
        _ => {}
    }

    let starts: Vec<Point3> = polylines.iter().map(start_of).collect();
    let mut used = vec![false; count];
    let closest = |from: &Point3, used: &[bool]| -> Option<usize> {
        starts
            .iter()
            .enumerate()
            .filter(|(i, _)| !used[*i])
            .map(|(i, s)| (i, distance_xy(from, s)))
            .fold(None, |best: Option<(usize, f64)>, (i, d)| match best {
                Some((_, bd)) if bd <= d => best,
                _ => Some((i, d)),
            })
            .map(|(i, _)| i)
    };

    let first = match seed {
        Some(s) => closest(&s, &used).unwrap_or(0),
        None => {
            let mut best = (0, f64::MAX);
            for (i, s) in starts.iter().enumerate() {
                let metric = s.x.abs() + s.y.abs();
                if metric < best.1 {
                    best = (i, metric);
                }
            }
            best.0
        }
    };

    let mut order = Vec::with_capacity(count);
    used[first] = true;
    order.push(first);
    let mut cursor = end_of(&polylines[first]);
    while order.len() < count {
        let Some(next) = closest(&cursor, &used) else {
            break;
        };
        used[next] = true;
        order.push(next);
        cursor = end_of(&polylines[next]);
    }

    let mut taken: Vec<Polyline> = polylines.iter_mut().map(std::mem::take).collect();
    for (slot, index) in polylines.iter_mut().zip(order) {
        *slot = std::mem::take(&mut taken[index]);
    }
    cursor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(x0: f64, x1: f64, y: f64) -> Polyline {
        Polyline::cut(vec![Point3::new(x0, y, 0.0), Point3::new(x1, y, 0.0)])
    }

    #[test]
    fn test_unseeded_starts_near_origin() {
        let mut lines = vec![seg(10.0, 20.0, 5.0), seg(0.0, 9.0, 0.0), seg(9.0, 0.0, 1.0)];
        let exit = reorder_range(&mut lines, None);
        assert_eq!(lines[0].start().unwrap().x, 0.0);
        assert_eq!(lines[1].start().unwrap().x, 9.0);
        assert_eq!(lines[2].start().unwrap().x, 10.0);
        assert_eq!(exit, Point3::new(20.0, 5.0, 0.0));
    }

    #[test]
    fn test_seeded_from_previous_exit() {
        let mut lines = vec![seg(0.0, 1.0, 0.0), seg(50.0, 51.0, 0.0)];
        let exit = reorder_range(&mut lines, Some(Point3::new(49.0, 0.0, 0.0)));
        assert_eq!(lines[0].start().unwrap().x, 50.0);
        assert_eq!(exit.x, 1.0);
    }

    #[test]
    fn test_single_and_empty_ranges() {
        let mut one = vec![seg(0.0, 3.0, 0.0)];
        assert_eq!(reorder_range(&mut one, None).x, 3.0);
        let seed = Point3::new(1.0, 2.0, 3.0);
        assert_eq!(reorder_range(&mut [], Some(seed)), seed);
    }
}
