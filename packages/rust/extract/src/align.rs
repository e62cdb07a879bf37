//! Column alignment check for emphasized text.
//!
//! `<strong>` is only a heading when the matches line up on a shared left
//! edge; scattered inline emphasis is discarded as a whole.

use outlinelens_dom::{NodeId, Page};

/// Share of matches (in tenths) that must sit on the dominant left edge.
const MIN_ALIGNED_TENTHS: usize = 7;

/// Lefts closer than this are the same column.
const COLUMN_RESOLUTION: f64 = 0.5;

fn column_key(left: f64) -> i64 {
    (left / COLUMN_RESOLUTION).round() as i64
}

/// The dominant left edge, if at least 70% of `lefts` (rounded down) share it.
pub fn common_left(lefts: &[f64]) -> Option<f64> {
    if lefts.is_empty() {
        return None;
    }

    // (key, first left seen, count) in first-seen order
    let mut columns: Vec<(i64, f64, usize)> = Vec::new();
    for &left in lefts {
        let key = column_key(left);
        match columns.iter_mut().find(|(k, _, _)| *k == key) {
            Some(column) => column.2 += 1,
            None => columns.push((key, left, 1)),
        }
    }

    let mut best = columns[0];
    for column in &columns[1..] {
        if column.2 > best.2 {
            best = *column;
        }
    }

    let required = (lefts.len() * MIN_ALIGNED_TENTHS / 10).max(1);
    (best.2 >= required).then_some(best.1)
}

/// Keep the nodes on the dominant column, or none at all when there is no
/// column or it starts past `max_left`.
pub fn aligned_column(page: &Page, nodes: &[NodeId], max_left: f64) -> Vec<NodeId> {
    let lefts: Vec<f64> = nodes.iter().map(|n| page.rect(*n).left).collect();
    let Some(column) = common_left(&lefts) else {
        return Vec::new();
    };
    if column > max_left {
        return Vec::new();
    }

    let key = column_key(column);
    nodes
        .iter()
        .zip(&lefts)
        .filter(|(_, left)| column_key(**left) == key)
        .map(|(node, _)| *node)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_of_three_is_a_column() {
        assert_eq!(common_left(&[10.0, 10.0, 400.0]), Some(10.0));
    }

    #[test]
    fn scattered_lefts_are_not_a_column() {
        assert_eq!(common_left(&[10.0, 120.0, 400.0]), None);
        assert_eq!(common_left(&[10.0, 10.0, 50.0, 60.0, 70.0]), None);
    }

    #[test]
    fn single_match_is_its_own_column() {
        assert_eq!(common_left(&[42.0]), Some(42.0));
        assert_eq!(common_left(&[]), None);
    }

    #[test]
    fn sub_pixel_noise_is_tolerated() {
        assert_eq!(common_left(&[10.0, 10.1, 9.9, 10.0]), Some(10.0));
    }

    #[test]
    fn ties_prefer_first_column() {
        // floor(0.7 * 2) = 1, so either column qualifies; the first wins.
        assert_eq!(common_left(&[5.0, 30.0]), Some(5.0));
    }
}
