//! Distance metric used for nearest-neighbour ranking.

/// Squared Euclidean distance. Callers guarantee equal lengths.
#[must_use]
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
