//! Cardinal B-spline charge assignment weights.
//!
//! A charge at mesh coordinate `u = x / h` spreads over `order` consecutive
//! nodes. The weights are the values of the order-`order` cardinal B-spline
//! and sum to one for any `u`, including exact node positions.

use super::MAX_CAO;

/// Per-axis stencil of one particle: first node and `order` weights.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Stencil {
    pub first: [i64; 3],
    pub weights: [[f64; MAX_CAO]; 3],
}

/// Fill `out[..order]` with the weights of nodes `first, first + 1, ...` and
/// return `first` (not yet wrapped into the mesh).
#[inline]
pub fn weights(u: f64, order: usize, out: &mut [f64; MAX_CAO]) -> i64 {
    let shifted = u - 0.5 * order as f64;
    let base = shifted.floor();
    let f = shifted - base;

    let mut vals = [0.0; MAX_CAO];
    vals[0] = 1.0;
    for k in 2..=order {
        let mut next = [0.0; MAX_CAO];
        let inv = 1.0 / (k - 1) as f64;
        for (j, slot) in next.iter_mut().enumerate().take(k) {
            let x = f + j as f64;
            let a = if j < k - 1 { vals[j] } else { 0.0 };
            let b = if j >= 1 { vals[j - 1] } else { 0.0 };
            *slot = (x * a + (k as f64 - x) * b) * inv;
        }
        vals = next;
    }
    for j in 0..order {
        out[j] = vals[order - 1 - j];
    }
    base as i64 + 1
}

/// Stencil for a position given per-axis mesh spacing.
pub fn stencil(pos: [f64; 3], spacing: [f64; 3], order: usize) -> Stencil {
    let mut s = Stencil::default();
    for axis in 0..3 {
        s.first[axis] = weights(pos[axis] / spacing[axis], order, &mut s.weights[axis]);
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn weights_sum_to_one_for_every_order() {
        let mut w = [0.0; MAX_CAO];
        for order in 1..=MAX_CAO {
            for &u in &[0.0, 0.25, 3.0, 3.5, 7.999, 12.3] {
                weights(u, order, &mut w);
                let sum: f64 = w[..order].iter().sum();
                assert_relative_eq!(sum, 1.0, epsilon = 1e-14);
                assert!(w[..order].iter().all(|&x| x >= 0.0));
            }
        }
    }

    #[test]
    fn nearest_grid_point_and_cloud_in_cell() {
        let mut w = [0.0; MAX_CAO];
        assert_eq!(weights(2.3, 1, &mut w), 2);
        assert_eq!(w[0], 1.0);
        assert_eq!(weights(2.7, 1, &mut w), 3);

        let first = weights(2.3, 2, &mut w);
        assert_eq!(first, 2);
        assert_relative_eq!(w[0], 0.7, epsilon = 1e-12);
        assert_relative_eq!(w[1], 0.3, epsilon = 1e-12);
    }

    #[test]
    fn symmetric_on_a_node() {
        let mut w = [0.0; MAX_CAO];
        let first = weights(4.0, 3, &mut w);
        assert_eq!(first, 3);
        assert_relative_eq!(w[0], 0.125);
        assert_relative_eq!(w[1], 0.75);
        assert_relative_eq!(w[2], 0.125);
    }
}
