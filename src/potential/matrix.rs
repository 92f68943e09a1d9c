// potential/matrix.rs
// Flat per-pair parameter matrix

/// Square matrix of per-pair parameters, stored row-major with each pair's
/// parameters contiguous: `data[(i * n + j) * n_params + p]`.
///
/// Built once at setup and never mutated afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct PotentialMatrix {
    n_species: usize,
    n_params: usize,
    data: Vec<f64>,
}

impl PotentialMatrix {
    /// Fill the matrix from a combination rule evaluated on the upper triangle.
    /// The lower triangle is copied so that `params(i, j) == params(j, i)` bit for bit.
    pub fn build<F>(n_species: usize, n_params: usize, mut rule: F) -> Self
    where
        F: FnMut(usize, usize, &mut [f64]),
    {
        let mut data = vec![0.0; n_species * n_species * n_params];
        for i in 0..n_species {
            for j in i..n_species {
                let start = (i * n_species + j) * n_params;
                rule(i, j, &mut data[start..start + n_params]);
                if i != j {
                    let mirror = (j * n_species + i) * n_params;
                    data.copy_within(start..start + n_params, mirror);
                }
            }
        }
        Self {
            n_species,
            n_params,
            data,
        }
    }

    #[inline]
    pub fn params(&self, i: usize, j: usize) -> &[f64] {
        let start = (i * self.n_species + j) * self.n_params;
        &self.data[start..start + self.n_params]
    }

    pub fn n_species(&self) -> usize {
        self.n_species
    }

    pub fn n_params(&self) -> usize {
        self.n_params
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lower_triangle_mirrors_upper() {
        let m = PotentialMatrix::build(3, 2, |i, j, out| {
            out[0] = (i * 10 + j) as f64;
            out[1] = -1.0;
        });
        assert_eq!(m.params(0, 2), m.params(2, 0));
        assert_eq!(m.params(1, 2)[0], 12.0);
        assert_eq!(m.as_slice().len(), 18);
    }
}
