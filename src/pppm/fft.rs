// pppm/fft.rs
// Three-dimensional complex FFT on a flat row-major mesh

use std::sync::Arc;

use rayon::prelude::*;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftDirection, FftPlanner};

/// Axis-by-axis 3D transform of a `[mx][my][mz]` row-major buffer.
///
/// Neither direction is normalised.
pub struct Fft3 {
    dims: [usize; 3],
    forward: [Arc<dyn Fft<f64>>; 3],
    inverse: [Arc<dyn Fft<f64>>; 3],
}

impl Fft3 {
    pub fn new(dims: [usize; 3]) -> Self {
        let mut planner = FftPlanner::new();
        let forward = dims.map(|n| planner.plan_fft(n, FftDirection::Forward));
        let inverse = dims.map(|n| planner.plan_fft(n, FftDirection::Inverse));
        Self {
            dims,
            forward,
            inverse,
        }
    }

    pub fn len(&self) -> usize {
        self.dims.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn forward(&self, data: &mut [Complex<f64>]) {
        self.run(data, &self.forward);
    }

    pub fn inverse(&self, data: &mut [Complex<f64>]) {
        self.run(data, &self.inverse);
    }

    fn run(&self, data: &mut [Complex<f64>], plans: &[Arc<dyn Fft<f64>>; 3]) {
        debug_assert_eq!(data.len(), self.len());
        let [mx, my, mz] = self.dims;
        let plane = my * mz;

        // z lines are contiguous
        data.par_chunks_mut(mz).for_each(|line| plans[2].process(line));

        // y lines stay inside one x plane
        data.par_chunks_mut(plane).for_each(|slab| {
            let mut line = vec![Complex::default(); my];
            for iz in 0..mz {
                for iy in 0..my {
                    line[iy] = slab[iy * mz + iz];
                }
                plans[1].process(&mut line);
                for iy in 0..my {
                    slab[iy * mz + iz] = line[iy];
                }
            }
        });

        // x lines span the whole buffer: gather, transform, scatter
        let mut lines = vec![Complex::default(); data.len()];
        let src: &[Complex<f64>] = data;
        lines
            .par_chunks_mut(mx)
            .enumerate()
            .for_each(|(offset, line)| {
                for ix in 0..mx {
                    line[ix] = src[ix * plane + offset];
                }
                plans[0].process(line);
            });
        for (offset, line) in lines.chunks(mx).enumerate() {
            for ix in 0..mx {
                data[ix * plane + offset] = line[ix];
            }
        }
    }
}
