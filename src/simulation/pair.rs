//! Short-range pair forces inside the cutoff.
//!
//! Cells are split into a fixed number of chunks. Each chunk accumulates into
//! its own force buffer, and the buffers are summed in chunk order, so results
//! do not depend on the thread count.

use rayon::prelude::*;
use ultraviolet::DVec3;

use crate::cell_list::CellList;
use crate::error::{Result, SimError};
use crate::particles::Particles;
use crate::potential::PotentialSetup;
use crate::profile_scope;
use crate::simulation_box::SimulationBox;
use crate::species::SpeciesTable;

/// Number of independent accumulation buffers.
pub const PAIR_CHUNKS: usize = 16;

/// Pair-separation histogram per unordered species pair.
#[derive(Clone, Debug, PartialEq)]
pub struct RdfHistogram {
    pub nbins: usize,
    pub bin_width: f64,
    pub pairs: usize,
    /// `counts[pair * nbins + bin]`
    pub counts: Vec<u64>,
    pub samples: usize,
}

impl RdfHistogram {
    pub fn new(nbins: usize, rc: f64, pairs: usize) -> Self {
        Self {
            nbins,
            bin_width: rc / nbins as f64,
            pairs,
            counts: vec![0; nbins * pairs],
            samples: 0,
        }
    }

    /// Bin centres.
    pub fn radii(&self) -> Vec<f64> {
        (0..self.nbins)
            .map(|b| (b as f64 + 0.5) * self.bin_width)
            .collect()
    }

    /// g(r) per species pair, normalised by ideal-gas shell counts.
    pub fn normalized(&self, species: &SpeciesTable, volume: f64) -> Vec<Vec<f64>> {
        let mut out = vec![vec![0.0; self.nbins]; self.pairs];
        if self.samples == 0 {
            return out;
        }
        for a in 0..species.len() {
            for b in a..species.len() {
                let na = species.get(a).count as f64;
                let nb = species.get(b).count as f64;
                let ideal_pairs = if a == b {
                    0.5 * na * (na - 1.0)
                } else {
                    na * nb
                } / volume;
                let pair = species.pair_index(a, b);
                for bin in 0..self.nbins {
                    let r0 = bin as f64 * self.bin_width;
                    let r1 = r0 + self.bin_width;
                    let shell = 4.0 / 3.0 * std::f64::consts::PI * (r1.powi(3) - r0.powi(3));
                    let expected = self.samples as f64 * ideal_pairs * shell;
                    if expected > 0.0 {
                        out[pair][bin] = self.counts[pair * self.nbins + bin] as f64 / expected;
                    }
                }
            }
        }
        out
    }

    pub fn clear(&mut self) {
        self.counts.iter_mut().for_each(|c| *c = 0);
        self.samples = 0;
    }
}

#[derive(Clone, Debug, Default)]
struct ChunkAccum {
    force: Vec<DVec3>,
    energy: f64,
    rdf: Vec<u64>,
    fault: Option<(usize, usize)>,
}

impl ChunkAccum {
    fn reset(&mut self, n: usize, rdf_len: usize) {
        self.force.clear();
        self.force.resize(n, DVec3::zero());
        self.energy = 0.0;
        self.rdf.clear();
        self.rdf.resize(rdf_len, 0);
        self.fault = None;
    }
}

/// Read-only inputs shared by every chunk.
struct PairContext<'a> {
    pos: &'a [DVec3],
    species: &'a [usize],
    potential: &'a PotentialSetup,
    sim_box: &'a SimulationBox,
    rc_sq: f64,
    min_separation: f64,
    rdf: Option<(usize, f64, &'a SpeciesTable)>,
}

impl PairContext<'_> {
    #[inline]
    fn interact(&self, i: usize, j: usize, acc: &mut ChunkAccum) {
        let dr = self.sim_box.minimum_image(self.pos[i] - self.pos[j]);
        let r_sq = dr.mag_sq();
        if r_sq > self.rc_sq {
            return;
        }
        let r_true = r_sq.sqrt();
        let r = r_true.max(self.min_separation);
        let (si, sj) = (self.species[i], self.species[j]);
        let (u, fr) = self.potential.pair(r, si, sj);
        if !(u.is_finite() && fr.is_finite()) {
            acc.fault.get_or_insert((i, j));
            return;
        }
        let f = dr * fr;
        acc.force[i] += f;
        acc.force[j] -= f;
        acc.energy += u;
        if let Some((nbins, width, table)) = self.rdf {
            let bin = (r_true / width) as usize;
            if bin < nbins {
                acc.rdf[table.pair_index(si, sj) * nbins + bin] += 1;
            }
        }
    }
}

pub struct PairForceSolver {
    rc: f64,
    min_separation: f64,
    cells: Option<CellList>,
    chunks: Vec<ChunkAccum>,
    rdf: Option<RdfHistogram>,
}

impl PairForceSolver {
    /// `linked_list = false` selects the all-pairs loop.
    pub fn new(
        sim_box: &SimulationBox,
        rc: f64,
        min_separation: f64,
        linked_list: bool,
        rdf_nbins: usize,
        species_pairs: usize,
    ) -> Result<Self> {
        if !(rc.is_finite() && rc > 0.0) {
            return Err(SimError::config(format!("cutoff must be positive, got {rc}")));
        }
        if !(min_separation > 0.0 && min_separation < rc) {
            return Err(SimError::config(format!(
                "minimum separation must lie in (0, rc), got {min_separation}"
            )));
        }
        sim_box.check_cutoff(rc)?;
        Ok(Self {
            rc,
            min_separation,
            cells: linked_list.then(|| CellList::new(sim_box, rc)),
            chunks: vec![ChunkAccum::default(); PAIR_CHUNKS],
            rdf: (rdf_nbins > 0).then(|| RdfHistogram::new(rdf_nbins, rc, species_pairs)),
        })
    }

    pub fn rc(&self) -> f64 {
        self.rc
    }

    pub fn uses_cells(&self) -> bool {
        self.cells.is_some()
    }

    pub fn rdf(&self) -> Option<&RdfHistogram> {
        self.rdf.as_ref()
    }

    /// Add pair accelerations to `particles.acc` and return the pair energy.
    pub fn compute(
        &mut self,
        particles: &mut Particles,
        potential: &PotentialSetup,
        species: &SpeciesTable,
        sim_box: &SimulationBox,
        step: usize,
    ) -> Result<f64> {
        profile_scope!("pp");
        let n = particles.len();
        let rdf_len = self.rdf.as_ref().map_or(0, |h| h.counts.len());
        let ctx = PairContext {
            pos: &particles.pos,
            species: &particles.species,
            potential,
            sim_box,
            rc_sq: self.rc * self.rc,
            min_separation: self.min_separation,
            rdf: self.rdf.as_ref().map(|h| (h.nbins, h.bin_width, species)),
        };
        let absorbed = &particles.absorbed;

        match self.cells.as_mut() {
            Some(cells) => {
                cells.rebuild(&particles.pos, absorbed);
                let cells = &*cells;
                let per_chunk = cells.len().div_ceil(PAIR_CHUNKS);
                self.chunks
                    .par_iter_mut()
                    .enumerate()
                    .for_each(|(k, acc)| {
                        acc.reset(n, rdf_len);
                        let lo = (k * per_chunk).min(cells.len());
                        let hi = ((k + 1) * per_chunk).min(cells.len());
                        for c in lo..hi {
                            let own = cells.cell(c);
                            for (a, &i) in own.iter().enumerate() {
                                for &j in &own[a + 1..] {
                                    ctx.interact(i, j, acc);
                                }
                            }
                            for &other in cells.upper_neighbors(c) {
                                for &i in own {
                                    for &j in cells.cell(other) {
                                        ctx.interact(i, j, acc);
                                    }
                                }
                            }
                        }
                    });
            }
            None => {
                self.chunks
                    .par_iter_mut()
                    .enumerate()
                    .for_each(|(k, acc)| {
                        acc.reset(n, rdf_len);
                        for i in (k..n).step_by(PAIR_CHUNKS) {
                            if absorbed[i] {
                                continue;
                            }
                            for j in i + 1..n {
                                if !absorbed[j] {
                                    ctx.interact(i, j, acc);
                                }
                            }
                        }
                    });
            }
        }

        if let Some((i, j)) = self.chunks.iter().find_map(|c| c.fault) {
            return Err(SimError::instability(
                step,
                vec![i, j],
                "non-finite pair interaction",
            ));
        }

        let chunks = &self.chunks;
        let mass = &particles.mass;
        particles
            .acc
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, a)| {
                let mut f = DVec3::zero();
                for c in chunks {
                    f += c.force[i];
                }
                *a += f / mass[i];
            });

        if let Some(h) = self.rdf.as_mut() {
            for c in &self.chunks {
                for (dst, src) in h.counts.iter_mut().zip(&c.rdf) {
                    *dst += src;
                }
            }
            h.samples += 1;
        }

        Ok(self.chunks.iter().map(|c| c.energy).sum())
    }

    /// Pair forces without dividing by mass. Used to check pair symmetry.
    pub fn forces(&self) -> Vec<DVec3> {
        let n = self.chunks.first().map_or(0, |c| c.force.len());
        (0..n)
            .map(|i| self.chunks.iter().fold(DVec3::zero(), |f, c| f + c.force[i]))
            .collect()
    }
}
