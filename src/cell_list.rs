use smallvec::SmallVec;
use ultraviolet::DVec3;

use crate::simulation_box::SimulationBox;
use crate::utils::component;

/// Neighbouring cells with a higher index than the owner.
pub type UpperNeighbors = SmallVec<[usize; 26]>;

pub struct CellList {
    dims: [usize; 3],
    cell_size: [f64; 3],
    cells: Vec<Vec<usize>>, // particle indices per cell
    upper: Vec<UpperNeighbors>,
}

impl CellList {
    /// Cells of edge at least `cutoff` along every axis.
    pub fn new(sim_box: &SimulationBox, cutoff: f64) -> Self {
        let lengths = sim_box.lengths();
        let dims = lengths.map(|l| ((l / cutoff).floor() as usize).max(1));
        let cell_size = [
            lengths[0] / dims[0] as f64,
            lengths[1] / dims[1] as f64,
            lengths[2] / dims[2] as f64,
        ];
        let count = dims.iter().product();
        let mut list = Self {
            dims,
            cell_size,
            cells: vec![Vec::new(); count],
            upper: Vec::with_capacity(count),
        };
        for c in 0..count {
            let n = list.upper_for(c, sim_box);
            list.upper.push(n);
        }
        list
    }

    fn upper_for(&self, c: usize, sim_box: &SimulationBox) -> UpperNeighbors {
        let [_, ny, nz] = self.dims;
        let (cx, cy, cz) = (c / (ny * nz), (c / nz) % ny, c % nz);
        let mut out = UpperNeighbors::new();
        for dx in -1i64..=1 {
            for dy in -1i64..=1 {
                for dz in -1i64..=1 {
                    let coord = [cx as i64 + dx, cy as i64 + dy, cz as i64 + dz];
                    let mut wrapped = [0usize; 3];
                    let mut valid = true;
                    for axis in 0..3 {
                        let n = self.dims[axis] as i64;
                        let v = coord[axis];
                        if (v < 0 || v >= n) && !sim_box.is_periodic(axis) {
                            valid = false;
                            break;
                        }
                        wrapped[axis] = v.rem_euclid(n) as usize;
                    }
                    if !valid {
                        continue;
                    }
                    let other = (wrapped[0] * ny + wrapped[1]) * nz + wrapped[2];
                    if other > c {
                        out.push(other);
                    }
                }
            }
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Refill the buckets from `pos`, leaving out particles flagged in `skip`.
    pub fn rebuild(&mut self, pos: &[DVec3], skip: &[bool]) {
        for cell in &mut self.cells {
            cell.clear();
        }
        for (i, &p) in pos.iter().enumerate() {
            if skip[i] {
                continue;
            }
            let c = self.cell_of(p);
            self.cells[c].push(i);
        }
    }

    pub fn cell_of(&self, pos: DVec3) -> usize {
        let mut idx = [0usize; 3];
        for axis in 0..3 {
            let x = (component(pos, axis) / self.cell_size[axis]).floor() as i64;
            idx[axis] = x.clamp(0, self.dims[axis] as i64 - 1) as usize;
        }
        (idx[0] * self.dims[1] + idx[1]) * self.dims[2] + idx[2]
    }

    pub fn dims(&self) -> [usize; 3] {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[inline]
    pub fn cell(&self, c: usize) -> &[usize] {
        &self.cells[c]
    }

    #[inline]
    pub fn upper_neighbors(&self, c: usize) -> &[usize] {
        &self.upper[c]
    }
}
