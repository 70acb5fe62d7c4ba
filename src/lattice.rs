// lattice.rs - Occupancy bookkeeping over a fixed set of lattice sites

use nalgebra::Vector3;
use rand::Rng;

/// A reversible mutation of the occupancy state.
///
/// `Delete` carries the displacement the particle had, so the change can be
/// reverted exactly.
#[derive(Debug, Clone, Copy)]
pub enum SiteChange {
    Insert { site: usize, offset: Vector3<f64> },
    Delete { site: usize, offset: Vector3<f64> },
}

/// Particle configuration on a fixed site set.
///
/// Each site is either empty or holds one particle at the site coordinate
/// plus a small displacement. Occupied and empty site ids are kept in
/// swap-removable lists so uniform picks and apply/revert are O(1).
#[derive(Debug, Clone)]
pub struct SiteLattice {
    sites:        Vec<Vector3<f64>>,
    offset:       Vec<Vector3<f64>>,
    occupied:     Vec<bool>,
    occupied_ids: Vec<usize>,
    empty_ids:    Vec<usize>,
    slot:         Vec<usize>,
}

impl SiteLattice {
    /// Every site occupied, particles on their lattice positions.
    pub fn full(sites: Vec<Vector3<f64>>) -> Self {
        let n = sites.len();
        Self::with_occupied_count(sites, n)
    }

    /// Sites `0..n` occupied, the rest empty.
    pub fn with_occupied_count(sites: Vec<Vector3<f64>>, n: usize) -> Self {
        let total = sites.len();
        assert!(n <= total, "occupied count {n} exceeds site count {total}");
        let occupied: Vec<bool> = (0..total).map(|s| s < n).collect();
        let occupied_ids: Vec<usize> = (0..n).collect();
        let empty_ids: Vec<usize> = (n..total).collect();
        let mut slot = vec![0usize; total];
        for (k, &s) in occupied_ids.iter().enumerate() {
            slot[s] = k;
        }
        for (k, &s) in empty_ids.iter().enumerate() {
            slot[s] = k;
        }
        Self {
            sites,
            offset: vec![Vector3::zeros(); total],
            occupied,
            occupied_ids,
            empty_ids,
            slot,
        }
    }

    /// Simple-cubic site coordinates, for demos and tests.
    pub fn cubic_sites(nx: usize, ny: usize, nz: usize, spacing: f64) -> Vec<Vector3<f64>> {
        let mut sites = Vec::with_capacity(nx * ny * nz);
        for ix in 0..nx {
            for iy in 0..ny {
                for iz in 0..nz {
                    sites.push(Vector3::new(
                        ix as f64 * spacing,
                        iy as f64 * spacing,
                        iz as f64 * spacing,
                    ));
                }
            }
        }
        sites
    }

    #[inline(always)]
    pub fn n(&self) -> usize {
        self.occupied_ids.len()
    }

    #[inline(always)]
    pub fn n_sites(&self) -> usize {
        self.sites.len()
    }

    pub fn is_occupied(&self, site: usize) -> bool {
        self.occupied[site]
    }

    /// Lattice coordinate of a site (without displacement).
    pub fn site_coord(&self, site: usize) -> Vector3<f64> {
        self.sites[site]
    }

    /// Current particle position at an occupied site.
    pub fn position(&self, site: usize) -> Vector3<f64> {
        self.sites[site] + self.offset[site]
    }

    pub fn occupied_sites(&self) -> &[usize] {
        &self.occupied_ids
    }

    pub fn empty_sites(&self) -> &[usize] {
        &self.empty_ids
    }

    pub fn random_occupied(&self, rng: &mut impl Rng) -> Option<usize> {
        if self.occupied_ids.is_empty() {
            return None;
        }
        Some(self.occupied_ids[rng.gen_range(0..self.occupied_ids.len())])
    }

    pub fn random_empty(&self, rng: &mut impl Rng) -> Option<usize> {
        if self.empty_ids.is_empty() {
            return None;
        }
        Some(self.empty_ids[rng.gen_range(0..self.empty_ids.len())])
    }

    /// Displacement of the particle at an occupied site.
    pub fn displacement(&self, site: usize) -> Vector3<f64> {
        self.offset[site]
    }

    pub fn apply(&mut self, change: &SiteChange) {
        match *change {
            SiteChange::Insert { site, offset } => {
                debug_assert!(!self.occupied[site]);
                self.remove_from_empty(site);
                self.occupied[site] = true;
                self.slot[site] = self.occupied_ids.len();
                self.occupied_ids.push(site);
                self.offset[site] = offset;
            }
            SiteChange::Delete { site, .. } => {
                debug_assert!(self.occupied[site]);
                self.remove_from_occupied(site);
                self.occupied[site] = false;
                self.slot[site] = self.empty_ids.len();
                self.empty_ids.push(site);
                self.offset[site] = Vector3::zeros();
            }
        }
    }

    pub fn revert(&mut self, change: &SiteChange) {
        match *change {
            SiteChange::Insert { site, .. } => {
                self.apply(&SiteChange::Delete { site, offset: Vector3::zeros() });
            }
            SiteChange::Delete { site, offset } => {
                self.apply(&SiteChange::Insert { site, offset });
            }
        }
    }

    fn remove_from_empty(&mut self, site: usize) {
        let k = self.slot[site];
        self.empty_ids.swap_remove(k);
        if k < self.empty_ids.len() {
            let moved = self.empty_ids[k];
            self.slot[moved] = k;
        }
    }

    fn remove_from_occupied(&mut self, site: usize) {
        let k = self.slot[site];
        self.occupied_ids.swap_remove(k);
        if k < self.occupied_ids.len() {
            let moved = self.occupied_ids[k];
            self.slot[moved] = k;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_lattice(n_occupied: usize) -> SiteLattice {
        let sites = SiteLattice::cubic_sites(2, 2, 2, 1.0);
        SiteLattice::with_occupied_count(sites, n_occupied)
    }

    #[test]
    fn test_counts_after_apply() {
        let mut lat = small_lattice(6);
        assert_eq!(lat.n(), 6);
        assert_eq!(lat.empty_sites().len(), 2);

        let site = lat.empty_sites()[0];
        lat.apply(&SiteChange::Insert { site, offset: Vector3::new(0.1, 0.0, 0.0) });
        assert_eq!(lat.n(), 7);
        assert!(lat.is_occupied(site));
        assert!((lat.position(site).x - lat.site_coord(site).x - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_apply_revert_round_trip() {
        let mut lat = small_lattice(5);
        let before_occ: Vec<usize> = {
            let mut v = lat.occupied_sites().to_vec();
            v.sort_unstable();
            v
        };

        let site = lat.empty_sites()[1];
        let change = SiteChange::Insert { site, offset: Vector3::new(0.0, 0.2, 0.0) };
        lat.apply(&change);
        lat.revert(&change);

        let mut after_occ = lat.occupied_sites().to_vec();
        after_occ.sort_unstable();
        assert_eq!(before_occ, after_occ);
        assert_eq!(lat.n(), 5);
    }

    #[test]
    fn test_delete_revert_restores_displacement() {
        let mut lat = small_lattice(5);
        let site = lat.occupied_sites()[2];
        let offset = Vector3::new(0.05, -0.02, 0.01);
        // Particle sits displaced from its lattice site.
        lat.apply(&SiteChange::Delete { site, offset: Vector3::zeros() });
        lat.apply(&SiteChange::Insert { site, offset });

        let change = SiteChange::Delete { site, offset: lat.displacement(site) };
        lat.apply(&change);
        assert!(!lat.is_occupied(site));
        lat.revert(&change);
        assert!(lat.is_occupied(site));
        assert!((lat.displacement(site) - offset).norm() < 1e-12);
    }
}
