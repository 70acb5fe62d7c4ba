// stats.rs - Online accumulators shared by the macrostate table and the drivers

/// Welford online mean / variance.
#[derive(Debug, Default, Clone)]
pub struct OnlineStats {
    n:    u64,
    mean: f64,
    m2:   f64,
}

impl OnlineStats {
    pub fn push(&mut self, x: f64) {
        self.n += 1;
        let delta  = x - self.mean;
        self.mean += delta / self.n as f64;
        let delta2 = x - self.mean;
        self.m2   += delta * delta2;
    }

    pub fn count(&self) -> u64 { self.n }
    pub fn mean(&self)  -> f64 { self.mean }
    pub fn var(&self)   -> f64 { if self.n > 1 { self.m2 / (self.n - 1) as f64 } else { 0.0 } }
    pub fn std(&self)   -> f64 { self.var().sqrt() }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Block-averaged accumulator.
///
/// Raw samples from a Markov chain are correlated; the variance of block
/// means over long enough blocks gives an honest standard error. The mean
/// is taken over every raw sample, the error only over completed blocks.
#[derive(Debug, Clone)]
pub struct BlockStats {
    block_len:   u64,
    current_sum: f64,
    current_n:   u64,
    blocks:      OnlineStats,
    all:         OnlineStats,
}

impl BlockStats {
    pub fn new(block_len: u64) -> Self {
        Self {
            block_len: block_len.max(1),
            current_sum: 0.0,
            current_n: 0,
            blocks: OnlineStats::default(),
            all: OnlineStats::default(),
        }
    }

    pub fn push(&mut self, x: f64) {
        self.all.push(x);
        self.current_sum += x;
        self.current_n += 1;
        if self.current_n == self.block_len {
            self.blocks.push(self.current_sum / self.block_len as f64);
            self.current_sum = 0.0;
            self.current_n = 0;
        }
    }

    pub fn count(&self) -> u64 { self.all.count() }

    pub fn mean(&self) -> Option<f64> {
        if self.all.count() > 0 { Some(self.all.mean()) } else { None }
    }

    /// Standard error of the mean from completed block means.
    /// `None` until at least two blocks have closed.
    pub fn error(&self) -> Option<f64> {
        if self.blocks.count() >= 2 {
            Some(self.blocks.std() / (self.blocks.count() as f64).sqrt())
        } else {
            None
        }
    }

    pub fn reset(&mut self) {
        self.current_sum = 0.0;
        self.current_n = 0;
        self.blocks.reset();
        self.all.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_welford_matches_direct() {
        let data = [1.0, 2.0, 4.0, 8.0, 16.0];
        let mut s = OnlineStats::default();
        for &x in &data {
            s.push(x);
        }
        let n = data.len() as f64;
        let mean = data.iter().sum::<f64>() / n;
        let var = data.iter().map(|&x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
        assert!((s.mean() - mean).abs() < 1e-12);
        assert!((s.var() - var).abs() < 1e-12);
    }

    #[test]
    fn test_block_error_needs_two_blocks() {
        let mut b = BlockStats::new(4);
        for i in 0..7 {
            b.push(i as f64);
        }
        // One closed block only.
        assert!(b.error().is_none());
        b.push(7.0);
        assert!(b.error().is_some());
        assert_eq!(b.count(), 8);
    }

    #[test]
    fn test_block_mean_uses_all_samples() {
        let mut b = BlockStats::new(10);
        b.push(1.0);
        b.push(3.0);
        assert!((b.mean().unwrap() - 2.0).abs() < 1e-12);
    }
}
