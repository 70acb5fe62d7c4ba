//! Overlap-estimator antisymmetry demo: relabeling the two macrostates of
//! a pair negates the free-energy difference.

use vacmc::overlap::{Direction, OverlapEstimator};

use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use rand_pcg::Pcg64;

fn main() {
    println!("=== Overlap Antisymmetry Demo ===\n");

    let mut rng = Pcg64::seed_from_u64(42);
    let n_samples = 4_000;
    let true_delta = 2.0;
    let width = 1.5;

    // Insertion deltas sampled at N scatter above the free-energy
    // difference, deletion deltas at N+1 scatter below it.
    let fwd = Normal::new(true_delta + 0.8, width).unwrap();
    let rev = Normal::new(true_delta - 0.8, width).unwrap();

    let mut original = OverlapEstimator::new(1.0, 50, 51, 51, 100);
    let mut relabeled = OverlapEstimator::new(1.0, 50, 51, 51, 100);

    for _ in 0..n_samples {
        let u_f: f64 = fwd.sample(&mut rng);
        let u_r: f64 = rev.sample(&mut rng);
        original.record(50, Direction::Forward, u_f);
        original.record(50, Direction::Reverse, u_r);
        // Swapping the state labels flips every delta's sign and its
        // direction.
        relabeled.record(50, Direction::Forward, -u_r);
        relabeled.record(50, Direction::Reverse, -u_f);
    }

    let a = original.estimate(50).value().expect("both directions sampled");
    let b = relabeled.estimate(50).value().expect("both directions sampled");

    println!("forward-label estimate:  dA = {:+.5} ± {:.5} ({} iterations)", a.delta_a, a.stderr, a.iterations);
    println!("reverse-label estimate:  dA = {:+.5} ± {:.5} ({} iterations)", b.delta_a, b.stderr, b.iterations);
    println!("sum (should vanish):     {:+.3e}", a.delta_a + b.delta_a);

    let combined = (a.stderr.powi(2) + b.stderr.powi(2)).sqrt();
    if (a.delta_a + b.delta_a).abs() < 4.0 * combined.max(1e-12) {
        println!("\n✓ Antisymmetry holds within statistical error");
    } else {
        println!("\n✗ Antisymmetry violated beyond statistical error!");
    }
}
