//! Distribution of meeting times of maximally coupled Metropolis chains started far apart.

use couple_mcmc::coupling::{couple_gaussian_proposal, CoupledMetropolisSampler};
use couple_mcmc::rng::RandomStream;
use couple_mcmc::stats::{sample_mean, sample_variance};

use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    const N_PAIRS: u64 = 500;
    const MAX_ITER: usize = 10_000;
    const SEED: u64 = 7;

    // Overlap of N(0, 1) and N(1, 1) under the maximal coupling.
    let mut rng = RandomStream::new(SEED);
    let common = (0..10_000)
        .map(|_| couple_gaussian_proposal(0.0, 1.0, 1.0, 100_000, &mut rng))
        .filter(|p| matches!(p, Ok(p) if p.is_common()))
        .count();
    println!("proposal overlap: {:.3}", common as f64 / 10_000.0);

    // Standard normal target.
    let sampler = CoupledMetropolisSampler::new(|x: f64| 0.5 * x * x, 1.0)?;

    let mut taus = Vec::new();
    let mut unmet = 0usize;
    for i in 0..N_PAIRS {
        let mut pair_rng = rng.split(i);
        match sampler.meeting_time(-4.0, 4.0, MAX_ITER, &mut pair_rng)? {
            Some(tau) => taus.push(tau as f64),
            None => unmet += 1,
        }
    }

    if let (Some(mean), Some(var)) = (sample_mean(&taus), sample_variance(&taus)) {
        println!(
            "meeting time over {} pairs: mean {:.1}, sd {:.1}, max {}",
            taus.len(),
            mean,
            var.sqrt(),
            taus.iter().cloned().fold(0.0, f64::max)
        );
    }
    println!("pairs not met within {MAX_ITER} iterations: {unmet}");

    let chain = sampler.sample_progress(-4.0, 4.0, 200, &mut rng)?;
    match chain.meeting_time() {
        Some(tau) => println!("single run met at iteration {tau}"),
        None => println!("single run did not meet"),
    }

    Ok(())
}
