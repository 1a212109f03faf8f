//! Random-walk Metropolis on a 1D Gaussian, with diagnostics.

use couple_mcmc::metropolis::MetropolisSampler;
use couple_mcmc::rng::RandomStream;
use couple_mcmc::stats::{effective_sample_size, rhat, summarize};
use couple_mcmc::target::GaussianEnergy;

use log::info;
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    const N_ITER: usize = 50_000;
    const BURNIN: usize = 5_000;
    const SEED: u64 = 42;

    // N(1, 2)
    let target = GaussianEnergy::new(1.0, 2.0)?;
    let mh = MetropolisSampler::new(target, 2.4)?;

    let mut rng = RandomStream::new(SEED);
    let chain = mh.sample_progress(-5.0, N_ITER, &mut rng)?;
    let second = mh.sample(8.0, N_ITER, &mut rng.split(1))?;

    let summary = summarize(&chain, BURNIN)?;
    println!(
        "mean {:.3}, variance {:.3}, acceptance rate {:.3}",
        summary.mean, summary.variance, summary.acceptance_rate
    );

    let kept = &chain.as_slice()[BURNIN..];
    println!("effective sample size: {:.0}", effective_sample_size(kept)?);
    println!(
        "rhat over two chains: {:.4}",
        rhat(&[kept, &second.as_slice()[BURNIN..]])?
    );

    info!("seed {SEED}, {} states per chain", chain.len());

    Ok(())
}
