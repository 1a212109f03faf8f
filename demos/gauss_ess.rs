//! Elliptical slice sampling of a Gaussian likelihood under a Gaussian prior.

use couple_mcmc::elliptical_slice::EllipticalSliceSampler;
use couple_mcmc::rng::RandomStream;
use couple_mcmc::stats::{effective_sample_size, mean_and_cov};
use couple_mcmc::target::GaussianLikelihood;

use ndarray::{arr1, arr2, s};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    const N_ITER: usize = 20_000;
    const BURNIN: usize = 1_000;
    const SEED: u64 = 42;

    let likelihood = GaussianLikelihood::new(arr1(&[2.0, -1.0]), arr2(&[[1.0, 0.5], [0.5, 2.0]]))?;
    let ess = EllipticalSliceSampler::new(likelihood)
        .with_prior(arr1(&[0.0, 0.0]), arr2(&[[4.0, 0.0], [0.0, 4.0]]))?;

    let mut rng = RandomStream::new(SEED);
    let chain = ess.sample_progress(arr1(&[0.0, 0.0]), N_ITER, &mut rng)?;

    let samples = chain.to_array2();
    let kept = samples.slice(s![BURNIN.., ..]);
    let (mean, cov) = mean_and_cov(kept)?;
    println!("posterior mean: {mean:.3}");
    println!("posterior covariance:\n{cov:.3}");

    for (d, column) in kept.columns().into_iter().enumerate() {
        let xs = column.to_vec();
        println!("dim_{d} effective sample size: {:.0}", effective_sample_size(&xs)?);
    }

    Ok(())
}
