/*!
Append-only sample sequences returned by the drivers.

A [`Chain`] always holds its initial state at index 0; the state after `i` transitions sits
at index `i`. Only the driver loops of this crate can append to a chain, callers get a
read-only view.

```rust
use couple_mcmc::metropolis::MetropolisSampler;
use couple_mcmc::rng::RandomStream;

let mh = MetropolisSampler::new(|x: f64| x * x, 1.0).unwrap();
let chain = mh.sample(0.0, 10, &mut RandomStream::new(42)).unwrap();
assert_eq!(chain.len(), 11);
assert_eq!(chain[0], 0.0);
```
*/

use std::ops::Index;

use ndarray::{Array1, Array2};

/// An ordered, append-only sequence of states.
#[derive(Debug, Clone, PartialEq)]
pub struct Chain<S> {
    states: Vec<S>,
}

/// Two chains advanced jointly, one `(x, y)` pair per iteration.
pub type CoupledChain = Chain<(f64, f64)>;

impl<S> Chain<S> {
    pub(crate) fn with_capacity(init: S, n_iter: usize) -> Self {
        let mut states = Vec::with_capacity(n_iter + 1);
        states.push(init);
        Self { states }
    }

    pub(crate) fn push(&mut self, state: S) {
        self.states.push(state);
    }

    /// Number of states, including the initial one.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Always `false`: a chain holds at least its initial state.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Number of transitions applied.
    pub fn n_iter(&self) -> usize {
        self.states.len() - 1
    }

    pub fn get(&self, i: usize) -> Option<&S> {
        self.states.get(i)
    }

    pub fn first(&self) -> &S {
        &self.states[0]
    }

    pub fn last(&self) -> &S {
        &self.states[self.states.len() - 1]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, S> {
        self.states.iter()
    }

    pub fn as_slice(&self) -> &[S] {
        &self.states
    }

    pub fn into_vec(self) -> Vec<S> {
        self.states
    }
}

impl<S> Index<usize> for Chain<S> {
    type Output = S;

    fn index(&self, i: usize) -> &S {
        &self.states[i]
    }
}

impl<'a, S> IntoIterator for &'a Chain<S> {
    type Item = &'a S;
    type IntoIter = std::slice::Iter<'a, S>;

    fn into_iter(self) -> Self::IntoIter {
        self.states.iter()
    }
}

impl Chain<f64> {
    /// Fraction of transitions that moved the state.
    pub fn acceptance_rate(&self) -> f64 {
        moved_fraction(self.states.windows(2).map(|w| w[0] != w[1]))
    }
}

impl Chain<Array1<f64>> {
    /// Stacks the states into an `(n_iter + 1, d)` matrix.
    pub fn to_array2(&self) -> Array2<f64> {
        let d = self.states[0].len();
        Array2::from_shape_fn((self.states.len(), d), |(i, j)| self.states[i][j])
    }
}

impl CoupledChain {
    /// The first index from which both components agree for the rest of the chain.
    ///
    /// Returns `None` if the chains have not met by the last state.
    pub fn meeting_time(&self) -> Option<usize> {
        let unmet = self.states.iter().rposition(|(x, y)| x != y);
        match unmet {
            None => Some(0),
            Some(i) if i + 1 < self.states.len() => Some(i + 1),
            Some(_) => None,
        }
    }

    /// The trajectory of the first component.
    pub fn xs(&self) -> Vec<f64> {
        self.states.iter().map(|(x, _)| *x).collect()
    }

    /// The trajectory of the second component.
    pub fn ys(&self) -> Vec<f64> {
        self.states.iter().map(|(_, y)| *y).collect()
    }

    /// Acceptance rates of the two components.
    pub fn acceptance_rates(&self) -> (f64, f64) {
        let rx = moved_fraction(self.states.windows(2).map(|w| w[0].0 != w[1].0));
        let ry = moved_fraction(self.states.windows(2).map(|w| w[0].1 != w[1].1));
        (rx, ry)
    }
}

fn moved_fraction(moves: impl Iterator<Item = bool>) -> f64 {
    let (moved, total) = moves.fold((0usize, 0usize), |(m, t), b| (m + b as usize, t + 1));
    if total == 0 {
        0.0
    } else {
        moved as f64 / total as f64
    }
}
