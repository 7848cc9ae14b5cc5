//! Random endpoint selection and exclusion.

use crate::config::Endpoint;
use rand::seq::SliceRandom;
use rand::Rng;

/// Pick one candidate uniformly at random.
///
/// Returns `None` once the candidate set is exhausted.
pub fn pick_random<'a, R: Rng + ?Sized>(
    candidates: &'a [Endpoint],
    rng: &mut R,
) -> Option<&'a Endpoint> {
    candidates.choose(rng)
}

/// Remove the first candidate equal to `endpoint`, keeping the order of the rest.
///
/// Excluding an endpoint that is not a candidate leaves the set unchanged.
pub fn exclude(mut candidates: Vec<Endpoint>, endpoint: &Endpoint) -> Vec<Endpoint> {
    if let Some(position) = candidates.iter().position(|c| c == endpoint) {
        candidates.remove(position);
    }
    candidates
}
