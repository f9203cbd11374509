//! Weighted response selection.
//!
//! Weights are relative; a candidate's pick probability is `weight / Σweight`.
//! Configured weights summing past 100 are scaled down proportionally.

use pokebot_core::types::ResponseCandidate;
use rand::Rng;

/// Upper bound for the sum of weights in one candidate list.
pub const MAX_TOTAL_WEIGHT: f64 = 100.0;

/// Slack for float noise so normalizing twice never rescales again.
const WEIGHT_EPSILON: f64 = 1e-9;

/// Sum of all candidate weights.
pub fn total_weight(candidates: &[ResponseCandidate]) -> f64 {
    candidates.iter().map(|c| c.weight).sum()
}

/// Clamp invalid weights to 0 and cap the total at [`MAX_TOTAL_WEIGHT`].
///
/// Pure scaling: relative ratios are unchanged.
pub fn normalize(candidates: &mut [ResponseCandidate]) {
    for c in candidates.iter_mut() {
        if !c.weight.is_finite() || c.weight < 0.0 {
            tracing::warn!("Response '{}' has invalid weight {}, using 0", c.content, c.weight);
            c.weight = 0.0;
        }
    }

    let total = total_weight(candidates);
    if total > MAX_TOTAL_WEIGHT + WEIGHT_EPSILON {
        let scale = MAX_TOTAL_WEIGHT / total;
        tracing::debug!("Response weights sum to {total}, scaling by {scale:.4}");
        for c in candidates.iter_mut() {
            c.weight *= scale;
        }
    }
}

/// Pick one candidate.
///
/// Draws `r` in `[0, total)` and returns the first candidate whose cumulative
/// weight exceeds it. Falls back to the last candidate when accumulation never
/// passes `r` (float error, or every weight is zero). `None` only for an empty list.
pub fn select<'a, R: Rng + ?Sized>(
    candidates: &'a [ResponseCandidate],
    rng: &mut R,
) -> Option<&'a ResponseCandidate> {
    let last = candidates.last()?;
    let total = total_weight(candidates);
    if total <= 0.0 {
        return Some(last);
    }

    let r = rng.gen_range(0.0..total);
    let mut cumulative = 0.0;
    for candidate in candidates {
        cumulative += candidate.weight;
        if cumulative > r {
            return Some(candidate);
        }
    }
    Some(last)
}

/// A normalized, immutable candidate list built once from configuration.
#[derive(Debug, Clone, Default)]
pub struct ResponseSet {
    candidates: Vec<ResponseCandidate>,
}

impl ResponseSet {
    pub fn new(mut candidates: Vec<ResponseCandidate>) -> Self {
        normalize(&mut candidates);
        Self { candidates }
    }

    pub fn candidates(&self) -> &[ResponseCandidate] {
        &self.candidates
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&ResponseCandidate> {
        select(&self.candidates, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn msgs(weights: &[f64]) -> Vec<ResponseCandidate> {
        weights
            .iter()
            .enumerate()
            .map(|(i, w)| ResponseCandidate::message(&format!("r{i}"), *w))
            .collect()
    }

    #[test]
    fn test_frequencies_converge() {
        let set = ResponseSet::new(msgs(&[10.0, 30.0, 60.0]));
        let mut rng = StdRng::seed_from_u64(7);
        let trials = 100_000;
        let mut counts = [0usize; 3];
        for _ in 0..trials {
            let picked = set.pick(&mut rng).unwrap();
            let idx: usize = picked.content[1..].parse().unwrap();
            counts[idx] += 1;
        }
        let expected = [0.1, 0.3, 0.6];
        for (count, want) in counts.iter().zip(expected) {
            let freq = *count as f64 / trials as f64;
            assert!((freq - want).abs() < 0.01, "freq {freq} vs {want}");
        }
    }

    #[test]
    fn test_normalize_scales_down() {
        let mut c = msgs(&[100.0, 100.0, 200.0]);
        normalize(&mut c);
        assert!((total_weight(&c) - 100.0).abs() < 1e-9);
        assert!((c[0].weight - 25.0).abs() < 1e-9);
        assert!((c[2].weight - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_normalize_idempotent() {
        let mut c = msgs(&[20.0, 30.0]);
        normalize(&mut c);
        assert_eq!(c, msgs(&[20.0, 30.0]));

        let mut scaled = msgs(&[70.0, 70.0, 70.0]);
        normalize(&mut scaled);
        let once = scaled.clone();
        normalize(&mut scaled);
        assert_eq!(scaled, once);
    }

    #[test]
    fn test_normalize_clamps_negative() {
        let mut c = msgs(&[-5.0, f64::NAN, 10.0]);
        normalize(&mut c);
        assert_eq!(c[0].weight, 0.0);
        assert_eq!(c[1].weight, 0.0);
        assert_eq!(c[2].weight, 10.0);
    }

    #[test]
    fn test_zero_weight_never_picked() {
        let set = ResponseSet::new(msgs(&[0.0, 5.0]));
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..1000 {
            assert_eq!(set.pick(&mut rng).unwrap().content, "r1");
        }
    }

    #[test]
    fn test_all_zero_falls_back_to_last() {
        let set = ResponseSet::new(msgs(&[0.0, 0.0, 0.0]));
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(set.pick(&mut rng).unwrap().content, "r2");
    }

    #[test]
    fn test_empty_selects_nothing() {
        let mut rng = StdRng::seed_from_u64(3);
        assert!(select(&[], &mut rng).is_none());
        assert!(ResponseSet::new(vec![]).is_empty());
    }
}
