use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::trace;

/// Largest value a scripted draw is clamped to, keeping draws in [0, 1).
const MAX_UNIT: f64 = 1.0 - f64::EPSILON;

#[derive(Debug, Clone)]
enum Stream {
    Seeded(StdRng),
    Scripted {
        values: Vec<f64>,
        index: usize,
        fallback: f64,
    },
}

/// The single random stream a battle draws from.
///
/// Every primitive consumes exactly one unit draw unless documented
/// otherwise, so the sequence of calls fully determines the battle.
#[derive(Debug, Clone)]
pub struct BattleRandom {
    stream: Stream,
    draws: u64,
}

impl BattleRandom {
    pub fn seeded(seed: u64) -> Self {
        Self {
            stream: Stream::Seeded(StdRng::seed_from_u64(seed)),
            draws: 0,
        }
    }

    /// Replays `values` in order, then returns `fallback` forever.
    pub fn scripted(values: Vec<f64>, fallback: f64) -> Self {
        Self {
            stream: Stream::Scripted {
                values,
                index: 0,
                fallback,
            },
            draws: 0,
        }
    }

    /// Every draw returns `value`.
    pub fn fixed(value: f64) -> Self {
        Self::scripted(Vec::new(), value)
    }

    /// Number of unit draws consumed so far.
    pub fn draws(&self) -> u64 {
        self.draws
    }

    pub fn next_unit(&mut self) -> f64 {
        let value = match &mut self.stream {
            Stream::Seeded(rng) => rng.random::<f64>(),
            Stream::Scripted {
                values,
                index,
                fallback,
            } => {
                let value = values.get(*index).copied().unwrap_or(*fallback);
                *index += 1;
                value.clamp(0.0, MAX_UNIT)
            }
        };
        self.draws += 1;
        trace!(draw = self.draws, value, "random draw");
        value
    }

    /// Uniform integer in `lo..=hi`. Returns `lo` without drawing when the range is empty.
    pub fn next_int(&mut self, lo: i64, hi: i64) -> i64 {
        if hi <= lo {
            return lo;
        }
        let span = (hi - lo + 1) as f64;
        let offset = (self.next_unit() * span).floor() as i64;
        (lo + offset).min(hi)
    }

    /// Roll against a 0..=100 percentage. Certain outcomes do not draw.
    pub fn percent_chance(&mut self, percent: f64) -> bool {
        if percent <= 0.0 {
            return false;
        }
        if percent >= 100.0 {
            return true;
        }
        self.next_unit() * 100.0 < percent
    }

    /// Roll against a 0..=1 probability. Certain outcomes do not draw.
    pub fn probability(&mut self, p: f64) -> bool {
        if p <= 0.0 {
            return false;
        }
        if p >= 1.0 {
            return true;
        }
        self.next_unit() < p
    }

    /// Multiplier in `[lower, 1]` where `lower = clamp(40 + luck, 40, 100) / 100`.
    pub fn stat_variance(&mut self, luck: i32) -> f64 {
        let lower = (40 + luck).clamp(40, 100) as f64 / 100.0;
        lower + self.next_unit() * (1.0 - lower)
    }

    /// Integer roll in `1..=100`.
    pub fn roll_percent(&mut self) -> i64 {
        self.next_int(1, 100)
    }

    /// Pick an index proportionally to `weights`.
    ///
    /// Returns `None` when no weight is positive. A single candidate is
    /// returned without drawing.
    pub fn pick_weighted(&mut self, weights: &[f64]) -> Option<usize> {
        let positive: Vec<usize> = weights
            .iter()
            .enumerate()
            .filter(|(_, w)| **w > 0.0)
            .map(|(i, _)| i)
            .collect();
        match positive.as_slice() {
            [] => None,
            [only] => Some(*only),
            _ => {
                let total: f64 = positive.iter().map(|&i| weights[i]).sum();
                let mut roll = self.next_unit() * total;
                for &i in &positive {
                    if roll < weights[i] {
                        return Some(i);
                    }
                    roll -= weights[i];
                }
                positive.last().copied()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_certain_chances_do_not_draw() {
        let mut rng = BattleRandom::fixed(0.5);
        assert!(rng.percent_chance(100.0));
        assert!(!rng.percent_chance(0.0));
        assert!(rng.probability(1.5));
        assert!(!rng.probability(-1.0));
        assert_eq!(rng.draws(), 0);

        assert!(rng.percent_chance(51.0));
        assert!(!rng.percent_chance(50.0));
        assert_eq!(rng.draws(), 2);
    }

    #[test]
    fn test_scripted_values_then_fallback() {
        let mut rng = BattleRandom::scripted(vec![0.1, 0.9], 0.25);
        assert_eq!(rng.next_unit(), 0.1);
        assert_eq!(rng.next_unit(), 0.9);
        assert_eq!(rng.next_unit(), 0.25);
        assert_eq!(rng.next_unit(), 0.25);
    }

    #[test]
    fn test_next_int_is_inclusive() {
        let mut low = BattleRandom::fixed(0.0);
        let mut high = BattleRandom::fixed(1.0);
        assert_eq!(low.next_int(1, 100), 1);
        assert_eq!(high.next_int(1, 100), 100);
        assert_eq!(high.next_int(7, 7), 7);
        assert_eq!(high.draws(), 1);
    }

    #[test]
    fn test_stat_variance_bounds() {
        let mut zero = BattleRandom::fixed(0.0);
        assert_eq!(zero.stat_variance(0), 0.4);
        assert_eq!(zero.stat_variance(60), 1.0);
        assert_eq!(zero.stat_variance(-20), 0.4);
        let mut half = BattleRandom::fixed(0.5);
        assert!((half.stat_variance(20) - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_weighted_pick() {
        let mut rng = BattleRandom::fixed(0.7);
        assert_eq!(rng.pick_weighted(&[3.0, 1.0]), Some(0));
        assert_eq!(rng.pick_weighted(&[1.0, 3.0]), Some(1));
        assert_eq!(rng.pick_weighted(&[0.0, 0.0]), None);
        let before = rng.draws();
        assert_eq!(rng.pick_weighted(&[0.0, 2.0]), Some(1));
        assert_eq!(rng.draws(), before);
    }

    #[test]
    fn test_seeded_streams_repeat() {
        let mut a = BattleRandom::seeded(42);
        let mut b = BattleRandom::seeded(42);
        for _ in 0..16 {
            assert_eq!(a.next_unit(), b.next_unit());
        }
    }
}
