use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How a [`Mediator`](crate::pubsub::Mediator) should misbehave. Messages are never dropped;
/// at-least-once delivery still holds.
#[derive(Default, Serialize, Deserialize, Clone, Copy, Debug)]
pub struct FailureConfig {
  /// Probability that a delivery is made twice. Clamped to `[0, 1]`.
  pub duplicate_prob: f64,
  /// If set, each delivery is held back for a uniformly random time in this range, which also
  /// reorders deliveries.
  pub delay: Option<(Duration, Duration)>,
}
impl FailureConfig {
  pub fn copies<R: Rng>(&self, rng: &mut R) -> usize {
    let p = self.duplicate_prob.max(0.0).min(1.0);
    if p > 0.0 && rng.gen_bool(p) {
      2
    } else {
      1
    }
  }

  pub fn delay<R: Rng>(&self, rng: &mut R) -> Option<Duration> {
    self.delay.map(|(lo, hi)| {
      if hi > lo {
        rng.gen_range(lo..=hi)
      } else {
        lo
      }
    })
  }
}

#[test]
fn test_failure_config_bounds() {
  let mut rng = rand::thread_rng();
  let reliable = FailureConfig::default();
  let always = FailureConfig {
    duplicate_prob: 7.0,
    delay: Some((Duration::from_millis(5), Duration::from_millis(10))),
  };
  for _ in 0..100 {
    assert_eq!(reliable.copies(&mut rng), 1);
    assert_eq!(reliable.delay(&mut rng), None);
    assert_eq!(always.copies(&mut rng), 2);
    let d = always.delay(&mut rng).unwrap();
    assert!(d >= Duration::from_millis(5) && d <= Duration::from_millis(10));
  }
}
