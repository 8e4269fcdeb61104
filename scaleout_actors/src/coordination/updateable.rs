use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// A per-round result the coordination core can combine without understanding it.
///
/// `merge` must be associative and commutative, with `initial()` as its identity: the master
/// folds results in whatever order they arrived, and the outcome may not depend on it.
pub trait Updateable: Clone + Debug + Send + Sync + 'static {
  /// The value of no work at all.
  fn initial() -> Self;

  fn merge(self, other: Self) -> Self;

  /// Whether this value still carries no iteration's worth of work.
  fn is_empty(&self) -> bool;
}

/// A running integer sum, and how many contributions went into it.
#[derive(
  Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub struct Total {
  pub value: i64,
  pub contributions: u64,
}
impl Total {
  pub fn of(value: i64) -> Total {
    Total {
      value: value,
      contributions: 1,
    }
  }
}
impl Updateable for Total {
  fn initial() -> Self {
    Total::default()
  }

  fn merge(self, other: Self) -> Self {
    Total {
      value: self.value.wrapping_add(other.value),
      contributions: self.contributions.wrapping_add(other.contributions),
    }
  }

  fn is_empty(&self) -> bool {
    self.contributions == 0
  }
}

/// Integer sums kept per key, e.g. per-parameter gradient counts.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tally<K: Ord + Clone> {
  pub counts: im::OrdMap<K, i64>,
}
impl<K: Ord + Clone> Tally<K> {
  pub fn single(key: K, count: i64) -> Tally<K> {
    Tally {
      counts: im::OrdMap::unit(key, count),
    }
  }
}
impl<K> Updateable for Tally<K>
where
  K: Ord + Clone + Debug + Send + Sync + 'static,
{
  fn initial() -> Self {
    Tally {
      counts: im::OrdMap::new(),
    }
  }

  fn merge(self, other: Self) -> Self {
    Tally {
      counts: self.counts.union_with(other.counts, i64::wrapping_add),
    }
  }

  fn is_empty(&self) -> bool {
    self.counts.is_empty()
  }
}

#[cfg(test)]
use itertools::Itertools;

#[cfg(test)]
fn fold_all<E: Updateable>(items: Vec<E>) -> E {
  items.into_iter().fold(E::initial(), E::merge)
}

#[test]
fn test_total_order_independent() {
  let parts = vec![Total::of(5), Total::of(-3), Total::of(i64::MAX), Total::of(9)];
  let expected = fold_all(parts.clone());
  assert_eq!(expected.contributions, 4);
  for perm in parts.iter().cloned().permutations(parts.len()) {
    assert_eq!(fold_all(perm), expected);
  }
  let left = Total::of(1).merge(Total::of(2)).merge(Total::of(3));
  let right = Total::of(1).merge(Total::of(2).merge(Total::of(3)));
  assert_eq!(left, right);
}

#[test]
fn test_tally_order_independent() {
  let parts = vec![
    Tally::single("w", 2),
    Tally::single("b", 1),
    Tally::single("w", 7),
    Tally::single("bias", -4),
  ];
  let expected = fold_all(parts.clone());
  assert_eq!(expected.counts.get("w"), Some(&9));
  for perm in parts.iter().cloned().permutations(parts.len()) {
    assert_eq!(fold_all(perm), expected);
  }
}

#[test]
fn test_initial_is_identity() {
  assert!(Total::initial().is_empty());
  assert_eq!(Total::initial().merge(Total::of(5)), Total::of(5));
  assert!(!Total::of(0).is_empty());
  let t = Tally::single(3u8, 1);
  assert_eq!(Tally::initial().merge(t.clone()), t);
}
