use crate::cluster::{ClusterEvent, Member};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use MachineState::*;

#[derive(
  Serialize,
  Deserialize,
  Hash,
  PartialEq,
  Eq,
  Ord,
  PartialOrd,
  Clone,
  Copy,
  Debug,
)]
pub enum MachineState {
  Up,
  Down,
}

fn event(member: &Arc<Member>, state: MachineState) -> ClusterEvent {
  match state {
    Up => ClusterEvent::MemberUp(member.clone()),
    Down => ClusterEvent::MemberRemoved(member.clone()),
  }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Gossip {
  pub states: BTreeMap<Arc<Member>, MachineState>,
}
impl Gossip {
  /// Sets `member` to `state`, unless the table already holds a later state for it. Returns
  /// the event describing the change, if there was one.
  pub fn mark(
    &mut self,
    member: Arc<Member>,
    state: MachineState,
  ) -> Option<ClusterEvent> {
    let newer = match self.states.get(&member) {
      Some(current) => state > *current,
      None => true,
    };
    if newer {
      let e = event(&member, state);
      self.states.insert(member, state);
      Some(e)
    } else {
      None
    }
  }

  /// Folds another table into this one and returns the changes, ordered by member.
  pub fn merge(&mut self, other: Gossip) -> Vec<ClusterEvent> {
    other
      .states
      .into_iter()
      .filter_map(|(member, state)| self.mark(member, state))
      .collect()
  }

  pub fn up(&self) -> impl Iterator<Item = &Arc<Member>> {
    self
      .states
      .iter()
      .filter(|(_, s)| **s == Up)
      .map(|(m, _)| m)
  }

  pub fn is_up(&self, member: &Member) -> bool {
    self.states.get(member) == Some(&Up)
  }
}

#[cfg(test)]
use crate::core::Address;
#[cfg(test)]
use maplit::btreemap;

#[test]
fn test_gossip_merge() {
  let members = (2550u16..2559u16)
    .map(|x| {
      Arc::new(Member {
        address: Address::new("scaleout", "fleet", "localhost", x),
        id: x as u64,
      })
    })
    .collect::<Vec<_>>();
  let mut local = Gossip {
    states: btreemap! {
      members[0].clone() => Up,
      members[2].clone() => Up,
      members[4].clone() => Up,
      members[5].clone() => Up,
      members[6].clone() => Down,
      members[7].clone() => Up,
    },
  };
  let recvd = Gossip {
    states: btreemap! {
      members[1].clone() => Up,
      members[2].clone() => Up,
      members[3].clone() => Up,
      members[5].clone() => Up,
      members[6].clone() => Up,
      members[7].clone() => Down,
      members[8].clone() => Up,
    },
  };
  let changes = local.merge(recvd);
  let expected_local = btreemap! {
    members[0].clone() => Up,
    members[1].clone() => Up,
    members[2].clone() => Up,
    members[3].clone() => Up,
    members[4].clone() => Up,
    members[5].clone() => Up,
    members[6].clone() => Down,
    members[7].clone() => Down,
    members[8].clone() => Up,
  };
  assert_eq!(local.states, expected_local);
  let expected_changes = vec![
    ClusterEvent::MemberUp(members[1].clone()),
    ClusterEvent::MemberUp(members[3].clone()),
    ClusterEvent::MemberRemoved(members[7].clone()),
    ClusterEvent::MemberUp(members[8].clone()),
  ];
  assert_eq!(changes, expected_changes);
  assert_eq!(local.up().count(), 7);
}

#[test]
fn test_gossip_rejoin_is_new_member() {
  let addr = Address::new("scaleout", "fleet", "localhost", 2552);
  let old = Arc::new(Member {
    address: addr.clone(),
    id: 1,
  });
  let new = Arc::new(Member {
    address: addr,
    id: 2,
  });
  let mut g = Gossip::default();
  assert!(g.mark(old.clone(), Up).is_some());
  assert!(g.mark(old.clone(), Down).is_some());
  assert_eq!(g.mark(old.clone(), Up), None);
  assert_eq!(g.mark(new.clone(), Up), Some(ClusterEvent::MemberUp(new.clone())));
  assert!(!g.is_up(&old));
  assert!(g.is_up(&new));
}
