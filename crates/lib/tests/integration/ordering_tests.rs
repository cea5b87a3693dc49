use proptest::prelude::*;
use refit_lib::{ExecuteConfig, TransformationTree, Unit, execute_tree};

use super::common::{Journal, TestEnv};

/// Build a tree from a list of moves: 0 opens a group, 1 closes the current
/// one, anything else adds a leaf.
fn build(moves: &[u8], journal: &Journal) -> TransformationTree {
  let mut tree = TransformationTree::new("shape").unwrap();
  let mut stack = vec![tree.root()];
  for m in moves {
    let current = *stack.last().unwrap();
    match *m {
      0 => stack.push(tree.add_group(current, None).unwrap()),
      1 if stack.len() > 1 => {
        stack.pop();
      }
      _ => {
        let unit = Unit::operation(journal.returning(1)).relative("pom.xml").unwrap();
        tree.add(current, unit).unwrap();
      }
    }
  }
  tree
}

proptest! {
  #[test]
  fn orders_are_one_to_n_in_call_order(n in 1usize..60) {
    let mut tree = TransformationTree::new("t").unwrap();
    let root = tree.root();
    let journal = Journal::new();
    for _ in 0..n {
      tree.add(root, Unit::operation(journal.clone()).relative("a").unwrap()).unwrap();
    }

    let orders: Vec<_> = tree.children(root).iter().map(|c| tree.order_of(*c).unwrap()).collect();
    prop_assert_eq!(orders, (1..=n).collect::<Vec<_>>());
  }

  #[test]
  fn run_follows_tree_order_and_records_every_unit(moves in prop::collection::vec(0u8..4, 0..40)) {
    let journal = Journal::new();
    let tree = build(&moves, &journal);
    let env = TestEnv::new();

    let report = execute_tree(&tree, env.root(), &ExecuteConfig::default()).unwrap();

    let walked: Vec<_> = tree.walk().iter().map(|id| tree.name_of(*id).unwrap().to_string()).collect();
    prop_assert_eq!(&report.executed, &walked);
    for name in &report.executed {
      let outcome = report.store.get(name).unwrap();
      prop_assert_eq!(&outcome.unit, name);
    }
    prop_assert_eq!(report.store.len(), walked.len());

    let leaves: Vec<_> = walked
      .iter()
      .filter(|n| n.ends_with("Journal"))
      .cloned()
      .collect();
    prop_assert_eq!(journal.entries(), leaves);
  }
}
