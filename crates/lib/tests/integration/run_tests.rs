use refit_lib::execute::{CancelToken, Coordinator, ExecuteConfig, HaltCause, SkipReason};
use refit_lib::unit::UnitState;
use refit_lib::{TransformationTree, Unit, execute_tree};
use serde_json::json;
use tracing_test::traced_test;

use super::common::{FileExists, Journal, TestEnv, WriteFile};

#[test]
fn abort_in_group_stops_remaining_units() {
  let env = TestEnv::new();
  let journal = Journal::new();
  let mut tree = TransformationTree::new("upgrade").unwrap();
  let root = tree.root();
  let group = tree.add_group(root, Some("steps")).unwrap();

  let op = |j: Journal| Unit::operation(j).relative("pom.xml").unwrap();
  tree.add_named(group, op(journal.returning(true)), "c1").unwrap();
  tree
    .add_named(group, op(journal.failing()).abort_on_failure(true), "c2")
    .unwrap();
  tree.add_named(group, op(journal.clone()), "c3").unwrap();
  tree.add_named(root, op(journal.clone()), "after").unwrap();

  let report = execute_tree(&tree, env.root(), &ExecuteConfig::default()).unwrap();

  assert_eq!(journal.entries(), vec!["c1", "c2"]);
  assert_eq!(report.state_of("c1"), Some(UnitState::Executed));
  assert_eq!(report.state_of("c2"), Some(UnitState::Executed));
  assert_eq!(report.state_of("c3"), None);
  assert_eq!(report.state_of("after"), None);
  assert_eq!(
    report.store.get("c2").unwrap().error.as_ref().map(|e| e.message.as_str()),
    Some("c2 failed")
  );
  let halt = report.halted.unwrap();
  assert_eq!(halt.unit, "c2");
  assert_eq!(halt.cause, HaltCause::AbortOnFailure);
}

#[test]
fn conditions_drive_file_changes() {
  let env = TestEnv::new();
  env.write("pom.xml", "<project/>");

  let mut tree = TransformationTree::new("upgrade").unwrap();
  let root = tree.root();
  tree
    .add_named(root, Unit::condition(FileExists).relative("pom.xml").unwrap(), "has-pom")
    .unwrap();
  tree
    .add_named(root, Unit::condition(FileExists).relative("build.gradle").unwrap(), "has-gradle")
    .unwrap();
  tree
    .add(
      root,
      Unit::operation(WriteFile("maven"))
        .relative("tool.txt")
        .unwrap()
        .run_if("has-pom"),
    )
    .unwrap();
  tree
    .add(
      root,
      Unit::operation(WriteFile("gradle"))
        .relative("tool.txt")
        .unwrap()
        .run_if("has-gradle"),
    )
    .unwrap();

  let report = execute_tree(&tree, env.root(), &ExecuteConfig::default()).unwrap();

  assert!(report.is_success());
  assert_eq!(std::fs::read_to_string(env.root().join("tool.txt")).unwrap(), "maven");
  assert_eq!(
    report.skip_reason("upgrade-4-WriteFile"),
    Some(&SkipReason::ConditionFalse("has-gradle".into()))
  );
  assert_eq!(report.store.get_value("has-gradle").unwrap(), &json!(false));
}

#[test]
fn multiple_operations_touch_every_file() {
  let env = TestEnv::new();
  for module in ["api", "core", "web"] {
    env.write(&format!("{module}/pom.xml"), "<project/>");
  }

  let mut tree = TransformationTree::new("upgrade").unwrap();
  let root = tree.root();
  let name = tree
    .add_multiple(
      root,
      Unit::operation(WriteFile("rewritten")),
      ["api/pom.xml", "core/pom.xml", "web/pom.xml"],
    )
    .unwrap();

  let report = execute_tree(&tree, env.root(), &ExecuteConfig::default()).unwrap();

  assert_eq!(name, "upgrade-1-WriteFile");
  assert_eq!(tree.children(root).len(), 1);
  assert_eq!(
    report.store.get_value(&name).unwrap(),
    &json!([
      "upgrade-1-WriteFile-1",
      "upgrade-1-WriteFile-2",
      "upgrade-1-WriteFile-3"
    ])
  );
  for module in ["api", "core", "web"] {
    let content = std::fs::read_to_string(env.root().join(module).join("pom.xml")).unwrap();
    assert_eq!(content, "rewritten");
  }
}

#[test]
#[traced_test]
fn log_units_render_results_at_run_time() {
  let env = TestEnv::new();
  let journal = Journal::new();
  let mut tree = TransformationTree::new("upgrade").unwrap();
  let root = tree.root();
  tree
    .add_named(root, Unit::operation(journal.returning("3.9.6")).relative("pom.xml").unwrap(), "maven")
    .unwrap();
  tree
    .log_at_with(root, tracing::Level::WARN, "maven {} detected", ["maven"])
    .unwrap();

  let report = execute_tree(&tree, env.root(), &ExecuteConfig::default()).unwrap();

  assert_eq!(report.store.get_value("upgrade-2-Log").unwrap(), &json!("maven 3.9.6 detected"));
  assert!(logs_contain("maven 3.9.6 detected"));
}

#[test]
fn cancelled_token_stops_before_anything_runs() {
  let env = TestEnv::new();
  let journal = Journal::new();
  let mut tree = TransformationTree::new("upgrade").unwrap();
  let root = tree.root();
  tree
    .add(root, Unit::operation(journal.clone()).relative("pom.xml").unwrap())
    .unwrap();

  let token = CancelToken::new();
  token.cancel();
  let report = Coordinator::new(ExecuteConfig::default())
    .with_cancel_token(token)
    .run(&tree, env.root())
    .unwrap();

  assert!(journal.entries().is_empty());
  assert!(report.store.is_empty());
  assert_eq!(report.halted.map(|h| h.cause), Some(HaltCause::Cancelled));
}

#[test]
fn duplicate_names_across_groups_are_rejected_before_running() {
  let env = TestEnv::new();
  let journal = Journal::new();
  let mut tree = TransformationTree::new("upgrade").unwrap();
  let root = tree.root();
  let a = tree.add_group(root, Some("a")).unwrap();
  let b = tree.add_group(root, Some("b")).unwrap();
  let op = || Unit::operation(journal.clone()).relative("pom.xml").unwrap();
  tree.add_named(a, op(), "step").unwrap();
  tree.add_named(b, op(), "step").unwrap();

  let err = execute_tree(&tree, env.root(), &ExecuteConfig::default()).unwrap_err();

  assert!(err.to_string().contains("step"));
  assert!(journal.entries().is_empty());
}
