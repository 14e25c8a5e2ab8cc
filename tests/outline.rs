use codespan_reporting::term::termcolor::NoColor;
use deforder::comparator::SourceOrder;
use deforder::concrete::{Definition, SourceId};
use deforder::dependency::DependencyCollector;
use deforder::driver::{Typechecker, typecheck};
use deforder::format::report_cycle_errors;
use deforder::listener::{EventLog, NoDependencies, OrderEvent, ResolutionState};
use deforder::outline::Outline;
use deforder::sources::FileSources;
use deforder::{CycleError, CycleKind, Ordering, OrderingEnv};
use std::path::Path;

#[derive(Default)]
struct Recorder {
    calls: Vec<String>,
}

impl Typechecker for Recorder {
    fn check_header(&mut self, def: &Definition) {
        self.calls.push(format!("header {}", def.name));
    }

    fn check_unit(&mut self, def: &Definition, recursive: bool) {
        let prefix = if recursive { "rec" } else { "unit" };
        self.calls.push(format!("{} {}", prefix, def.name));
    }

    fn check_bodies(&mut self, defs: &[&Definition]) {
        let names: Vec<&str> = defs.iter().map(|def| def.name.as_str()).collect();
        self.calls.push(format!("bodies {}", names.join(" ")));
    }

    fn finish_group(&mut self, defs: &[&Definition]) {
        self.calls.push(format!("finish {}", defs.len()));
    }
}

fn load_fixture(name: &str) -> Outline {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("outlines")
        .join(name);
    Outline::load(&path, SourceId(1)).unwrap()
}

fn check(
    outline: &Outline,
    dependencies: &mut DependencyCollector,
) -> (Recorder, Vec<CycleError>) {
    let order = SourceOrder::new(&outline.table);
    let env = OrderingEnv::from_table(&outline.table)
        .with_comparator(&order)
        .with_config(outline.config);
    typecheck(env, &outline.groups(), Recorder::default(), dependencies).unwrap()
}

#[test]
fn test_arith_outline_order() {
    let outline = load_fixture("arith.toml");
    let mut dependencies = DependencyCollector::new();
    let (recorder, errors) = check(&outline, &mut dependencies);

    assert!(errors.is_empty());
    assert_eq!(
        recorder.calls,
        vec![
            "rec Nat",
            "unit Bool",
            "rec +",
            "header isOdd",
            "header isEven",
            "bodies isEven isOdd",
            "finish 2",
            "unit Monoid",
            "unit NatMonoid",
            "unit mconcat",
        ]
    );
    for id in outline.table.ids() {
        let def = outline.table.get(id).unwrap();
        // Constructors and fields are checked with their owner.
        if def.typecheckable() == id {
            assert!(outline.table.is_typechecked(id), "{} unchecked", def.name);
        }
    }

    let is_even = outline.lookup("Parity.isEven").unwrap();
    let is_odd = outline.lookup("Parity.isOdd").unwrap();
    assert_eq!(outline.table.recursive_siblings(is_even), vec![is_odd, is_even]);
}

#[test]
fn test_arith_outline_invalidation() {
    let outline = load_fixture("arith.toml");
    let mut dependencies = DependencyCollector::new();
    check(&outline, &mut dependencies);

    let nat = outline.lookup("Prelude.Nat").unwrap();
    let plus = outline.lookup("Prelude.+").unwrap();
    let bool_ = outline.lookup("Prelude.Bool").unwrap();
    let monoid = outline.lookup("Algebra.Monoid").unwrap();
    let nat_monoid = outline.lookup("Algebra.NatMonoid").unwrap();
    let mconcat = outline.lookup("Algebra.mconcat").unwrap();
    let is_even = outline.lookup("Parity.isEven").unwrap();
    let is_odd = outline.lookup("Parity.isOdd").unwrap();

    // `mconcat` may pick `NatMonoid` through instance search.
    assert_eq!(dependencies.dependencies_of(mconcat), vec![nat, monoid, nat_monoid]);
    assert_eq!(dependencies.recursive_groups(), vec![vec![is_even, is_odd]]);

    let invalidated = dependencies.update(nat, &outline.table);
    assert_eq!(
        invalidated,
        vec![nat, plus, is_even, is_odd, nat_monoid, mconcat]
    );
    assert!(outline.table.is_typechecked(bool_));
    assert!(outline.table.is_typechecked(monoid));

    let (recorder, errors) = check(&outline, &mut dependencies);
    assert!(errors.is_empty());
    assert_eq!(
        recorder.calls,
        vec![
            "rec Nat",
            "rec +",
            "header isOdd",
            "header isEven",
            "bodies isEven isOdd",
            "finish 2",
            "unit NatMonoid",
            "unit mconcat",
        ]
    );
}

#[test]
fn test_signature_cycle_is_rendered() {
    let text = r#"
[[module]]
name = "Main"

[[module.definition]]
name = "A"
signature = ["B"]

[[module.definition]]
name = "B"
signature = ["A"]
"#;
    let outline = Outline::parse(text, SourceId(1)).unwrap();
    let (recorder, errors) = check(&outline, &mut DependencyCollector::new());

    let a = outline.lookup("Main.A").unwrap();
    let b = outline.lookup("Main.B").unwrap();
    assert_eq!(errors, vec![CycleError::new(&[a, b], false)]);
    assert!(recorder.calls.is_empty());

    let mut files = FileSources::new();
    files.add(outline.source, "cycle.toml", text);
    let mut writer = NoColor::new(Vec::new());
    report_cycle_errors(&mut writer, &files, &errors, &outline.table).unwrap();
    let output = String::from_utf8(writer.into_inner()).unwrap();
    assert!(output.contains("definition cycle between `A`, `B`"));
    assert!(output.contains("cycle.toml:6:"));
}

#[test]
fn test_use_helpers_keep_cycles_together() {
    let text = r#"
[[module]]
name = "Main"

[[module.definition]]
name = "Path"
kind = "data"
uses = ["Path-level"]

[[module.definition]]
name = "Path-level"
kind = "level"
parent = "Path"
body = ["helper"]

[[module.definition]]
name = "helper"
body = ["Path"]
"#;
    let outline = Outline::parse(text, SourceId(1)).unwrap();
    let (recorder, errors) = check(&outline, &mut DependencyCollector::new());

    let path = outline.lookup("Main.Path").unwrap();
    let helper = outline.lookup("Main.helper").unwrap();
    assert_eq!(errors, vec![CycleError::new(&[helper, path], false)]);
    assert!(recorder.calls.is_empty());
}

#[test]
fn test_instance_cycle_outline() {
    let text = r#"
[[module]]
name = "Main"

[[module.definition]]
name = "Show"
kind = "class"

[[module.definition]]
name = "showA"
kind = "instance"
signature = ["Show"]
instances = ["showB"]

[[module.definition]]
name = "showB"
kind = "instance"
signature = ["Show"]
instances = ["showA"]
"#;
    let outline = Outline::parse(text, SourceId(1)).unwrap();
    let (recorder, errors) = check(&outline, &mut DependencyCollector::new());

    let show_a = outline.lookup("Main.showA").unwrap();
    let show_b = outline.lookup("Main.showB").unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, CycleKind::Instances);
    assert_eq!(errors[0].members, vec![show_a, show_b]);
    assert_eq!(
        recorder.calls,
        vec!["unit Show", "unit showB", "unit showA"]
    );
}

#[test]
fn test_event_log_over_outline() {
    let outline = load_fixture("arith.toml");
    let order = SourceOrder::new(&outline.table);
    let env = OrderingEnv::from_table(&outline.table).with_comparator(&order);
    let is_odd = outline.lookup("Parity.isOdd").unwrap();
    let is_even = outline.lookup("Parity.isEven").unwrap();
    let nat = outline.lookup("Prelude.Nat").unwrap();
    let bool_ = outline.lookup("Prelude.Bool").unwrap();

    let mut log = EventLog::new();
    let mut dependencies = NoDependencies;
    {
        let mut ordering = Ordering::new(env, &mut log, &mut dependencies);
        ordering.order(is_odd).unwrap();
    }
    assert_eq!(
        log.events,
        vec![
            OrderEvent::Unit {
                def: nat,
                with_loops: true
            },
            OrderEvent::Unit {
                def: bool_,
                with_loops: false
            },
            OrderEvent::PreBodies(vec![is_even, is_odd]),
            OrderEvent::Header(is_even),
            OrderEvent::Header(is_odd),
            OrderEvent::Bodies(vec![is_even, is_odd]),
        ]
    );
}
