//! End-to-end evaluation through the project service: file-backed sources
//! and targets, reloads, replaced connections and dependency loops.

use std::fs;
use std::path::PathBuf;

use treeflow::builtin::{INTEGER_TEXT_FORMAT, SEQUENCE_PROCESSOR, SUM_PROCESSOR};
use treeflow::model::modifier::ModifierOutcome;
use treeflow::model::node::FailureKind;
use treeflow::{ModifierData, NodeData, NodeId, NodeKind, Path, ProjectService, create_plugin_manager};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn p(s: &str) -> Path {
    s.parse().unwrap()
}

fn sequence_output(service: &ProjectService, id: NodeId) -> Vec<i64> {
    service
        .get_node(id)
        .unwrap()
        .output()
        .unwrap()
        .as_array()
        .unwrap()
        .elements()
        .iter()
        .map(|e| e.as_integer().unwrap())
        .collect()
}

struct Chain {
    service: ProjectService,
    source: NodeId,
    processor: NodeId,
    target: NodeId,
    input: PathBuf,
    output: PathBuf,
    _dir: tempfile::TempDir,
}

/// source(file) -> sequence -> target(file), with the target reading `[0]`.
fn chain(start: i64) -> Chain {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.txt");
    let output = dir.path().join("out.txt");
    fs::write(&input, format!("{}\n", start)).unwrap();

    let mut service = ProjectService::new(create_plugin_manager());
    let plugins = service.get_plugin_manager();
    let text = plugins.format_id(INTEGER_TEXT_FORMAT).unwrap();
    let sequence = plugins.processor_id(SEQUENCE_PROCESSOR).unwrap();

    let source = service
        .add_node(NodeData::new(NodeKind::Source, text).with_location(&input))
        .unwrap();
    let processor = service
        .add_node(NodeData::new(NodeKind::Processor, sequence))
        .unwrap();
    let target = service
        .add_node(NodeData::new(NodeKind::Target, text).with_location(&output))
        .unwrap();
    service
        .add_modifier(processor, ModifierData::connection(p("value"), source, Path::root()))
        .unwrap();
    service
        .add_modifier(target, ModifierData::connection(Path::root(), processor, p("[0]")))
        .unwrap();

    Chain {
        service,
        source,
        processor,
        target,
        input,
        output,
        _dir: dir,
    }
}

#[test]
fn test_source_to_target_chain() {
    let mut c = chain(3);
    let report = c.service.process();
    assert_eq!(report.order, [c.source, c.processor, c.target]);
    assert!(report.failed.is_empty());
    assert_eq!(sequence_output(&c.service, c.processor), [3, 4]);

    let target = c.service.get_node(c.target).unwrap();
    assert_eq!(target.input().as_integer(), Some(3));
    assert!(target.output().is_none());
    assert!(target.is_dirty());

    c.service.try_to_save_target(c.target).unwrap();
    assert_eq!(fs::read_to_string(&c.output).unwrap(), "3\n");
    assert!(!c.service.get_node(c.target).unwrap().is_dirty());
}

#[test]
fn test_reload_propagates_new_contents() {
    let mut c = chain(3);
    c.service.process();

    fs::write(&c.input, "4\n").unwrap();
    c.service.try_to_reload_source(c.source).unwrap();
    c.service.process();
    assert_eq!(sequence_output(&c.service, c.processor), [4, 5]);
    assert_eq!(
        c.service.get_node(c.target).unwrap().input().as_integer(),
        Some(4)
    );
}

#[test]
fn test_replacing_a_connection_with_a_constant() {
    let mut c = chain(3);
    c.service.process();

    c.service
        .add_modifier(c.target, ModifierData::constant(Path::root(), 9))
        .unwrap();
    let report = c.service.process();
    assert!(report.failed.is_empty());
    assert_eq!(
        c.service.get_node(c.target).unwrap().input().as_integer(),
        Some(9)
    );
    assert_eq!(sequence_output(&c.service, c.processor), [3, 4]);
    assert!(c.service.get_node(c.target).unwrap().connections().next().is_none());

    c.service.undo().unwrap();
    c.service.process();
    assert_eq!(
        c.service.get_node(c.target).unwrap().input().as_integer(),
        Some(3)
    );
}

#[test]
fn test_unreadable_source_fails_and_recovers() {
    let mut c = chain(3);
    c.service.process();

    fs::write(&c.input, "three\n").unwrap();
    assert!(c.service.try_to_reload_source(c.source).is_err());
    let report = c.service.process();
    assert_eq!(report.failed, [c.source]);
    let source = c.service.get_node(c.source).unwrap();
    assert_eq!(source.failure().unwrap().kind, FailureKind::Parse);
    assert!(source.output().is_none());

    let modifier = c
        .service
        .get_node(c.processor)
        .unwrap()
        .modifier(&p("value"))
        .unwrap();
    assert_eq!(modifier.outcome(), ModifierOutcome::SourceMissing);
    assert_eq!(sequence_output(&c.service, c.processor), [0, 1]);

    fs::write(&c.input, "7\n").unwrap();
    c.service.try_to_reload_source(c.source).unwrap();
    let report = c.service.process();
    assert!(report.failed.is_empty());
    assert_eq!(sequence_output(&c.service, c.processor), [7, 8]);
}

#[test]
fn test_reload_rejects_non_sources() {
    let mut c = chain(1);
    assert!(c.service.try_to_reload_source(c.processor).is_err());
    assert!(c.service.try_to_save_target(c.source).is_err());
}

#[test]
fn test_loop_is_contained_and_repairable() {
    init_logger();
    let mut service = ProjectService::new(create_plugin_manager());
    let sequence = service
        .get_plugin_manager()
        .processor_id(SEQUENCE_PROCESSOR)
        .unwrap();
    let add = |service: &mut ProjectService| {
        service
            .add_node(NodeData::new(NodeKind::Processor, sequence))
            .unwrap()
    };
    let a = add(&mut service);
    let b = add(&mut service);
    let c = add(&mut service);
    let d = add(&mut service);

    service
        .add_modifier(a, ModifierData::connection(p("value"), c, p("[0]")))
        .unwrap();
    service
        .add_modifier(b, ModifierData::connection(p("value"), a, p("[0]")))
        .unwrap();
    service
        .add_modifier(c, ModifierData::connection(p("value"), b, p("[0]")))
        .unwrap();
    service
        .add_modifier(d, ModifierData::constant(p("value"), 20))
        .unwrap();

    let report = service.process();
    assert_eq!(report.in_loop, [a, b, c]);
    assert_eq!(report.order, [d]);
    assert_eq!(report.failed, [a, b, c]);
    for id in [a, b, c] {
        let node = service.get_node(id).unwrap();
        assert_eq!(node.failure().unwrap().kind, FailureKind::DependencyLoop);
        assert!(node.output().is_none());
    }
    assert_eq!(sequence_output(&service, d), [20, 21]);

    service
        .add_modifier(a, ModifierData::constant(p("value"), 5))
        .unwrap();
    let report = service.process();
    assert!(report.in_loop.is_empty());
    assert!(report.failed.is_empty());
    assert_eq!(report.order, [a, b, c, d]);
    for id in [a, b, c] {
        assert_eq!(sequence_output(&service, id), [5, 6]);
    }
}

/// A sum reading a whole sequence at `values`, with `values[1]` pinned.
fn pinned_sum(pin_first: bool) -> (ProjectService, NodeId, NodeId) {
    init_logger();
    let mut service = ProjectService::new(create_plugin_manager());
    let plugins = service.get_plugin_manager();
    let sequence = plugins.processor_id(SEQUENCE_PROCESSOR).unwrap();
    let sum = plugins.processor_id(SUM_PROCESSOR).unwrap();
    let numbers = service
        .add_node(
            NodeData::new(NodeKind::Processor, sequence)
                .with_modifier(ModifierData::constant(p("value"), 5)),
        )
        .unwrap();
    let total = service.add_node(NodeData::new(NodeKind::Processor, sum)).unwrap();

    let pin = ModifierData::constant(p("values[1]"), 100);
    let connection = ModifierData::connection(p("values"), numbers, Path::root());
    if pin_first {
        service.add_modifier(total, pin).unwrap();
        service.add_modifier(total, connection).unwrap();
    } else {
        service.add_modifier(total, connection).unwrap();
        service.add_modifier(total, pin).unwrap();
    }
    (service, numbers, total)
}

fn total_and_pin(service: &ProjectService, total: NodeId) -> (Option<i64>, ModifierOutcome) {
    let node = service.get_node(total).unwrap();
    (
        node.output().and_then(|o| o.as_integer()),
        node.modifier(&p("values[1]")).unwrap().outcome(),
    )
}

#[test]
fn test_modifier_waiting_for_a_connection_is_retried() {
    let (mut service, _, total) = pinned_sum(true);
    assert_eq!(
        service.get_node(total).unwrap().modifier(&p("values[1]")).unwrap().outcome(),
        ModifierOutcome::TargetMissing
    );
    service.process();
    assert_eq!(total_and_pin(&service, total), (Some(105), ModifierOutcome::Success));
}

#[test]
fn test_modifier_under_a_connection_survives_updates() {
    let (mut service, numbers, total) = pinned_sum(false);
    service.process();
    assert_eq!(total_and_pin(&service, total), (Some(105), ModifierOutcome::Success));

    service
        .add_modifier(numbers, ModifierData::constant(p("value"), 6))
        .unwrap();
    service.process();
    assert_eq!(total_and_pin(&service, total), (Some(106), ModifierOutcome::Success));

    service
        .add_modifier(numbers, ModifierData::constant(p("count"), 3))
        .unwrap();
    service.process();
    assert_eq!(total_and_pin(&service, total), (Some(6 + 100 + 8), ModifierOutcome::Success));

    service.remove_modifier(total, &p("values[1]")).unwrap();
    service.process();
    assert_eq!(sum_of(&service, total), Some(21));
}

fn sum_of(service: &ProjectService, total: NodeId) -> Option<i64> {
    service
        .get_node(total)
        .unwrap()
        .output()
        .and_then(|o| o.as_integer())
}
