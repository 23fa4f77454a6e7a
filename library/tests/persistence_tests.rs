//! Project data and bundles: extract/set round trips, JSON and bincode
//! transfer, and identifier remapping between processes.

use std::fs;

use treeflow::builtin::{INTEGER_TEXT_FORMAT, SEQUENCE_PROCESSOR, SUM_PROCESSOR};
use treeflow::model::project::GraphBundle;
use treeflow::{
    IdentifierInterner, ModifierData, NodeData, NodeId, NodeKind, Path, PluginManager,
    ProjectService, Vec2, create_plugin_manager,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn p(s: &str) -> Path {
    s.parse().unwrap()
}

/// Two sequences feeding a sum, with a few presentation details set.
fn populated() -> (ProjectService, NodeId) {
    init_logger();
    let mut service = ProjectService::new(create_plugin_manager());
    let plugins = service.get_plugin_manager();
    let sequence = plugins.processor_id(SEQUENCE_PROCESSOR).unwrap();
    let sum = plugins.processor_id(SUM_PROCESSOR).unwrap();

    let a = service
        .add_node(
            NodeData::new(NodeKind::Processor, sequence)
                .with_modifier(ModifierData::constant(p("value"), 10)),
        )
        .unwrap();
    let total = service.add_node(NodeData::new(NodeKind::Processor, sum)).unwrap();
    service.add_array_entries(total, &p("values"), 0, 2).unwrap();
    service
        .add_modifier(total, ModifierData::connection(p("values[0]"), a, p("[0]")))
        .unwrap();
    service
        .add_modifier(total, ModifierData::connection(p("values[1]"), a, p("[1]")))
        .unwrap();
    service.move_node(total, Vec2::new(120.0, -40.5)).unwrap();
    service.set_expanded(total, &p("values"), true).unwrap();
    service.process();
    (service, total)
}

fn total_of(service: &ProjectService, id: NodeId) -> i64 {
    service
        .get_node(id)
        .unwrap()
        .output()
        .unwrap()
        .as_integer()
        .unwrap()
}

#[test]
fn test_extract_and_set_project_data() {
    let (service, total) = populated();
    assert_eq!(total_of(&service, total), 21);
    let data = service.extract_project_data();

    let json = serde_json::to_string(&data).unwrap();
    let restored = serde_json::from_str(&json).unwrap();
    assert_eq!(data, restored);
    let bytes = bincode::serialize(&data).unwrap();
    let restored: treeflow::ProjectData = bincode::deserialize(&bytes).unwrap();
    assert_eq!(data, restored);

    let mut copy = ProjectService::new(service.get_plugin_manager());
    copy.set_project_data(&restored).unwrap();
    assert!(!copy.history().can_undo());
    assert_eq!(copy.extract_project_data(), data);
    copy.process();
    assert_eq!(total_of(&copy, total), 21);
}

#[test]
fn test_set_project_data_resets_history() {
    let (mut service, _) = populated();
    assert!(service.history().can_undo());
    let data = service.extract_project_data();
    service.set_project_data(&data).unwrap();
    assert!(!service.history().can_undo());
    assert!(service.is_at_cursor());
}

#[test]
fn test_bundle_survives_a_different_interning_table() {
    let (service, total) = populated();
    let json = service.export_bundle().to_json().unwrap();

    let interner = std::sync::Arc::new(IdentifierInterner::new());
    interner.intern("unrelated.one", uuid::Uuid::new_v4());
    interner.intern("unrelated.two", uuid::Uuid::new_v4());
    let elsewhere = std::sync::Arc::new(PluginManager::with_builtins(interner));
    assert_ne!(
        elsewhere.processor_id(SUM_PROCESSOR),
        service.get_plugin_manager().processor_id(SUM_PROCESSOR)
    );

    let mut other = ProjectService::new(elsewhere.clone());
    let warnings = other
        .import_bundle(&GraphBundle::from_json(&json).unwrap())
        .unwrap();
    assert!(warnings.is_empty());
    assert_eq!(
        other.get_node(total).unwrap().factory(),
        elsewhere.processor_id(SUM_PROCESSOR).unwrap()
    );
    other.process();
    assert_eq!(total_of(&other, total), 21);
}

#[test]
fn test_transfer_bytes() {
    let (service, total) = populated();
    let bytes = service.to_transfer_bytes().unwrap();

    let mut other = ProjectService::new(create_plugin_manager());
    other.from_transfer_bytes(&bytes).unwrap();
    let node = other.get_node(total).unwrap();
    assert_eq!(node.presentation.position, Vec2::new(120.0, -40.5));
    assert!(node.expanded().contains(&p("values")));
    other.process();
    assert_eq!(total_of(&other, total), 21);

    assert!(other.from_transfer_bytes(&bytes[..bytes.len() / 2]).is_err());
}

#[test]
fn test_unknown_factory_loads_as_failed_node() {
    let (service, total) = populated();
    let bundle = service.export_bundle();

    let bare = std::sync::Arc::new(PluginManager::new(std::sync::Arc::new(
        IdentifierInterner::new(),
    )));
    let mut other = ProjectService::new(bare);
    let warnings = other.import_bundle(&bundle).unwrap();
    assert_eq!(warnings.len(), 2);
    let report = other.process();
    assert!(report.failed.contains(&total));
    assert!(other.get_node(total).unwrap().output().is_none());
}

#[test]
fn test_bundle_file_marks_saved() {
    init_logger();
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.txt");
    fs::write(&input, "12\n").unwrap();

    let mut service = ProjectService::new(create_plugin_manager());
    let text = service
        .get_plugin_manager()
        .format_id(INTEGER_TEXT_FORMAT)
        .unwrap();
    let source = service
        .add_node(NodeData::new(NodeKind::Source, text).with_location(&input))
        .unwrap();
    assert!(!service.is_at_cursor());

    let file = dir.path().join("project.json");
    service.save_bundle_file(&file).unwrap();
    assert!(service.is_at_cursor());

    let mut reopened = ProjectService::new(create_plugin_manager());
    reopened.load_bundle_file(&file).unwrap();
    let node = reopened.get_node(source).unwrap();
    assert_eq!(node.location(), Some(input.as_path()));
    assert_eq!(node.output().unwrap().as_integer(), Some(12));
}
