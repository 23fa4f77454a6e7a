use std::fs;
use std::path::Path as FsPath;

use anyhow::{Context, Result, bail};
use log::{info, warn};
use treeflow::builtin::{INTEGER_TEXT_FORMAT, SEQUENCE_PROCESSOR};
use treeflow::{ModifierData, NodeData, NodeKind, Path, PluginManager, ProjectService, Vec2};

use crate::config::AppConfig;

fn is_binary(path: &FsPath) -> bool {
    path.extension().is_some_and(|ext| ext == "bin")
}

/// Loads a bundle, picking the encoding from the file extension.
pub fn open(service: &mut ProjectService, path: &FsPath) -> Result<()> {
    let warnings = if is_binary(path) {
        let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        service.from_transfer_bytes(&bytes)?
    } else {
        service.load_bundle_file(path)?
    };
    for warning in warnings {
        warn!("{}", warning);
    }
    service.mark_saved();
    Ok(())
}

pub fn run(service: &mut ProjectService, config: &AppConfig, save: bool) -> Result<()> {
    let report = service.process();
    println!(
        "Evaluated {} node(s) in {} ms, {} failed, {} in a dependency loop",
        report.order.len(),
        report.elapsed.as_millis(),
        report.failed.len(),
        report.in_loop.len()
    );
    inspect(service)?;

    if save || config.save_targets {
        let failures = service.save_all_targets();
        for (id, e) in &failures {
            eprintln!("Failed to save target {}: {}", id, e);
        }
        if !failures.is_empty() {
            bail!("{} target(s) could not be saved", failures.len());
        }
    }
    Ok(())
}

pub fn inspect(service: &ProjectService) -> Result<()> {
    let plugins = service.get_plugin_manager();
    for node in service.get_nodes() {
        let factory = plugins.identifiers().describe(node.factory());
        print!("{} {:<9} {}", node.id(), node.kind(), factory);
        if let Some(location) = node.location() {
            print!(" [{}]", location.display());
        }
        println!();
        for modifier in node.modifiers() {
            println!("    {} ({:?})", modifier.data(), modifier.outcome());
        }
        match (node.failure(), node.output()) {
            (Some(failure), _) => println!("    failed ({:?}): {}", failure.kind, failure.reason),
            (None, Some(output)) => println!("    output: {}", serde_json::to_string(output)?),
            (None, None) => {}
        }
    }
    Ok(())
}

pub fn list_plugins(plugins: &PluginManager) {
    for plugin in plugins.plugins() {
        println!(
            "{:<24} v{:<3} {:?}",
            plugin.name, plugin.version, plugin.category
        );
    }
}

/// Re-encodes a bundle as JSON or as the compact binary transfer format.
pub fn pack(service: &ProjectService, output: &FsPath, pretty: bool) -> Result<()> {
    if is_binary(output) {
        fs::write(output, service.to_transfer_bytes()?)?;
    } else {
        let bundle = service.export_bundle();
        let json = if pretty {
            serde_json::to_string_pretty(&bundle)?
        } else {
            serde_json::to_string(&bundle)?
        };
        fs::write(output, json)?;
    }
    info!("Wrote {}", output.display());
    Ok(())
}

/// Writes a small source -> sequence -> target project into `dir`.
pub fn demo(service: &mut ProjectService, dir: &FsPath, start: i64) -> Result<()> {
    fs::create_dir_all(dir)?;
    let input = dir.join("input.txt");
    fs::write(&input, format!("{}\n", start))?;

    let plugins = service.get_plugin_manager();
    let Some(text) = plugins.format_id(INTEGER_TEXT_FORMAT) else {
        bail!("format '{}' is not registered", INTEGER_TEXT_FORMAT);
    };
    let Some(sequence) = plugins.processor_id(SEQUENCE_PROCESSOR) else {
        bail!("processor '{}' is not registered", SEQUENCE_PROCESSOR);
    };

    service.begin_gesture("Create Demo");
    let source = service.add_node(NodeData::new(NodeKind::Source, text).with_location(&input))?;
    let processor = service.add_node(NodeData::new(NodeKind::Processor, sequence))?;
    service.move_node(processor, Vec2::new(200.0, 0.0))?;
    service.add_modifier(
        processor,
        ModifierData::connection("value".parse::<Path>()?, source, Path::root()),
    )?;
    let target = service.add_node(
        NodeData::new(NodeKind::Target, text).with_location(dir.join("output.txt")),
    )?;
    service.move_node(target, Vec2::new(400.0, 0.0))?;
    service.add_modifier(
        target,
        ModifierData::connection(Path::root(), processor, "[0]".parse::<Path>()?),
    )?;
    service.end_gesture();

    let project = dir.join("project.json");
    service.save_bundle_file(&project)?;
    println!("Created {}", project.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use treeflow::create_plugin_manager;

    #[test]
    fn test_demo_runs_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let mut service = ProjectService::new(create_plugin_manager());
        demo(&mut service, dir.path(), 5).unwrap();

        let mut reopened = ProjectService::new(create_plugin_manager());
        open(&mut reopened, &dir.path().join("project.json")).unwrap();
        run(&mut reopened, &AppConfig::default(), true).unwrap();
        let written = fs::read_to_string(dir.path().join("output.txt")).unwrap();
        assert_eq!(written.trim(), "5");
    }

    #[test]
    fn test_pack_binary_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let mut service = ProjectService::new(create_plugin_manager());
        demo(&mut service, dir.path(), 1).unwrap();
        let packed = dir.path().join("project.bin");
        pack(&service, &packed, false).unwrap();

        let mut reopened = ProjectService::new(create_plugin_manager());
        open(&mut reopened, &packed).unwrap();
        assert_eq!(reopened.get_nodes().len(), 3);
    }
}
