use super::Ctx;
use crate::output::{print_json, print_table};
use svcctl_core::descriptor::WarnLevel;

pub fn run(ctx: &Ctx) -> anyhow::Result<()> {
    let descriptor = ctx.load()?;
    let warnings = descriptor.validate();
    let phases = descriptor.phases();

    if ctx.json {
        let phase_items: Vec<serde_json::Value> = phases
            .iter()
            .map(|(name, def)| serde_json::json!({ "name": name, "commands": def.commands.len() }))
            .collect();
        let service_items: Vec<serde_json::Value> = descriptor
            .services
            .iter()
            .map(|s| {
                let configs: Vec<&str> = s.config_names().collect();
                serde_json::json!({ "name": s.name, "configs": configs })
            })
            .collect();
        let value = serde_json::json!({
            "project": descriptor.project,
            "phases": phase_items,
            "services": service_items,
            "warnings": warnings,
        });
        print_json(&value)?;
    } else {
        println!("Project: {}", descriptor.project);
        println!();
        let rows: Vec<Vec<String>> = phases
            .iter()
            .map(|(name, def)| vec![name.to_string(), def.commands.len().to_string()])
            .collect();
        print_table(&["PHASE", "COMMANDS"], &rows);

        if !descriptor.services.is_empty() {
            println!();
            let rows: Vec<Vec<String>> = descriptor
                .services
                .iter()
                .map(|s| vec![s.name.clone(), s.config_names().collect::<Vec<_>>().join(", ")])
                .collect();
            print_table(&["SERVICE", "CONFIGS"], &rows);
        }

        println!();
        if warnings.is_empty() {
            println!("Descriptor is valid. No warnings.");
        } else {
            for w in &warnings {
                let prefix = match w.level {
                    WarnLevel::Warning => "warning",
                    WarnLevel::Error => "error",
                };
                println!("[{prefix}] {}", w.message);
            }
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("descriptor validation found errors");
    }
    Ok(())
}
