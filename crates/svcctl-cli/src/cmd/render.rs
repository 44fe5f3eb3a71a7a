use super::Ctx;
use crate::output::print_json;
use anyhow::Context;
use std::path::Path;
use svcctl_core::{io, unit};

pub fn run(ctx: &Ctx, service: &str, config: &str, output: Option<&Path>) -> anyhow::Result<()> {
    let descriptor = ctx.load()?;
    let rendered = unit::render_for(&descriptor, service, config)?;

    let Some(path) = output else {
        if ctx.json {
            return print_json(&rendered);
        }
        print!("{}", rendered.text);
        return Ok(());
    };

    let written = io::write_if_changed(path, rendered.text.as_bytes())
        .with_context(|| format!("failed to write unit to {}", path.display()))?;
    tracing::info!(unit = %rendered.name, path = %path.display(), written, "unit rendered");

    if ctx.json {
        print_json(&serde_json::json!({
            "name": rendered.name,
            "path": path,
            "written": written,
        }))?;
    } else if written {
        println!("Wrote {} to {}", rendered.name, path.display());
    } else {
        println!("{} is up to date at {}", rendered.name, path.display());
    }
    Ok(())
}
