use super::Ctx;
use crate::output::{print_json, print_table};
use svcctl_core::resolve;

pub fn run(ctx: &Ctx, service: &str, config: &str) -> anyhow::Result<()> {
    let descriptor = ctx.load()?;
    let params = resolve::resolve(&descriptor, service, config)?;

    if ctx.json {
        return print_json(&params);
    }

    let rows: Vec<Vec<String>> = params
        .params()
        .iter()
        .map(|(k, v)| vec![k.to_string(), v.to_string()])
        .collect();
    print_table(&["PARAMETER", "VALUE"], &rows);

    if !params.env().is_empty() {
        println!();
        let rows: Vec<Vec<String>> = params
            .env()
            .iter()
            .map(|(k, v)| vec![k.clone(), v.clone()])
            .collect();
        print_table(&["ENV", "VALUE"], &rows);
    }
    Ok(())
}
