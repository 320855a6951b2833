use workflow_cli::output::{print_json, print_lines};
use workflow_core::context::Context;
use workflow_core::lifecycle;

pub fn start(ctx: &mut Context, ticket: &str, project: &str, base_branch: &str) -> anyhow::Result<()> {
    lifecycle::start(ctx, ticket, project, base_branch)?;
    Ok(())
}

pub fn commit(ctx: &mut Context, message: Option<&str>) -> anyhow::Result<()> {
    lifecycle::commit(ctx, message)?;
    Ok(())
}

pub fn format(ctx: &Context) -> anyhow::Result<()> {
    lifecycle::format(ctx)?;
    Ok(())
}

pub fn patch(ctx: &mut Context, finalize: bool, alias: Option<&str>, json: bool) -> anyhow::Result<()> {
    let build = lifecycle::patch(ctx, finalize, alias)?;
    if json {
        print_json(&build)?;
    }
    Ok(())
}

pub fn review(ctx: &mut Context) -> anyhow::Result<()> {
    lifecycle::review(ctx)?;
    Ok(())
}

pub fn ship(ctx: &mut Context, json: bool) -> anyhow::Result<()> {
    let lines = lifecycle::ship(ctx)?;
    if json {
        print_json(&serde_json::json!({ "instructions": lines }))?;
    } else {
        print_lines(&lines);
    }
    Ok(())
}

pub fn cleanup(ctx: &mut Context, force: bool) -> anyhow::Result<()> {
    lifecycle::cleanup(ctx, force)?;
    Ok(())
}

pub fn delete_branch(ctx: &mut Context) -> anyhow::Result<()> {
    lifecycle::delete_branch(ctx)?;
    Ok(())
}

pub fn open_jira(ctx: &mut Context, ticket: Option<&str>, project: &str, json: bool) -> anyhow::Result<()> {
    let url = lifecycle::open_jira(ctx, ticket, project)?;
    if json {
        print_json(&serde_json::json!({ "url": url }))?;
    }
    Ok(())
}
