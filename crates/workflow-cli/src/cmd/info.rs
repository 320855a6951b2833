use workflow_cli::output::print_lines;
use workflow_core::context::Context;
use workflow_core::lifecycle;

pub fn code() -> anyhow::Result<()> {
    print_lines(lifecycle::code());
    Ok(())
}

pub fn setup(ctx: &mut Context) -> anyhow::Result<()> {
    if lifecycle::setup(ctx)? {
        println!("Evergreen is configured. You're all set.");
    }
    Ok(())
}

pub fn self_update(ctx: &Context) -> anyhow::Result<()> {
    lifecycle::self_update(ctx)?;
    Ok(())
}
