pub mod config;
pub mod info;
pub mod status;
pub mod ticket;

use std::path::PathBuf;

use workflow_cli::build_context;
use workflow_core::context::Context;

/// Run a handler against a freshly loaded context, then persist the session.
///
/// The session is saved whether or not the handler succeeded, so progress made
/// before a failure (a created branch, an uploaded review) is not forgotten.
pub fn with_context<F>(root: PathBuf, f: F) -> anyhow::Result<()>
where
    F: FnOnce(&mut Context) -> anyhow::Result<()>,
{
    let mut ctx = build_context(root)?;
    let result = f(&mut ctx);

    if let Err(e) = ctx.session.save() {
        tracing::error!("Failed to save session to {}: {e}", ctx.session.path().display());
        if result.is_ok() {
            return Err(e.into());
        }
    }
    result
}
