mod cmd;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use workflow_cli::root;
use workflow_core::lifecycle::DEFAULT_BASE_BRANCH;
use workflow_core::types::DEFAULT_PROJECT;

#[derive(Parser)]
#[command(
    name = "workflow",
    about = "Work a server ticket end to end: branch, commit, patch build, code review, ship",
    version,
    propagate_version = true
)]
struct Cli {
    /// Root of the mongo repository (default: auto-detect from SConstruct)
    #[arg(long, global = true, env = "WORKFLOW_REPO")]
    repo: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Verbose logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Step 0: start a ticket or continue working on an existing one
    #[command(visible_aliases = ["anew", "a", "switch"])]
    Start {
        /// Ticket number (1234) or key (SERVER-1234)
        ticket: String,
        /// Jira project for bare ticket numbers
        #[arg(long, default_value = DEFAULT_PROJECT)]
        project: String,
        /// Branch the ticket is based on
        #[arg(long = "base", default_value = DEFAULT_BASE_BRANCH)]
        base_branch: String,
    },

    /// Step 1: write code (informational)
    Code,

    /// Step 2: format code and commit changes to tracked files
    #[command(visible_alias = "c")]
    Commit {
        /// Commit message without the ticket key (prompted if omitted)
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Step 3: run a patch build in Evergreen
    #[command(visible_alias = "p")]
    Patch {
        /// Create the patch without starting it; opens it in the browser instead
        #[arg(long)]
        no_finalize: bool,
        /// Evergreen alias selecting the tasks to run (default: from config)
        #[arg(long)]
        alias: Option<String>,
    },

    /// Step 4: open a code review or upload a new patch set
    #[command(visible_alias = "r")]
    Review,

    /// Step 5: link the patch build in Jira and show how to push
    #[command(visible_aliases = ["s", "push"])]
    Ship,

    /// Step 6: remove local branches and close the Jira ticket
    #[command(visible_aliases = ["z", "cleanup"])]
    Zzz {
        /// Delete the branch even if it is not fully merged
        #[arg(long)]
        force: bool,
    },

    /// Format modified C++ and JavaScript code
    #[command(visible_alias = "f")]
    Format,

    /// Delete the current ticket branch in both repos
    #[command(visible_alias = "d")]
    DeleteBranch,

    /// Open a ticket in Jira (default: the current one)
    #[command(visible_alias = "j")]
    OpenJira {
        ticket: Option<String>,
        #[arg(long, default_value = DEFAULT_PROJECT)]
        project: String,
    },

    /// List tickets in progress
    Status,

    /// Write ~/.evergreen.yml with your Evergreen API credentials
    Setup,

    /// Install the latest version of this tool
    #[command(visible_alias = "upgrade")]
    SelfUpdate,

    /// Show the resolved configuration and check it for mistakes
    Config,
}

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.debug {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .init();

    let root = root::resolve_root(cli.repo.as_deref());
    let json = cli.json;

    let result = match cli.command {
        Commands::Code => cmd::info::code(),
        Commands::Config => cmd::config::run(json),
        Commands::Status => cmd::status::run(root, json),
        Commands::Start {
            ticket,
            project,
            base_branch,
        } => cmd::with_context(root, |ctx| {
            cmd::ticket::start(ctx, &ticket, &project, &base_branch)
        }),
        Commands::Commit { message } => {
            cmd::with_context(root, |ctx| cmd::ticket::commit(ctx, message.as_deref()))
        }
        Commands::Patch { no_finalize, alias } => cmd::with_context(root, |ctx| {
            cmd::ticket::patch(ctx, !no_finalize, alias.as_deref(), json)
        }),
        Commands::Review => cmd::with_context(root, cmd::ticket::review),
        Commands::Ship => cmd::with_context(root, |ctx| cmd::ticket::ship(ctx, json)),
        Commands::Zzz { force } => cmd::with_context(root, |ctx| cmd::ticket::cleanup(ctx, force)),
        Commands::Format => cmd::with_context(root, |ctx| cmd::ticket::format(ctx)),
        Commands::DeleteBranch => cmd::with_context(root, cmd::ticket::delete_branch),
        Commands::OpenJira { ticket, project } => cmd::with_context(root, |ctx| {
            cmd::ticket::open_jira(ctx, ticket.as_deref(), &project, json)
        }),
        Commands::Setup => cmd::with_context(root, cmd::info::setup),
        Commands::SelfUpdate => cmd::with_context(root, |ctx| cmd::info::self_update(ctx)),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
