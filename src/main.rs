use anyhow::Result;
use clap::{CommandFactory, Parser};
use clap_complete::{Generator, generate};
use colored::Colorize;
use statediff::cli::{Cli, Commands, ConfigAction};
use statediff::logging::{self, LogSettings};
use statediff::output::{self, Verbosity};
use statediff::{StatediffContext, commands, session};
use std::io;
use std::process;

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Completion { shell } = cli.command {
        print_completions(shell, &mut Cli::command());
        return Ok(());
    }

    output::set_verbosity(if cli.quiet {
        Verbosity::Quiet
    } else if cli.verbose {
        Verbosity::Verbose
    } else {
        Verbosity::Normal
    });

    let ctx = StatediffContext::load(cli.config.as_deref())?;
    init_logging(&ctx, &cli);
    ctx.warn_unknown_fields();

    match cli.command {
        Commands::Before { session, excludes } => {
            commands::before::execute(&ctx, &session, &excludes)?;
        }
        Commands::After {
            session,
            sections,
            excludes,
        } => {
            commands::after::execute(&ctx, &session, &sections, &excludes)?;
        }
        Commands::Report {
            session,
            sections,
            print,
            json,
        } => {
            commands::report::execute(&ctx, &session, &sections, print, json)?;
        }
        Commands::Show { session, path } => {
            commands::show::execute(&ctx, &session, &path)?;
        }
        Commands::Status { session } => {
            commands::status::execute(&ctx, session.as_deref())?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::show(&ctx)?,
            ConfigAction::Validate => commands::config::validate(&ctx)?,
            ConfigAction::Init { force } => commands::config::init(&ctx, force)?,
        },
        Commands::Completion { .. } => {}
    }

    Ok(())
}

/// Stderr logging always; the session log only for commands that write to a session
fn init_logging(ctx: &StatediffContext, cli: &Cli) {
    let settings = LogSettings::new(&ctx.config.logging.level, cli.verbose, cli.quiet);

    let session = match &cli.command {
        Commands::Before { session, .. }
        | Commands::After { session, .. }
        | Commands::Report { session, .. } => Some(session.as_str()),
        _ => None,
    };

    if ctx.config.logging.log_to_file
        && let Some(name) = session
        && session::validate_name(name).is_ok()
    {
        let with_file = settings.clone().with_session_file(&ctx.session_dir(name));
        match logging::init(&with_file) {
            Ok(()) => return,
            Err(e) => output::warning(&format!("Session log disabled: {e:#}")),
        }
    }

    let _ = logging::init(&settings);
}

fn print_completions<G: Generator>(g: G, cmd: &mut clap::Command) {
    generate(g, cmd, cmd.get_name().to_string(), &mut io::stdout());
}
