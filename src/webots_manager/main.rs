use clap::Parser;
use colored::*;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use webots_manager::api::{CmdMessage, CmdResult, ManagerApi, MessageLevel, VersionLine};
use webots_manager::catalog::ArchiveCatalog;
use webots_manager::config::ManagerConfig;
use webots_manager::error::Result;
use webots_manager::template::TemplateRecord;

mod args;
use args::{Cli, Commands, TemplateCommands};

/// Exit status used when a lock could not be released.
const EXIT_FATAL: u8 = 70;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_fatal() => {
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitCode::from(EXIT_FATAL)
        }
        Err(e) => {
            eprintln!("{} {}", "Error:".red(), e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let config_dir = ManagerConfig::locate_dir(cli.config_dir.as_deref())?;
    let config = ManagerConfig::load(&config_dir)?.with_env_overrides();
    tracing::debug!("using config from {}", config_dir.display());
    let mut api = ManagerApi::from_config(&config)?;

    match cli.command {
        Some(Commands::List { all }) => handle_list(&api, all),
        Some(Commands::Install { versions }) => print(api.install(&versions[..])?),
        Some(Commands::Use { version }) => print(api.use_version(&version)?),
        Some(Commands::Init) => print(api.init()?),
        Some(Commands::Template(cmd)) => handle_template(&mut api, cmd),
        None => handle_list(&api, false),
    }
}

fn handle_template<C: ArchiveCatalog>(api: &mut ManagerApi<C>, cmd: TemplateCommands) -> Result<()> {
    match cmd {
        TemplateCommands::Add { file, path } => print(api.add_template(&file, &path)?),
        TemplateCommands::Rm { path } => print(api.remove_template(&path)?),
        TemplateCommands::Whitelist { path, versions } => {
            print(api.whitelist(&path, &versions[..])?)
        }
        TemplateCommands::Blacklist { path, versions } => {
            print(api.blacklist(&path, &versions[..])?)
        }
        TemplateCommands::List => {
            let result = api.list_templates()?;
            print_templates(&result.listed_templates);
            print_messages(&result.messages);
            Ok(())
        }
        TemplateCommands::Apply => print(api.apply_templates()?),
    }
}

fn handle_list<C: ArchiveCatalog>(api: &ManagerApi<C>, all: bool) -> Result<()> {
    let result = api.list(all)?;
    print_versions(&result.listed_versions, all);
    print_messages(&result.messages);
    Ok(())
}

fn print(result: CmdResult) -> Result<()> {
    print_messages(&result.messages);
    Ok(())
}

fn print_messages(messages: &[CmdMessage]) {
    for message in messages {
        match message.level {
            MessageLevel::Info => println!("{}", message.content.dimmed()),
            MessageLevel::Success => println!("{}", message.content.green()),
            MessageLevel::Warning => println!("{}", message.content.yellow()),
        }
    }
}

fn print_versions(lines: &[VersionLine], all: bool) {
    for line in lines {
        let marker = if line.active { "*" } else { " " };
        let version = line.version.to_string();
        let version = if line.active {
            version.green().bold()
        } else if line.installed {
            version.normal()
        } else {
            version.dimmed()
        };
        if all && line.installed {
            println!("{} {} {}", marker, version, "(installed)".dimmed());
        } else {
            println!("{} {}", marker, version);
        }
    }
}

fn print_templates(records: &[TemplateRecord]) {
    for record in records {
        println!("{}", record.install_path.bold());
        if !record.whitelist.is_empty() {
            println!("    only: {}", join(&record.whitelist));
        }
        if !record.blacklist.is_empty() {
            println!("    never: {}", join(&record.blacklist));
        }
    }
}

fn join<'a, I, T>(items: I) -> String
where
    I: IntoIterator<Item = &'a T>,
    T: ToString + 'a,
{
    items
        .into_iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
