use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "webots-manager")]
#[command(about = "Install, switch and customize multiple Webots versions", long_about = None)]
#[command(version, long_version = env!("WBM_LONG_VERSION"))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Directory holding config.json
    #[arg(long, global = true, value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List installed versions
    #[command(alias = "ls")]
    List {
        /// Also list every version the archive offers
        #[arg(short, long)]
        all: bool,
    },

    /// Install (or reinstall) one or more versions
    Install {
        /// Versions, e.g. 2021.0.0
        #[arg(required = true, num_args = 1..)]
        versions: Vec<String>,
    },

    /// Make a version the active one, installing it if needed
    Use {
        version: String,
    },

    /// Link the home path to the active version
    Init,

    /// Manage overlay files installed into every version
    #[command(subcommand, alias = "t")]
    Template(TemplateCommands),
}

#[derive(Subcommand, Debug)]
pub enum TemplateCommands {
    /// Register a file to be linked at PATH inside each version
    Add {
        file: PathBuf,

        /// Path relative to the version root
        path: String,
    },

    /// Forget a template and unlink it everywhere
    #[command(alias = "remove")]
    Rm {
        path: String,
    },

    /// Restrict a template to the given versions
    Whitelist {
        path: String,

        #[arg(required = true, num_args = 1..)]
        versions: Vec<String>,
    },

    /// Keep a template out of the given versions
    Blacklist {
        path: String,

        #[arg(required = true, num_args = 1..)]
        versions: Vec<String>,
    },

    /// List registered templates
    #[command(alias = "ls")]
    List,

    /// Reconcile every installed version with the template rules
    Apply,
}
