mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{
    config::ConfigSubcommand, fragment::FragmentSubcommand, role::RoleSubcommand,
    template::TemplateSubcommand,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "loom",
    about = "Compose role prompts and deliverables from a Markdown knowledge base",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .loom/ or .git/)
    #[arg(long, global = true, env = "LOOM_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scaffold .loom/, starter knowledge and role templates
    Init {
        /// Project name (default: root directory name)
        #[arg(long)]
        name: Option<String>,

        /// Target language, repeatable (e.g. --language python)
        #[arg(long = "language", value_name = "LANG")]
        languages: Vec<String>,
    },

    /// Browse the knowledge base
    Fragment {
        #[command(subcommand)]
        subcommand: FragmentSubcommand,
    },

    /// Browse templates
    Template {
        #[command(subcommand)]
        subcommand: TemplateSubcommand,
    },

    /// Substitute [NAME] placeholders in a file and print the result
    Resolve {
        file: PathBuf,

        /// Binding, repeatable: --set NAME=VALUE
        #[arg(long = "set", value_name = "NAME=VALUE")]
        set: Vec<String>,
    },

    /// Compose a template with fragments, validate and print it
    Compose {
        /// Template id
        template: String,

        /// Fragment id to inject, repeatable
        #[arg(long = "fragment", value_name = "ID")]
        fragments: Vec<String>,

        /// Fragment topic to inject, repeatable
        #[arg(long = "topic", value_name = "TOPIC")]
        topics: Vec<String>,

        /// Binding, repeatable: --set NAME=VALUE
        #[arg(long = "set", value_name = "NAME=VALUE")]
        set: Vec<String>,

        /// Write the document here instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Check a document against a template's structural contract
    Validate {
        file: PathBuf,

        /// Template id the document was produced from
        #[arg(long)]
        template: String,
    },

    /// Inspect role definitions and their dependency graph
    Role {
        #[command(subcommand)]
        subcommand: RoleSubcommand,
    },

    /// Run one role, or every role in dependency order
    Run {
        /// Run only this role, using stored upstream documents
        #[arg(long)]
        role: Option<String>,

        /// Keep validated documents in state without writing them to the output directory
        #[arg(long)]
        no_deliver: bool,
    },

    /// Show the latest document per role
    State,

    /// Validate the project configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init { name, languages } => cmd::init::run(&root, name.as_deref(), &languages),
        Commands::Fragment { subcommand } => cmd::fragment::run(&root, subcommand, cli.json),
        Commands::Template { subcommand } => cmd::template::run(&root, subcommand, cli.json),
        Commands::Resolve { file, set } => cmd::resolve::run(&root, &file, &set, cli.json),
        Commands::Compose {
            template,
            fragments,
            topics,
            set,
            output,
        } => cmd::compose::run(
            &root,
            cmd::compose::ComposeArgs {
                template,
                fragments,
                topics,
                set,
                output,
            },
            cli.json,
        ),
        Commands::Validate { file, template } => {
            cmd::validate::run(&root, &file, &template, cli.json)
        }
        Commands::Role { subcommand } => cmd::role::run(&root, subcommand, cli.json),
        Commands::Run { role, no_deliver } => {
            cmd::run::run(&root, role.as_deref(), !no_deliver, cli.json)
        }
        Commands::State => cmd::state::run(&root, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
