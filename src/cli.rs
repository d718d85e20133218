//! Command-line interface implementation.

use crate::batch::BatchReport;
use crate::commands::{self, Context, PassphraseSpec, TargetSpec};
use crate::config::{Config, DEFAULT_GPG_PROGRAM};
use crate::error::Result;
use crate::gpg::Gpg;
use crate::operations::ACTIVE_ENV_FILE;
use crate::prompt;
use crate::reporter::Reporter;
use crate::secrets::DEFAULT_SECRETS_FILE;
use crate::utils;
use clap::{Args, Parser, Subcommand};
use colored::*;
use std::path::PathBuf;

/// Encrypt, decrypt and distribute per-stage .env files with GnuPG.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory containing the .env files
    #[arg(short = 'd', long, global = true, env = "ENVCRYPT_DIR", default_value = ".")]
    pub dir: PathBuf,

    /// Secrets file with <ENV>_SECRET entries (relative to --dir)
    #[arg(long, global = true, env = "ENVCRYPT_SECRETS_FILE", default_value = DEFAULT_SECRETS_FILE)]
    pub secrets_file: PathBuf,

    /// GnuPG executable
    #[arg(long, global = true, env = "ENVCRYPT_GPG", default_value = DEFAULT_GPG_PROGRAM)]
    pub gpg: String,

    /// Only print errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Show debug logs (overridden by ENVCRYPT_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(
        short = 'o',
        long,
        global = true,
        value_enum,
        default_value = "text",
        help = "Output format"
    )]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Environment selection flags for batch commands.
#[derive(Args, Debug, Clone, Default)]
pub struct SelectionArgs {
    /// Environment name (e.g. production)
    #[arg(short, long = "env")]
    pub environment: Option<String>,

    /// Process every environment found
    #[arg(short, long)]
    pub all: bool,

    /// Pick environments interactively
    #[arg(short, long)]
    pub select: bool,

    /// Walk subdirectories and process each one
    #[arg(short, long)]
    pub recursive: bool,
}

/// Passphrase source flags.
#[derive(Args, Debug, Clone, Default)]
pub struct PassphraseArgs {
    /// Passphrase to use instead of the secrets file
    #[arg(short, long, env = "ENVCRYPT_PASSPHRASE", hide_env_values = true)]
    pub passphrase: Option<String>,

    /// Secret variable to read the passphrase from
    #[arg(long, value_name = "KEY")]
    pub secret_key: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a new .env.<env> file
    Create {
        /// Environment name
        #[arg(short, long = "env")]
        environment: String,

        /// Template to copy (default: .env.example or .env.template)
        #[arg(long)]
        from: Option<PathBuf>,

        /// Overwrite without confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Encrypt .env.<env> into .env.<env>.gpg
    Encrypt {
        #[command(flatten)]
        selection: SelectionArgs,

        #[command(flatten)]
        passphrase: PassphraseArgs,

        /// Overwrite without confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Decrypt .env.<env>.gpg into .env.<env>
    Decrypt {
        #[command(flatten)]
        selection: SelectionArgs,

        #[command(flatten)]
        passphrase: PassphraseArgs,

        /// Overwrite without confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Make an environment the active .env
    Copy {
        /// Environment name
        #[arg(short, long = "env")]
        environment: String,

        /// Destination file name
        #[arg(long, default_value = ACTIVE_ENV_FILE)]
        to: String,

        /// Do it in every directory that has this environment
        #[arg(short, long)]
        recursive: bool,

        #[command(flatten)]
        passphrase: PassphraseArgs,

        /// Overwrite without confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// List environments and their status
    List {
        /// Walk subdirectories
        #[arg(short, long)]
        recursive: bool,
    },

    /// Configure passphrases in the secrets file
    Secrets {
        /// Environment name
        #[arg(short, long = "env")]
        environment: Option<String>,

        /// Every environment found
        #[arg(short, long)]
        all: bool,

        /// Only show which environments have a secret
        #[arg(long)]
        show: bool,
    },
}

impl From<&SelectionArgs> for TargetSpec {
    fn from(args: &SelectionArgs) -> Self {
        TargetSpec {
            environment: args.environment.clone(),
            all: args.all,
            select: args.select,
            recursive: args.recursive,
        }
    }
}

impl From<&PassphraseArgs> for PassphraseSpec {
    fn from(args: &PassphraseArgs) -> Self {
        PassphraseSpec {
            passphrase: args.passphrase.clone(),
            secret_key: args.secret_key.clone(),
        }
    }
}

impl Cli {
    /// Build the runtime configuration from parsed flags.
    pub fn config(&self) -> Config {
        Config {
            working_dir: self.dir.clone(),
            secrets_file: self.secrets_file.clone(),
            gpg_program: self.gpg.clone(),
            quiet: self.quiet || self.output == OutputFormat::Json,
            ..Config::default()
        }
    }

    /// Execute the CLI command.
    pub fn execute(&self) -> Result<()> {
        let config = self.config();
        let tool = Gpg::new(config.gpg_program.clone());
        let prompter = prompt::for_terminal(config.interactive);
        let ctx = Context {
            reporter: Reporter::new(config.quiet),
            config,
            tool: &tool,
            prompter: prompter.as_ref(),
        };
        self.run(&ctx)
    }

    /// Execute against an explicit context.
    pub fn run(&self, ctx: &Context<'_>) -> Result<()> {
        match &self.command {
            Commands::Create {
                environment,
                from,
                yes,
            } => {
                let path = commands::create(ctx, environment, from.as_deref(), *yes)?;
                ctx.reporter
                    .success(&format!("Created {}", ctx.reporter.path(path.display())));
                for warn in utils::check_file_permissions(&path) {
                    ctx.reporter.warn(&warn);
                }
                Ok(())
            }
            Commands::Encrypt {
                selection,
                passphrase,
                yes,
            } => {
                let report =
                    commands::encrypt(ctx, &selection.into(), &passphrase.into(), *yes)?;
                self.finish(ctx, "encrypt", report)
            }
            Commands::Decrypt {
                selection,
                passphrase,
                yes,
            } => {
                let report =
                    commands::decrypt(ctx, &selection.into(), &passphrase.into(), *yes)?;
                self.finish(ctx, "decrypt", report)
            }
            Commands::Copy {
                environment,
                to,
                recursive,
                passphrase,
                yes,
            } => {
                let report = commands::copy(
                    ctx,
                    environment,
                    to,
                    *recursive,
                    &passphrase.into(),
                    *yes,
                )?;
                self.finish(ctx, "copy", report)
            }
            Commands::List { recursive } => self.list(ctx, *recursive),
            Commands::Secrets {
                environment,
                all,
                show,
            } => self.secrets(ctx, environment.as_deref(), *all, *show),
        }
    }

    fn finish(&self, ctx: &Context<'_>, operation: &str, report: BatchReport) -> Result<()> {
        match self.output {
            OutputFormat::Text => ctx.reporter.batch(operation, &report),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        }
        report.into_result().map(|_| ())
    }

    fn list(&self, ctx: &Context<'_>, recursive: bool) -> Result<()> {
        let entries = commands::list(ctx, recursive)?;

        if self.output == OutputFormat::Json {
            let json = serde_json::json!({ "environments": entries });
            println!("{}", serde_json::to_string_pretty(&json)?);
            return Ok(());
        }

        if entries.is_empty() {
            println!("No environments found");
            return Ok(());
        }

        let mut current_dir: Option<&str> = None;
        for entry in &entries {
            if recursive && current_dir != Some(entry.directory.as_str()) {
                println!("{}", entry.directory.bold());
                current_dir = Some(entry.directory.as_str());
            }
            let indent = if recursive { "  " } else { "" };
            let mut flags = Vec::new();
            if entry.plaintext {
                flags.push("plaintext".green().to_string());
            }
            if entry.encrypted {
                flags.push("encrypted".cyan().to_string());
            }
            if !entry.secret_configured {
                flags.push("no secret".yellow().to_string());
            }
            println!("{indent}{:<16} {}", entry.environment, flags.join(", "));
        }
        Ok(())
    }

    fn secrets(
        &self,
        ctx: &Context<'_>,
        environment: Option<&str>,
        all: bool,
        show: bool,
    ) -> Result<()> {
        if show {
            let statuses = commands::secret_status(ctx, environment, all)?;
            if self.output == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&statuses)?);
                return Ok(());
            }
            for status in statuses {
                let state = if status.configured {
                    "set".green()
                } else {
                    "missing".yellow()
                };
                println!("{:<16} {:<24} {}", status.environment, status.variable, state);
            }
            return Ok(());
        }

        let stored = commands::configure_secrets(ctx, environment, all)?;
        if stored.is_empty() {
            ctx.reporter.info("No secrets changed");
        } else {
            ctx.reporter.success(&format!(
                "Stored {} in {}",
                stored.join(", "),
                ctx.reporter.path(ctx.config.secrets_path().display())
            ));
        }
        Ok(())
    }
}
