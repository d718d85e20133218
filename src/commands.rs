//! Command implementations, independent of argument parsing.
//!
//! Each command takes a [`Context`] carrying the configuration, the reporter,
//! the encryption tool and the prompter, so tests can inject fakes.

use crate::batch::{run_batch, run_single, validate_selection, BatchReport, Selection};
use crate::config::Config;
use crate::discovery::{directory_label, discover_directories, discover_environments};
use crate::error::{EnvcryptError, Result};
use crate::gpg::EncryptionTool;
use crate::models::{EnvFilePair, Target};
use crate::operations::EnvOperations;
use crate::passphrase::{self, PassphraseOptions};
use crate::prompt::Prompter;
use crate::reporter::Reporter;
use crate::secrets::{secret_variable_name, SecretStore};
use crate::utils;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Everything a command needs from the outside world.
pub struct Context<'a> {
    pub config: Config,
    pub reporter: Reporter,
    pub tool: &'a dyn EncryptionTool,
    pub prompter: &'a dyn Prompter,
}

/// Which environments a batch command should touch.
#[derive(Debug, Clone, Default)]
pub struct TargetSpec {
    pub environment: Option<String>,
    pub all: bool,
    pub select: bool,
    pub recursive: bool,
}

/// Passphrase-related flags.
#[derive(Debug, Clone, Default)]
pub struct PassphraseSpec {
    pub passphrase: Option<String>,
    pub secret_key: Option<String>,
}

impl PassphraseSpec {
    fn options(&self) -> PassphraseOptions<'_> {
        PassphraseOptions {
            explicit: self.passphrase.as_deref(),
            secret_key: self.secret_key.as_deref(),
        }
    }
}

fn all_targets(root: &Path, recursive: bool) -> Result<Vec<Target>> {
    let targets: Vec<Target> = if recursive {
        discover_directories(root)?
            .into_iter()
            .flat_map(|(dir, envs)| {
                let label = directory_label(root, &dir);
                envs.into_iter()
                    .map(move |env| Target::new(dir.clone(), env).labelled(label.clone()))
            })
            .collect()
    } else {
        discover_environments(root)?
            .into_iter()
            .map(|env| Target::new(root, env))
            .collect()
    };

    if targets.is_empty() {
        return Err(EnvcryptError::NoEnvironments(root.to_path_buf()));
    }
    Ok(targets)
}

fn targets_for(root: &Path, environment: &str, recursive: bool) -> Result<Vec<Target>> {
    if !recursive {
        return Ok(vec![Target::new(root, environment)]);
    }
    let targets: Vec<Target> = all_targets(root, true)?
        .into_iter()
        .filter(|t| t.environment == environment)
        .collect();
    if targets.is_empty() {
        return Err(EnvcryptError::NoEnvironments(root.to_path_buf()));
    }
    Ok(targets)
}

/// Validated selection, ready to be turned into targets.
struct Plan {
    selection: Selection,
    recursive: bool,
}

impl Plan {
    /// Check flag combinations and names. Touches nothing on disk.
    fn validate(spec: &TargetSpec, interactive: bool) -> Result<Self> {
        let selection = match validate_selection(spec.all, spec.environment.as_deref(), spec.select)? {
            Some(Selection::One(env)) => Selection::One(utils::validate_environment_name(&env)?),
            Some(other) => other,
            None if interactive => Selection::Interactive,
            None => {
                return Err(EnvcryptError::MissingArgument(
                    "one of --env, --all or --select is required".to_string(),
                ))
            }
        };
        Ok(Self {
            selection,
            recursive: spec.recursive,
        })
    }

    fn is_single(&self) -> bool {
        matches!(self.selection, Selection::One(_)) && !self.recursive
    }

    fn targets(&self, ctx: &Context<'_>) -> Result<Vec<Target>> {
        let root = &ctx.config.working_dir;
        match &self.selection {
            Selection::All => all_targets(root, self.recursive),
            Selection::One(env) => targets_for(root, env, self.recursive),
            Selection::Interactive => {
                let candidates = all_targets(root, self.recursive)?;
                let labels: Vec<String> = candidates.iter().map(Target::to_string).collect();
                let picked = ctx.prompter.select("Select environments", &labels)?;
                if picked.is_empty() {
                    return Err(EnvcryptError::Cancelled);
                }
                Ok(candidates
                    .into_iter()
                    .enumerate()
                    .filter(|(i, _)| picked.contains(i))
                    .map(|(_, t)| t)
                    .collect())
            }
        }
    }
}

/// Run `op` over the targets. A single explicit environment propagates its
/// error; anything else is a batch with per-item isolation.
fn execute_plan<F>(plan: &Plan, targets: &[Target], op: F) -> Result<BatchReport>
where
    F: FnMut(&Target) -> Result<usize>,
{
    match targets {
        [target] if plan.is_single() => run_single(target, op),
        _ => Ok(run_batch(targets, op)),
    }
}

fn load_secrets(config: &Config) -> Result<SecretStore> {
    SecretStore::load(&config.secrets_path())
}

/// Encrypt the selected environments.
pub fn encrypt(
    ctx: &Context<'_>,
    spec: &TargetSpec,
    pass: &PassphraseSpec,
    force: bool,
) -> Result<BatchReport> {
    let plan = Plan::validate(spec, ctx.config.interactive)?;
    ctx.tool.check_available()?;
    let targets = plan.targets(ctx)?;
    let secrets = load_secrets(&ctx.config)?;
    let ops = EnvOperations::new(ctx.tool, ctx.prompter, &ctx.reporter).force(force);

    info!(count = targets.len(), tool = ctx.tool.name(), "encrypting");
    execute_plan(&plan, &targets, |target| {
        let files = target.files();
        if !files.plaintext.exists {
            return Err(EnvcryptError::NoPlaintext {
                environment: target.environment.clone(),
                path: files.plaintext.path,
            });
        }
        let secret = passphrase::obtain(
            &target.environment,
            pass.options(),
            &secrets,
            ctx.prompter,
            true,
        )?;
        debug!(target = %target, source = %secret.source, "passphrase resolved");
        let outcome = ops.encrypt_environment(&target.directory, &target.environment, secret.expose())?;
        Ok(outcome.files_processed())
    })
}

/// Decrypt the selected environments.
pub fn decrypt(
    ctx: &Context<'_>,
    spec: &TargetSpec,
    pass: &PassphraseSpec,
    force: bool,
) -> Result<BatchReport> {
    let plan = Plan::validate(spec, ctx.config.interactive)?;
    ctx.tool.check_available()?;
    let targets = plan.targets(ctx)?;
    let secrets = load_secrets(&ctx.config)?;
    let ops = EnvOperations::new(ctx.tool, ctx.prompter, &ctx.reporter).force(force);

    info!(count = targets.len(), tool = ctx.tool.name(), "decrypting");
    execute_plan(&plan, &targets, |target| {
        let files = target.files();
        if !files.ciphertext.exists {
            return Err(EnvcryptError::NoCiphertext {
                environment: target.environment.clone(),
                path: files.ciphertext.path,
            });
        }
        let secret = passphrase::obtain(
            &target.environment,
            pass.options(),
            &secrets,
            ctx.prompter,
            false,
        )?;
        debug!(target = %target, source = %secret.source, "passphrase resolved");
        let outcome = ops.decrypt_environment(&target.directory, &target.environment, secret.expose())?;
        Ok(outcome.files_processed())
    })
}

/// Copy one environment into the active env file, in one or all directories.
pub fn copy(
    ctx: &Context<'_>,
    environment: &str,
    destination: &str,
    recursive: bool,
    pass: &PassphraseSpec,
    force: bool,
) -> Result<BatchReport> {
    let environment = utils::validate_environment_name(environment)?;
    let plan = Plan {
        selection: Selection::One(environment.clone()),
        recursive,
    };
    let targets = targets_for(&ctx.config.working_dir, &environment, recursive)?;
    for target in &targets {
        EnvOperations::copy_destination(&target.directory, &target.environment, destination)?;
    }
    // plaintext copies work without gpg
    if targets
        .iter()
        .any(|t| EnvOperations::copy_needs_passphrase(&t.directory, &t.environment))
    {
        ctx.tool.check_available()?;
    }
    let secrets = load_secrets(&ctx.config)?;
    let ops = EnvOperations::new(ctx.tool, ctx.prompter, &ctx.reporter).force(force);

    execute_plan(&plan, &targets, |target| {
        let secret = if EnvOperations::copy_needs_passphrase(&target.directory, &target.environment) {
            Some(passphrase::obtain(
                &target.environment,
                pass.options(),
                &secrets,
                ctx.prompter,
                false,
            )?)
        } else {
            None
        };
        let outcome = ops.copy_environment(
            &target.directory,
            &target.environment,
            destination,
            secret.as_ref().map(|s| s.expose()),
        )?;
        Ok(outcome.files_processed())
    })
}

/// Create a new plaintext environment file.
pub fn create(
    ctx: &Context<'_>,
    environment: &str,
    template: Option<&Path>,
    force: bool,
) -> Result<PathBuf> {
    let environment = utils::validate_environment_name(environment)?;
    let template = template.map(|t| {
        if t.is_absolute() {
            t.to_path_buf()
        } else {
            ctx.config.working_dir.join(t)
        }
    });
    if let Some(t) = &template {
        if !t.is_file() {
            return Err(EnvcryptError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("template {} not found", t.display()),
            )));
        }
    }
    let ops = EnvOperations::new(ctx.tool, ctx.prompter, &ctx.reporter).force(force);
    ops.create_environment(&ctx.config.working_dir, &environment, template.as_deref())
}

/// One row of `list` output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListEntry {
    pub directory: String,
    pub environment: String,
    pub plaintext: bool,
    pub encrypted: bool,
    pub secret_configured: bool,
}

/// Environments with their file and secret status.
pub fn list(ctx: &Context<'_>, recursive: bool) -> Result<Vec<ListEntry>> {
    let root = &ctx.config.working_dir;
    let secrets = load_secrets(&ctx.config)?;

    let groups = if recursive {
        discover_directories(root)?
    } else {
        let envs = discover_environments(root)?;
        if envs.is_empty() {
            Default::default()
        } else {
            [(root.clone(), envs)].into_iter().collect()
        }
    };

    let mut entries = Vec::new();
    for (dir, envs) in groups {
        let label = directory_label(root, &dir);
        for env in envs {
            let files = EnvFilePair::locate(&dir, &env);
            entries.push(ListEntry {
                directory: label.clone(),
                secret_configured: secrets.contains(&secret_variable_name(&env)),
                plaintext: files.plaintext.exists,
                encrypted: files.ciphertext.exists,
                environment: env,
            });
        }
    }
    Ok(entries)
}

/// Secret status for `secrets --show`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecretStatus {
    pub environment: String,
    pub variable: String,
    pub configured: bool,
}

fn secret_environments(ctx: &Context<'_>, environment: Option<&str>, all: bool) -> Result<Vec<String>> {
    match validate_selection(all, environment, false)? {
        Some(Selection::One(env)) => Ok(vec![utils::validate_environment_name(&env)?]),
        _ => {
            let envs = discover_environments(&ctx.config.working_dir)?;
            if envs.is_empty() {
                return Err(EnvcryptError::NoEnvironments(ctx.config.working_dir.clone()));
            }
            Ok(envs)
        }
    }
}

/// Which environments have a secret available, without revealing values.
pub fn secret_status(
    ctx: &Context<'_>,
    environment: Option<&str>,
    all: bool,
) -> Result<Vec<SecretStatus>> {
    let envs = secret_environments(ctx, environment, all)?;
    let secrets = load_secrets(&ctx.config)?;
    Ok(envs
        .into_iter()
        .map(|env| {
            let variable = secret_variable_name(&env);
            SecretStatus {
                configured: secrets.contains(&variable),
                environment: env,
                variable,
            }
        })
        .collect())
}

/// Prompt for and store `<ENV>_SECRET` for each selected environment.
pub fn configure_secrets(
    ctx: &Context<'_>,
    environment: Option<&str>,
    all: bool,
) -> Result<Vec<String>> {
    let envs = secret_environments(ctx, environment, all)?;
    let path = ctx.config.secrets_path();
    let mut secrets = SecretStore::load(&path)?;
    let mut stored = Vec::new();

    for env in envs {
        let variable = secret_variable_name(&env);
        if secrets.keys().any(|k| k == variable) {
            let prompt = format!("{variable} is already set. Replace it?");
            if !ctx.prompter.confirm(&prompt, false)? {
                continue;
            }
        }
        let value = ctx
            .prompter
            .passphrase(&format!("Passphrase for {env}"), true)?;
        secrets.set(variable.clone(), value.as_str());
        stored.push(variable);
    }

    if stored.is_empty() {
        return Ok(stored);
    }

    let saved = secrets.save()?;
    if let (Some(dir), Some(name)) = (saved.parent(), saved.file_name()) {
        if utils::ensure_gitignored(dir, &name.to_string_lossy())? {
            ctx.reporter
                .hint(&format!("added {} to .gitignore", name.to_string_lossy()));
        }
    }
    Ok(stored)
}
