//! Subcommand handlers
//!
//! Each handler returns the process exit code; failures are logged through
//! `tracing` and turn into exit code 1.

use anyhow::{bail, Context, Result};
use chrono::Local;
use regex::Regex;
use std::env;
use tracing::{debug, error, info};

use super::commands::{
    CheckArgs, EnvArgs, HistoryArgs, JobArgs, LastSyncArgs, ProjectsArgs, XsyncArgs,
};
use super::output::{OutputFormat, OutputFormatter};
use crate::api::{resolve_ltoken_path, Credentials, KlocworkApi, ProjectSource};
use crate::command::{CommandRunner, EnvMap, ProcessRunner};
use crate::config::KwciConfig;
use crate::fs::RealFileSystem;
use crate::history::BuildContext;
use crate::sync::{DurationExpr, LastSyncType, SyncRequest, SyncWindowResolver};
use crate::wrapper::{
    ensure_project, BuildEnvironment, EnvironmentSetup, KLOCWORK_PROJECT, KLOCWORK_URL,
};
use crate::xsync::{self, version_command, XSyncOptions};

fn exit_code(result: Result<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            error!("{:#}", e);
            1
        }
    }
}

fn process_env() -> EnvMap {
    env::vars().collect()
}

/// Variables for the job plus the full environment child processes see
fn job_environment(
    config: &KwciConfig,
    job: &JobArgs,
    initial: &EnvMap,
) -> Result<(BuildEnvironment, EnvMap)> {
    let server = config.selected_server(job.server.as_deref())?;
    let install = config.selected_install(job.install.as_deref())?;

    let setup = EnvironmentSetup {
        server,
        install,
        project: job.project.as_deref().or(config.job.project.as_deref()),
        ltoken: job.ltoken.as_deref().or(config.job.ltoken.as_deref()),
        ..EnvironmentSetup::new(&config.license)
    };

    let vars = setup.apply(initial);
    let merged = vars.merged_with(initial);
    Ok((vars, merged))
}

fn connect(config: &KwciConfig, env: &EnvMap) -> Result<KlocworkApi> {
    let url = env
        .get(KLOCWORK_URL)
        .filter(|u| !u.trim().is_empty())
        .context("No Klocwork server URL; select a server with --server or set KLOCWORK_URL")?;

    let ltoken = resolve_ltoken_path(env)?;
    debug!("Using ltoken file {}", ltoken.display());
    let credentials = Credentials::from_ltoken_file(&ltoken, url)?;

    Ok(KlocworkApi::new(url, credentials, config.request_timeout())?)
}

fn build_context(args: &HistoryArgs, env: &EnvMap) -> BuildContext {
    let from_env = BuildContext::from_env(env);
    BuildContext {
        builds_dir: args.builds_dir.clone(),
        workspace: args.workspace.clone().or(from_env.workspace),
        build_tag: args.build_tag.clone().or(from_env.build_tag),
        build_id: args.build_id.clone().or(from_env.build_id),
    }
}

pub async fn handle_env(args: &EnvArgs, config: &KwciConfig) -> i32 {
    exit_code(run_env(args, config).await)
}

async fn run_env(args: &EnvArgs, config: &KwciConfig) -> Result<()> {
    let initial = process_env();
    let (vars, merged) = job_environment(config, &args.job, &initial)?;

    if args.create_project || config.job.create_project {
        let project = vars
            .get(KLOCWORK_PROJECT)
            .context("--create-project needs a project")?;
        let url = vars.get(KLOCWORK_URL).unwrap_or_default();
        let api = connect(config, &merged)?;
        ensure_project(&api, &ProcessRunner::capturing(), url, project, &merged).await?;
    }

    let output = OutputFormatter::new(args.format.into()).format_environment(&vars)?;
    print!("{}", output);
    Ok(())
}

pub async fn handle_last_sync(args: &LastSyncArgs, config: &KwciConfig) -> i32 {
    exit_code(run_last_sync(args, config))
}

fn run_last_sync(args: &LastSyncArgs, config: &KwciConfig) -> Result<()> {
    let mode = args.mode.unwrap_or(config.xsync.last_sync_type);
    let duration = args.duration.as_deref().or(config.xsync.manual_sync.as_deref());
    let context = build_context(&args.history, &process_env());

    let request = SyncRequest::for_mode(mode, duration, &context)?;
    let fs = RealFileSystem;
    let resolver = SyncWindowResolver::new(&fs).with_timestamp_format(&config.timestamp_format);
    let cutoff = resolver.resolve(&request, Local::now())?;
    info!("Last sync ({}): {}", mode, cutoff);

    let output = OutputFormatter::new(args.format.into()).format_cutoff(mode, &cutoff)?;
    print!("{}", output);
    Ok(())
}

pub async fn handle_xsync(args: &XsyncArgs, config: &KwciConfig) -> i32 {
    exit_code(run_xsync(args, config).await)
}

fn xsync_options(args: &XsyncArgs, config: &KwciConfig) -> XSyncOptions {
    let base = &config.xsync;
    XSyncOptions {
        dry_run: args.dry_run || base.dry_run,
        last_sync_type: args.mode.unwrap_or(base.last_sync_type),
        manual_sync: args.duration.clone().or_else(|| base.manual_sync.clone()),
        project_regexp: args
            .project_regexp
            .clone()
            .unwrap_or_else(|| base.project_regexp.clone()),
        statuses: if args.statuses.is_empty() {
            base.statuses.clone()
        } else {
            args.statuses.clone()
        },
        additional_opts: args
            .additional_opts
            .clone()
            .or_else(|| base.additional_opts.clone()),
    }
}

async fn run_xsync(args: &XsyncArgs, config: &KwciConfig) -> Result<()> {
    let options = xsync_options(args, config);
    if options.project_regexp.is_empty() {
        bail!("No project regular expression; use --project-regexp or set xsync.project-regexp");
    }

    let initial = process_env();
    let (_, env) = job_environment(config, &args.job, &initial)?;
    let context = build_context(&args.history, &initial);

    let runner = ProcessRunner::streaming();
    if !args.print_only {
        runner.run_checked(&version_command(), &env, None).await?;
    }

    let api = connect(config, &env)?;
    let fs = RealFileSystem;
    let resolver = SyncWindowResolver::new(&fs).with_timestamp_format(&config.timestamp_format);
    let command = xsync::prepare(&options, &env, &api, &resolver, &context, Local::now()).await?;

    if args.print_only {
        println!("{}", command);
        return Ok(());
    }

    runner.run_checked(&command, &env, None).await?;
    info!("Cross-project synchronisation finished");
    Ok(())
}

pub async fn handle_projects(args: &ProjectsArgs, config: &KwciConfig) -> i32 {
    exit_code(run_projects(args, config).await)
}

async fn run_projects(args: &ProjectsArgs, config: &KwciConfig) -> Result<()> {
    let filter = args
        .filter
        .as_deref()
        .map(Regex::new)
        .transpose()
        .context("Invalid --filter regular expression")?;

    let (_, env) = job_environment(config, &args.job, &process_env())?;
    let api = connect(config, &env)?;

    let mut projects = api.list_projects().await?;
    if let Some(filter) = &filter {
        projects.retain(|p| filter.is_match(&p.name));
    }
    info!("{} project(s) on {}", projects.len(), api.endpoint());

    let output = OutputFormatter::new(args.format.into()).format_projects(&projects)?;
    print!("{}", output);
    Ok(())
}

pub fn handle_check(args: &CheckArgs, config: &KwciConfig) -> i32 {
    exit_code(run_check(args, config))
}

fn run_check(args: &CheckArgs, config: &KwciConfig) -> Result<()> {
    config.validate()?;
    config.selected_server(None)?;
    config.selected_install(None)?;

    if config.xsync.last_sync_type == LastSyncType::Manual {
        let configured = config
            .xsync
            .manual_sync
            .as_deref()
            .context("xsync.last-sync-type is manual but xsync.manual-sync is not set")?;
        DurationExpr::parse(configured)
            .with_context(|| format!("xsync.manual-sync \"{}\"", configured))?;
    }

    for duration in &args.durations {
        let expr = DurationExpr::parse(duration)?;
        info!("Duration \"{}\" is valid ({})", duration, expr);
    }

    let format: OutputFormat = args.format.into();
    if format != OutputFormat::Human {
        print!("{}", OutputFormatter::new(format).format_config(config)?);
    } else {
        println!("Configuration OK");
    }
    Ok(())
}
