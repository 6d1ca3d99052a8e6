use crate::sync::LastSyncType;
use crate::xsync::IssueStatus;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Klocwork CI helper
#[derive(Parser, Debug)]
#[command(
    name = "kwci",
    about = "Klocwork CI helper: environment setup, incremental cross-sync and project management",
    version,
    long_about = "kwci prepares the KLOCWORK_* environment for CI jobs, works out the incremental \
                  synchronisation window from the job's build history, and drives the Klocwork \
                  command-line tools (kwxsync, kwadmin) and web API."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        short = 'c',
        long,
        global = true,
        value_name = "FILE",
        help = "Configuration file (defaults to $KWCI_CONFIG, then ./kwci.toml)"
    )]
    pub config: Option<PathBuf>,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Verbose logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Print the Klocwork environment for a job",
        long_about = "Works out KLOCWORK_URL, the license settings, KLOCWORK_PROJECT, PATH and \
                      KLOCWORK_LTOKEN for the selected server and install, and prints them.\n\n\
                      Examples:\n  \
                      eval \"$(kwci env --server main --project app)\"\n  \
                      kwci env --format json\n  \
                      kwci env --project app --create-project"
    )]
    Env(EnvArgs),

    #[command(
        about = "Resolve the last-sync cutoff",
        long_about = "Prints the value passed to kwxsync as --last-sync, or 'full' when there is \
                      no earlier build to start from.\n\n\
                      Examples:\n  \
                      kwci last-sync --mode manual --duration 2d3h\n  \
                      kwci last-sync --mode last-success --builds-dir /var/jenkins/jobs/app/builds\n  \
                      kwci last-sync --mode last-build --build-id 42 --workspace $WORKSPACE --build-tag $BUILD_TAG"
    )]
    LastSync(LastSyncArgs),

    #[command(
        about = "Run kwxsync over the matching server projects",
        long_about = "Lists the server's projects, keeps those matching the project regular \
                      expression, resolves the sync window and runs kwxsync.\n\n\
                      Examples:\n  \
                      kwci xsync --project-regexp '^app' --mode last-success\n  \
                      kwci xsync --mode manual --duration 1d --status fix --status defer --print-only"
    )]
    Xsync(XsyncArgs),

    #[command(
        about = "List the server's projects",
        long_about = "Queries the Klocwork web API for its projects.\n\n\
                      Examples:\n  \
                      kwci projects\n  \
                      kwci projects --filter '^core' --format json"
    )]
    Projects(ProjectsArgs),

    #[command(
        about = "Validate configuration and duration expressions",
        long_about = "Checks the configuration file and any given duration expressions, \
                      exiting non-zero at the first problem.\n\n\
                      Examples:\n  \
                      kwci check\n  \
                      kwci check --duration 2d3h --duration 1mo"
    )]
    Check(CheckArgs),
}

/// Server, install and project selection shared by the job-level commands
#[derive(Args, Debug, Clone, Default)]
pub struct JobArgs {
    #[arg(short = 's', long, value_name = "NAME", help = "Server configuration name")]
    pub server: Option<String>,

    #[arg(short = 'i', long, value_name = "NAME", help = "Install configuration name")]
    pub install: Option<String>,

    #[arg(short = 'p', long, value_name = "PROJECT", help = "Klocwork project")]
    pub project: Option<String>,

    #[arg(long, value_name = "FILE", help = "Ltoken file ($VAR references are expanded)")]
    pub ltoken: Option<String>,
}

/// Where the job sits in the CI host's build history
#[derive(Args, Debug, Clone, Default)]
pub struct HistoryArgs {
    #[arg(long, value_name = "DIR", help = "Builds directory of the job")]
    pub builds_dir: Option<PathBuf>,

    #[arg(long, value_name = "ID", help = "Current build number (defaults to $BUILD_ID)")]
    pub build_id: Option<String>,

    #[arg(long, value_name = "DIR", help = "Job workspace (defaults to $WORKSPACE)")]
    pub workspace: Option<PathBuf>,

    #[arg(long, value_name = "TAG", help = "Build tag (defaults to $BUILD_TAG)")]
    pub build_tag: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct EnvArgs {
    #[command(flatten)]
    pub job: JobArgs,

    #[arg(long, help = "Create the project on the server when it does not exist")]
    pub create_project: bool,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "shell",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(Args, Debug, Clone)]
pub struct LastSyncArgs {
    #[arg(
        short = 'm',
        long,
        value_parser = parse_sync_type,
        help = "manual, last-build, last-success or full"
    )]
    pub mode: Option<LastSyncType>,

    #[arg(short = 'd', long, value_name = "EXPR", help = "Duration for manual mode, e.g. 2d3h")]
    pub duration: Option<String>,

    #[command(flatten)]
    pub history: HistoryArgs,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(Args, Debug, Clone)]
pub struct XsyncArgs {
    #[command(flatten)]
    pub job: JobArgs,

    #[arg(
        short = 'm',
        long,
        value_parser = parse_sync_type,
        help = "manual, last-build, last-success or full"
    )]
    pub mode: Option<LastSyncType>,

    #[arg(short = 'd', long, value_name = "EXPR", help = "Duration for manual mode, e.g. 2d3h")]
    pub duration: Option<String>,

    #[arg(short = 'r', long, value_name = "REGEX", help = "Projects to synchronise")]
    pub project_regexp: Option<String>,

    #[arg(
        long = "status",
        value_name = "STATUS",
        value_parser = parse_status,
        help = "Only synchronise issues with this status (repeatable)"
    )]
    pub statuses: Vec<IssueStatus>,

    #[arg(long, help = "Pass --dry to kwxsync")]
    pub dry_run: bool,

    #[arg(long, value_name = "OPTIONS", allow_hyphen_values = true, help = "Extra kwxsync options")]
    pub additional_opts: Option<String>,

    #[command(flatten)]
    pub history: HistoryArgs,

    #[arg(long, help = "Print the kwxsync command instead of running it")]
    pub print_only: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ProjectsArgs {
    #[command(flatten)]
    pub job: JobArgs,

    #[arg(long, value_name = "REGEX", help = "Only list matching projects")]
    pub filter: Option<String>,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    #[arg(
        short = 'd',
        long = "duration",
        value_name = "EXPR",
        help = "Duration expression to validate (repeatable)"
    )]
    pub durations: Vec<String>,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "human",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Shell,
    Json,
    Yaml,
    Human,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Shell => super::output::OutputFormat::Shell,
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Yaml => super::output::OutputFormat::Yaml,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
        }
    }
}

fn parse_sync_type(s: &str) -> Result<LastSyncType, String> {
    s.parse::<LastSyncType>().map_err(|_| {
        format!(
            "Invalid last sync type: {}. Valid options: manual, last-build, last-success, full",
            s
        )
    })
}

fn parse_status(s: &str) -> Result<IssueStatus, String> {
    s.parse::<IssueStatus>().map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_args_verify() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn test_default_env_args() {
        let args = CliArgs::parse_from(["kwci", "env"]);
        match args.command {
            Commands::Env(env_args) => {
                assert_eq!(env_args.format, OutputFormatArg::Shell);
                assert!(!env_args.create_project);
                assert!(env_args.job.server.is_none());
                assert!(env_args.job.project.is_none());
            }
            _ => panic!("Expected Env command"),
        }
    }

    #[test]
    fn test_env_with_options() {
        let args = CliArgs::parse_from([
            "kwci",
            "env",
            "--server",
            "main",
            "--install",
            "kw-2023",
            "--project",
            "app",
            "--ltoken",
            "$HOME/.klocwork/ltoken",
            "--create-project",
            "--format",
            "json",
        ]);

        match args.command {
            Commands::Env(env_args) => {
                assert_eq!(env_args.job.server.as_deref(), Some("main"));
                assert_eq!(env_args.job.install.as_deref(), Some("kw-2023"));
                assert_eq!(env_args.job.project.as_deref(), Some("app"));
                assert_eq!(env_args.job.ltoken.as_deref(), Some("$HOME/.klocwork/ltoken"));
                assert!(env_args.create_project);
                assert_eq!(env_args.format, OutputFormatArg::Json);
            }
            _ => panic!("Expected Env command"),
        }
    }

    #[test]
    fn test_last_sync_args() {
        let args = CliArgs::parse_from([
            "kwci",
            "last-sync",
            "--mode",
            "last-build",
            "--build-id",
            "42",
            "--builds-dir",
            "/var/ci/jobs/app/builds",
        ]);

        match args.command {
            Commands::LastSync(sync_args) => {
                assert_eq!(sync_args.mode, Some(LastSyncType::LastBuild));
                assert_eq!(sync_args.history.build_id.as_deref(), Some("42"));
                assert_eq!(
                    sync_args.history.builds_dir,
                    Some(PathBuf::from("/var/ci/jobs/app/builds"))
                );
                assert_eq!(sync_args.format, OutputFormatArg::Human);
            }
            _ => panic!("Expected LastSync command"),
        }
    }

    #[test]
    fn test_invalid_sync_type() {
        let result = CliArgs::try_parse_from(["kwci", "last-sync", "--mode", "sometimes"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_xsync_args() {
        let args = CliArgs::parse_from([
            "kwci",
            "xsync",
            "--mode",
            "manual",
            "--duration",
            "1d",
            "--project-regexp",
            "^app",
            "--status",
            "fix",
            "--status",
            "Not a Problem",
            "--dry-run",
            "--additional-opts",
            "--max-issues 10",
            "--print-only",
        ]);

        match args.command {
            Commands::Xsync(xsync_args) => {
                assert_eq!(xsync_args.mode, Some(LastSyncType::Manual));
                assert_eq!(xsync_args.duration.as_deref(), Some("1d"));
                assert_eq!(xsync_args.project_regexp.as_deref(), Some("^app"));
                assert_eq!(
                    xsync_args.statuses,
                    vec![IssueStatus::Fix, IssueStatus::NotAProblem]
                );
                assert!(xsync_args.dry_run);
                assert_eq!(xsync_args.additional_opts.as_deref(), Some("--max-issues 10"));
                assert!(xsync_args.print_only);
            }
            _ => panic!("Expected Xsync command"),
        }
    }

    #[test]
    fn test_projects_args() {
        let args = CliArgs::parse_from(["kwci", "projects", "--filter", "^core", "-f", "yaml"]);
        match args.command {
            Commands::Projects(projects_args) => {
                assert_eq!(projects_args.filter.as_deref(), Some("^core"));
                assert_eq!(projects_args.format, OutputFormatArg::Yaml);
            }
            _ => panic!("Expected Projects command"),
        }
    }

    #[test]
    fn test_check_args() {
        let args = CliArgs::parse_from(["kwci", "check", "-d", "2d3h", "-d", "1mo"]);
        match args.command {
            Commands::Check(check_args) => {
                assert_eq!(check_args.durations, vec!["2d3h", "1mo"]);
            }
            _ => panic!("Expected Check command"),
        }
    }

    #[test]
    fn test_global_flags() {
        let args = CliArgs::parse_from(["kwci", "-v", "--config", "/etc/kwci.toml", "check"]);
        assert!(args.verbose);
        assert!(!args.quiet);
        assert_eq!(args.config, Some(PathBuf::from("/etc/kwci.toml")));

        let args = CliArgs::parse_from(["kwci", "check", "-q"]);
        assert!(args.quiet);
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(CliArgs::try_parse_from(["kwci", "-v", "-q", "check"]).is_err());
    }

    #[test]
    fn test_log_level_flag() {
        let args = CliArgs::parse_from(["kwci", "--log-level", "debug", "check"]);
        assert_eq!(args.log_level, Some("debug".to_string()));
    }
}
