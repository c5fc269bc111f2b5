use aec::commands::{agents, images, instances, network, Listing, Selection};
use aec::config::Config;
use aec::output::OutputFormat;
use aec::provider::{format_provider_error, ProviderClient};
use aec::resource::{get_family, QueryEngine, QueryError, SortMode};
use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;

/// Describe cloud compute instances, images and managed agents
#[derive(Parser, Debug)]
#[command(name = "aec", version = aec::VERSION, about, long_about = None)]
struct Args {
    /// Output format
    #[arg(long, global = true, value_enum, default_value = "table")]
    output: OutputFormat,

    /// Profile to use instead of the config file's default_profile
    #[arg(long, global = true)]
    config: Option<String>,

    /// Config file to read instead of the default location
    #[arg(long, global = true)]
    config_file: Option<PathBuf>,

    /// Log level for debugging
    #[arg(long, global = true, value_enum, default_value = "off")]
    log_level: LogLevel,

    /// Sort by the concatenated sort columns
    #[arg(long, global = true)]
    legacy_sort: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Instances, volumes and status checks
    Ec2 {
        #[command(subcommand)]
        command: Ec2Command,
    },
    /// Machine images
    Ami {
        #[command(subcommand)]
        command: AmiCommand,
    },
    /// Managed agents
    Ssm {
        #[command(subcommand)]
        command: SsmCommand,
    },
}

#[derive(Subcommand, Debug)]
enum Ec2Command {
    /// List instances
    Describe {
        /// Instance ids or names
        #[arg(value_parser = parse_identifier)]
        idents: Vec<String>,
        /// Filter to names containing this substring
        #[arg(short = 'q', long)]
        name_match: Option<String>,
        /// Include terminated instances
        #[arg(long)]
        include_terminated: bool,
        /// Only pending and running instances
        #[arg(short, long)]
        running: bool,
        /// Comma separated columns to sort by
        #[arg(short, long, value_delimiter = ',')]
        sort_by: Option<Vec<String>>,
        /// Comma separated columns to show, e.g. Id,Name,Volumes,Image.CreationDate
        #[arg(short, long, value_delimiter = ',')]
        columns: Option<Vec<String>>,
    },
    /// List instances or volumes with their tags
    Tags {
        #[arg(value_parser = parse_identifier)]
        idents: Vec<String>,
        #[arg(short = 'q', long)]
        name_match: Option<String>,
        /// Tag keys to show as columns
        #[arg(short, long)]
        keys: Vec<String>,
        /// List volumes instead of instances
        #[arg(long)]
        volumes: bool,
    },
    /// Instance status checks
    Status {
        #[arg(value_parser = parse_identifier)]
        idents: Vec<String>,
        #[arg(short = 'q', long)]
        name_match: Option<String>,
    },
    /// List launch templates
    Templates,
    /// List security groups
    SecGroups {
        /// Only groups in this VPC
        #[arg(long)]
        vpc_id: Option<String>,
    },
    /// List subnets
    Subnets {
        /// Only subnets in this VPC
        #[arg(long)]
        vpc_id: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum AmiCommand {
    /// List images, newest first
    Describe {
        /// Image id or name
        #[arg(value_parser = parse_identifier)]
        idents: Vec<String>,
        /// Owning account
        #[arg(long)]
        owner: Option<String>,
        #[arg(short = 'q', long)]
        name_match: Option<String>,
        /// Show the root volume's snapshot id
        #[arg(long)]
        show_snapshot_id: bool,
    },
    /// List images with their tags
    Tags {
        #[arg(value_parser = parse_identifier)]
        idents: Vec<String>,
        #[arg(long)]
        owner: Option<String>,
        #[arg(short = 'q', long)]
        name_match: Option<String>,
        #[arg(short, long)]
        keys: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
enum SsmCommand {
    /// List agents on running instances
    Describe {
        #[arg(value_parser = parse_identifier)]
        idents: Vec<String>,
        #[arg(short = 'q', long)]
        name_match: Option<String>,
    },
    /// Patch summary for all instances
    PatchSummary,
    /// Patch compliance summary
    ComplianceSummary,
    /// List run commands
    Commands {
        /// Only commands sent to this instance id or name
        #[arg(value_parser = parse_identifier)]
        ident: Option<String>,
    },
    /// List the invocations of one command
    Invocations {
        command_id: String,
    },
}

fn parse_identifier(value: &str) -> Result<String, String> {
    if value.is_empty() {
        return Err(QueryError::EmptyIdentifier.to_string());
    }
    Ok(value.to_string())
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let tracing_level = level.to_tracing_level()?;

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Warning: cannot open log file {}: {}", log_path.display(), e);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_max_level(tracing_level)
        .with_writer(non_blocking.with_max_level(tracing_level))
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("aec started with log level: {:?}", level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("aec").join("aec.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".aec").join("aec.log");
    }
    PathBuf::from("aec.log")
}

/// Operator-facing text for a failed command
fn error_message(err: &anyhow::Error) -> String {
    match err.downcast_ref::<QueryError>() {
        Some(QueryError::Upstream(inner)) => format_provider_error(inner),
        Some(other) => other.to_string(),
        None => format!("{:#}", err),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{:#}", err);
            eprintln!("Error: {}", error_message(&err));
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config = Config::load(args.config_file.as_deref())?;
    let (profile_name, profile) = config.profile(args.config.as_deref())?;
    let profile = profile.with_env_overrides();

    tracing::info!("Using profile: {}", profile_name);

    let client = ProviderClient::new(profile.endpoint()?, profile.region()?)?;
    let sort_mode = if args.legacy_sort {
        SortMode::Concatenated
    } else {
        profile.sort_mode()
    };
    let engine = QueryEngine::new(client)
        .with_page_size(profile.page_size)
        .with_sort_mode(sort_mode);

    let listing: Listing = match args.command {
        Command::Ec2 { command } => match command {
            Ec2Command::Describe {
                idents,
                name_match,
                include_terminated,
                running,
                sort_by,
                columns,
            } => {
                let options = instances::DescribeOptions {
                    selection: Selection::new(idents, name_match),
                    include_terminated,
                    running_only: running,
                    sort_by,
                    columns,
                };
                instances::describe(&engine, options).await?
            }
            Ec2Command::Tags {
                idents,
                name_match,
                keys,
                volumes,
            } => {
                instances::describe_tags(&engine, Selection::new(idents, name_match), &keys, volumes)
                    .await?
            }
            Ec2Command::Status { idents, name_match } => {
                instances::status(&engine, Selection::new(idents, name_match)).await?
            }
            Ec2Command::Templates => instances::templates(&engine).await?,
            Ec2Command::SecGroups { vpc_id } => {
                network::security_groups(&engine, vpc_id.as_deref()).await?
            }
            Ec2Command::Subnets { vpc_id } => network::subnets(&engine, vpc_id.as_deref()).await?,
        },
        Command::Ami { command } => match command {
            AmiCommand::Describe {
                idents,
                owner,
                name_match,
                show_snapshot_id,
            } => {
                let columns = show_snapshot_id
                    .then(|| get_family("images"))
                    .flatten()
                    .map(|family| {
                        let mut columns = family.default_columns.clone();
                        columns.push("SnapshotId".to_string());
                        columns
                    });
                let options = images::ImageOptions {
                    selection: Selection::new(idents, name_match),
                    owner,
                };
                images::describe(&engine, &profile, options, columns).await?
            }
            AmiCommand::Tags {
                idents,
                owner,
                name_match,
                keys,
            } => {
                let options = images::ImageOptions {
                    selection: Selection::new(idents, name_match),
                    owner,
                };
                images::describe_tags(&engine, &profile, options, &keys).await?
            }
        },
        Command::Ssm { command } => match command {
            SsmCommand::Describe { idents, name_match } => {
                agents::describe(&engine, Selection::new(idents, name_match)).await?
            }
            SsmCommand::PatchSummary => agents::patch_summary(&engine).await?,
            SsmCommand::ComplianceSummary => agents::compliance_summary(&engine).await?,
            SsmCommand::Commands { ident } => agents::commands(&engine, ident.as_deref()).await?,
            SsmCommand::Invocations { command_id } => {
                agents::invocations(&engine, &command_id).await?
            }
        },
    };

    tracing::info!("{} rows", listing.len());

    let mut stdout = std::io::stdout().lock();
    listing.render(&mut stdout, args.output)?;
    Ok(())
}
