mod daemon;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use anacrond_config::Config;
use anacrond_cron::JobManager;
use anacrond_exec::ExecutionLog;
use anacrond_store::JobStore;

#[derive(Parser)]
#[command(name = "anacrond", about = "Anacron-style job scheduler")]
struct Cli {
    /// Config file path (defaults to ~/.anacrond/config.json5)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the scheduler daemon
    Run,
    /// Add a job
    Add {
        /// Five-field cron-style schedule, e.g. "0 0 * * *"
        #[arg(short, long)]
        schedule: String,

        /// Script filename (run from the script directory) or shell command
        #[arg(long)]
        command: String,

        /// Skip execution notifications for this job
        #[arg(long)]
        no_notify: bool,
    },
    /// List jobs and their last attempted run
    List,
    /// Remove a job and its run state
    Remove {
        /// Job id
        job_id: i64,
    },
    /// Re-enable a disabled job
    Enable {
        /// Job id
        job_id: i64,
    },
    /// Disable a job without removing it
    Disable {
        /// Job id
        job_id: i64,
    },
    /// Force one evaluation pass right now
    RunNow,
    /// List scripts available for scheduling
    Scripts,
    /// Show the tail of the execution log
    Logs {
        /// Number of lines
        #[arg(short = 'n', long, default_value_t = 50)]
        lines: usize,
    },
    /// Clear the execution log
    ClearLogs,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<Config> {
    Ok(match path {
        Some(p) => anacrond_config::load_config_from(p)?,
        None => anacrond_config::load_config()?,
    })
}

fn build_manager(config: &Config) -> anyhow::Result<(JobManager, Arc<JobStore>)> {
    anacrond_config::ensure_data_dir(config)?;
    let store = Arc::new(JobStore::open(&config.db_path()?)?);
    let log = Arc::new(ExecutionLog::new(config.log_path()?));
    let manager = JobManager::new(store.clone(), log, config.script_dir()?);
    Ok((manager, store))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Run => daemon::run(config).await?,
        Commands::RunNow => daemon::run_once(config).await?,
        Commands::Add {
            schedule,
            command,
            no_notify,
        } => {
            let (manager, _) = build_manager(&config)?;
            let job = manager.create_job(&schedule, &command, !no_notify)?;
            println!("added job #{} ({} -> every {}d)", job.id, job.schedule, job.interval_days);
        }
        Commands::List => {
            let (manager, store) = build_manager(&config)?;
            let jobs = manager.list_jobs()?;
            if jobs.is_empty() {
                println!("no jobs");
                return Ok(());
            }
            println!(
                "{:<5} {:<9} {:<9} {:<16} {:<26} {}",
                "ID", "STATUS", "INTERVAL", "SCHEDULE", "LAST ATTEMPT", "COMMAND"
            );
            for job in jobs {
                let last = store
                    .last_attempt(job.id)?
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<5} {:<9} {:<9} {:<16} {:<26} {}",
                    job.id,
                    job.status.as_str(),
                    format!("{}d", job.interval_days),
                    job.schedule,
                    last,
                    job.command
                );
            }
        }
        Commands::Remove { job_id } => {
            let (manager, _) = build_manager(&config)?;
            let job = manager.delete_job(job_id)?;
            println!("removed job #{} ({})", job.id, job.command);
        }
        Commands::Enable { job_id } => {
            let (manager, _) = build_manager(&config)?;
            manager.set_enabled(job_id, true)?;
            println!("job #{job_id} enabled");
        }
        Commands::Disable { job_id } => {
            let (manager, _) = build_manager(&config)?;
            manager.set_enabled(job_id, false)?;
            println!("job #{job_id} disabled");
        }
        Commands::Scripts => {
            let (manager, _) = build_manager(&config)?;
            let scripts = manager.scripts();
            if scripts.is_empty() {
                println!("no scripts in {}", config.script_dir()?.display());
            } else {
                for script in scripts {
                    println!("{script}");
                }
            }
        }
        Commands::Logs { lines } => {
            let log = ExecutionLog::new(config.log_path()?);
            for line in log.tail(lines)? {
                println!("{line}");
            }
        }
        Commands::ClearLogs => {
            let log = ExecutionLog::new(config.log_path()?);
            log.clear()?;
            println!("execution log cleared");
        }
    }

    Ok(())
}
