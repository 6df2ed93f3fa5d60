//! CLI entry point for mediafetch.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use mediafetch_core::{
    Dispatcher, FileConfig, FormatHint, JobStatus, JobView, ManagerConfig, default_config_path,
};
use tracing::debug;

mod cli;

use cli::{Args, Command};

const POLL_INTERVAL: Duration = Duration::from_millis(200);

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let config = resolve_config(&args)?;
    debug!(?config, "configuration resolved");

    let dispatcher = Dispatcher::new(&config)
        .await
        .context("failed to initialize job manager")?;

    match args.command {
        Command::Add { url, format } => add(&dispatcher, &url, format, args.quiet).await,
        Command::List { json } => list(&dispatcher, json).await,
        Command::Show { id, json } => show(&dispatcher, &id, json).await,
        Command::Remove { id } => {
            if dispatcher.remove(&id).await? {
                println!("removed {id}");
            } else {
                println!("no job {id}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Path { id } => match dispatcher.resolve_file(&id).await? {
            Some(path) => {
                println!("{}", path.display());
                Ok(ExitCode::SUCCESS)
            }
            None => {
                eprintln!("no completed file for job {id}");
                Ok(ExitCode::FAILURE)
            }
        },
        Command::Clear => {
            let removed = dispatcher.clear().await?;
            println!("removed {removed} jobs");
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Defaults, then the config file, then command-line flags.
fn resolve_config(args: &Args) -> Result<ManagerConfig> {
    let mut config = ManagerConfig::from_env()?;

    let file_path = args.config.clone().or_else(default_config_path);
    if let Some(path) = file_path {
        match FileConfig::load(&path)? {
            Some(file) => {
                debug!(path = %path.display(), "loaded config file");
                config.apply_file(&file);
            }
            None if args.config.is_some() => {
                bail!("config file '{}' does not exist", path.display());
            }
            None => {}
        }
    }

    if let Some(dir) = &args.download_dir {
        config.download_dir.clone_from(dir);
    }
    if let Some(db) = &args.database {
        config.database_path.clone_from(db);
    }
    Ok(config)
}

async fn add(
    dispatcher: &Dispatcher,
    url: &str,
    format: FormatHint,
    quiet: bool,
) -> Result<ExitCode> {
    let id = dispatcher.submit(url, format).await?;

    let bar = if quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(100)
    };
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{bar:40}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar.enable_steady_tick(Duration::from_millis(100));

    let last = dispatcher
        .watch(&id, POLL_INTERVAL, |view| {
            bar.set_position(u64::from(view.progress));
            bar.set_message(format!("{} {}", view.status, view.filename));
        })
        .await?;
    bar.finish_and_clear();

    match last {
        Some(view) if view.status == JobStatus::Completed => {
            println!("{}", view.filepath);
            Ok(ExitCode::SUCCESS)
        }
        Some(view) => {
            eprintln!(
                "job {id} failed: {}",
                view.error.as_deref().unwrap_or("unknown error")
            );
            Ok(ExitCode::FAILURE)
        }
        None => {
            eprintln!("job {id} was removed before it finished");
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn list(dispatcher: &Dispatcher, json: bool) -> Result<ExitCode> {
    let jobs = dispatcher.list().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&jobs)?);
        return Ok(ExitCode::SUCCESS);
    }

    println!(
        "{:<16}  {:<11}  {:>4}  {:<4}  FILENAME",
        "ID", "STATUS", "PCT", "FMT"
    );
    for job in &jobs {
        print_row(job);
    }
    Ok(ExitCode::SUCCESS)
}

async fn show(dispatcher: &Dispatcher, id: &str, json: bool) -> Result<ExitCode> {
    let Some(job) = dispatcher.get(id).await? else {
        eprintln!("no job {id}");
        return Ok(ExitCode::FAILURE);
    };
    if json {
        println!("{}", serde_json::to_string_pretty(&job)?);
        return Ok(ExitCode::SUCCESS);
    }

    println!("id:           {}", job.id);
    println!("url:          {}", job.url);
    println!("status:       {}", job.status);
    println!("progress:     {}%", job.progress);
    println!("format:       {}", job.format);
    println!("filename:     {}", job.filename);
    println!("filepath:     {}", job.filepath);
    println!("size:         {}", job.size);
    println!("downloaded:   {}", job.downloaded);
    println!("created_at:   {}", job.created_at.to_rfc3339());
    if let Some(completed_at) = job.completed_at {
        println!("completed_at: {}", completed_at.to_rfc3339());
    }
    if let Some(error) = &job.error {
        println!("error:        {error}");
    }
    Ok(ExitCode::SUCCESS)
}

fn print_row(job: &JobView) {
    println!(
        "{:<16}  {:<11}  {:>3}%  {:<4}  {}",
        job.id,
        job.status.as_str(),
        job.progress,
        job.format.as_str(),
        job.filename
    );
}
