use anyhow::{anyhow, Context};
use catalog_import::config::ImportConfig;
use catalog_types::import_job::{ImportJobStatus, ImportJobView};
use indicatif::{ProgressBar, ProgressStyle};
use std::env;
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;
use uuid::Uuid;

const USAGE: &str = "Usage:
    catalog-import import <file.csv>
    catalog-import status <job-id>
    catalog-import jobs";

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    if let Err(env::VarError::NotPresent) = env::var("RUST_LOG") {
        env::set_var("RUST_LOG", "INFO");
    }
    pretty_env_logger::formatted_timed_builder()
        .parse_default_env()
        .init();

    match std::fs::File::open(".env") {
        Ok(_) => envmnt::load_file(".env")?,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            std::fs::File::create(".env")?;
            envmnt::load_file(".env")?;
        }
        Err(err) => {
            return Err(anyhow!("Unable to open .env file: {err}"));
        }
    }

    let config = ImportConfig::from_env();
    let args: Vec<String> = env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    let service = catalog_import::build_service(&config)
        .await
        .with_context(|| format!("Unable to open catalog at {}", config.db_path.display()))?;

    match args.as_slice() {
        ["import", path] => {
            let view = import(&service, PathBuf::from(path)).await?;
            println!("{}", serde_json::to_string_pretty(&view)?);
            if view.status == ImportJobStatus::Failed {
                std::process::exit(1);
            }
        }
        ["status", id] => {
            let id = Uuid::parse_str(id).context("Invalid job id")?;
            let view = service
                .status(id)
                .await?
                .ok_or_else(|| anyhow!("Import job {id} not found"))?;
            println!("{}", serde_json::to_string_pretty(&view)?);
        }
        ["jobs"] => {
            for job in service.list().await? {
                println!(
                    "{}\t{}\t{:>3}%\t{}",
                    job.id, job.status, job.progress, job.message
                );
            }
        }
        _ => {
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    }
    Ok(())
}

async fn import(
    service: &catalog_import::ImportService,
    path: PathBuf,
) -> Result<ImportJobView, anyhow::Error> {
    let mut updates = service.subscribe();
    let mut ticket = service.submit(path).await?;

    let pb = ProgressBar::new(100);
    match ProgressStyle::default_bar().template("[{elapsed_precise}] {bar:40} {pos:>3}% {msg}") {
        Ok(style) => pb.set_style(style.progress_chars("=-")),
        Err(err) => log::warn!("Unable to initialize progress bar: {err}"),
    }
    let res = loop {
        tokio::select! {
            res = &mut ticket.handle => break res?,
            update = updates.recv() => match update {
                Ok(job) if job.id == ticket.job_id => {
                    pb.set_position(job.progress.into());
                    pb.set_message(job.message);
                }
                Ok(_) => {}
                Err(RecvError::Lagged(n)) => log::debug!("Skipped {n} progress updates"),
                Err(RecvError::Closed) => {}
            },
        }
    };
    pb.finish();

    match res {
        Ok(summary) => log::info!("{summary}"),
        Err(err) => log::error!("Import failed: {err}"),
    }
    service
        .status(ticket.job_id)
        .await?
        .ok_or_else(|| anyhow!("Import job {} disappeared", ticket.job_id))
}
