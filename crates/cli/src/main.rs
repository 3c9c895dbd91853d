//! Operator tooling for the tape catalogue: list archive files, list and
//! restore recycle-log entries, purge a volume from the recycle log.

mod config;
mod error;

use crate::config::Config;
use crate::error::{ErrorKind, Result};
use clap::{Parser, Subcommand};
use exn::ResultExt;
use futures::StreamExt;
use std::path::PathBuf;
use std::process::ExitCode;
use tapecat_catalogue::{Catalogue, Database, Dialect, RdbmsCatalogue, RetryingCatalogue};
use tapecat_common::{ArchiveFileSearchCriteria, RecycleTapeFileSearchCriteria};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "tapecat", version, about = "Tape catalogue operator tooling")]
struct Cli {
    /// Path of the configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Path of the catalogue database, overriding the configuration.
    #[arg(long, global = true)]
    database: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Operations on live archive files.
    Archive {
        #[command(subcommand)]
        command: ArchiveCommand,
    },
    /// Operations on the recycle log.
    Recycle {
        #[command(subcommand)]
        command: RecycleCommand,
    },
}

#[derive(Debug, Subcommand)]
enum ArchiveCommand {
    /// List archive files and their tape copies.
    Ls {
        /// Archive-file id.
        #[arg(long)]
        id: Option<u64>,
        /// Disk instance name.
        #[arg(long)]
        instance: Option<String>,
        /// Volume with at least one copy of the file.
        #[arg(long)]
        vid: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum RecycleCommand {
    /// List recycle-log entries.
    Ls {
        #[arg(long)]
        vid: Option<String>,
        /// Archive-file id.
        #[arg(long)]
        id: Option<u64>,
        #[arg(long)]
        instance: Option<String>,
        #[arg(long)]
        copynb: Option<u32>,
        /// Virtual organization.
        #[arg(long)]
        vo: Option<String>,
    },
    /// Restore one recycle-log entry back to a live tape file.
    Restore {
        /// Hexadecimal disk file id of the deleted file.
        #[arg(long)]
        fxid: String,
        #[arg(long)]
        vid: Option<String>,
        /// Archive-file id.
        #[arg(long)]
        id: Option<u64>,
        #[arg(long)]
        copynb: Option<u32>,
        #[arg(long)]
        instance: Option<String>,
    },
    /// Permanently purge every recycle-log entry of a volume.
    Purge {
        #[arg(long)]
        vid: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("tapecat: {}", *err);
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    let database = cli.database.unwrap_or(config.database);
    tracing::debug!(database = %database.display(), "opening catalogue database");
    let db = from_catalogue(Database::connect(&database).await)?;
    let catalogue = RetryingCatalogue::with_max_tries(
        RdbmsCatalogue::new(db, Dialect::Sqlite),
        config.max_tries,
    );
    match cli.command {
        Command::Archive { command: ArchiveCommand::Ls { id, instance, vid } } => {
            let criteria = ArchiveFileSearchCriteria {
                archive_file_id: id,
                disk_instance: instance,
                vid,
                disk_file_ids: None,
            };
            list_archive_files(&catalogue, criteria).await
        },
        Command::Recycle { command } => match command {
            RecycleCommand::Ls { vid, id, instance, copynb, vo } => {
                let criteria = RecycleTapeFileSearchCriteria {
                    archive_file_id: id,
                    disk_instance: instance,
                    vid,
                    copy_nb: copynb,
                    vo,
                    ..Default::default()
                };
                list_recycle_log(&catalogue, criteria).await
            },
            RecycleCommand::Restore { fxid, vid, id, copynb, instance } => {
                if vid.is_none() && id.is_none() {
                    exn::bail!(ErrorKind::Usage(
                        "restore needs at least one of --vid or --id besides --fxid"
                    ));
                }
                let disk_file_id = parse_fxid(&fxid)?.to_string();
                let criteria = RecycleTapeFileSearchCriteria {
                    archive_file_id: id,
                    disk_instance: instance,
                    vid,
                    disk_file_ids: Some(vec![disk_file_id.clone()]),
                    copy_nb: copynb,
                    ..Default::default()
                };
                from_catalogue(
                    catalogue.restore_file_in_recycle_log(criteria, &disk_file_id).await,
                )?;
                println!("restored file {disk_file_id}");
                Ok(())
            },
            RecycleCommand::Purge { vid } => {
                from_catalogue(catalogue.delete_files_from_recycle_log(&vid).await)?;
                println!("purged recycle log for volume {vid}");
                Ok(())
            },
        },
    }
}

async fn list_archive_files(
    catalogue: &impl Catalogue,
    criteria: ArchiveFileSearchCriteria,
) -> Result<()> {
    let mut files = from_catalogue(catalogue.archive_files_itor(criteria).await)?;
    while let Some(file) = files.next().await {
        let file = from_catalogue(file)?;
        for tape_file in &file.tape_files {
            println!(
                "{}\t{}\t{}\t{}\t{}\t{:08x}\t{}\t{}\t{}",
                file.archive_file_id,
                file.disk_instance_name,
                file.disk_file_id,
                file.storage_class,
                file.size_in_bytes,
                file.checksum_adler32,
                tape_file.vid,
                tape_file.fseq,
                tape_file.copy_nb,
            );
        }
    }
    Ok(())
}

async fn list_recycle_log(
    catalogue: &impl Catalogue,
    criteria: RecycleTapeFileSearchCriteria,
) -> Result<()> {
    let mut entries = from_catalogue(catalogue.file_recycle_log_itor(criteria).await)?;
    while let Some(entry) = entries.next().await {
        let entry = from_catalogue(entry)?;
        println!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            entry.file_recycle_log_id,
            entry.archive_file_id,
            entry.disk_instance_name,
            entry.disk_file_id_when_deleted,
            entry.vid,
            entry.fseq,
            entry.copy_nb,
            format_epoch(entry.recycle_log_time),
            entry.reason_log,
        );
    }
    Ok(())
}

fn parse_fxid(fxid: &str) -> Result<u64> {
    u64::from_str_radix(fxid.trim_start_matches("0x"), 16)
        .or_raise(|| ErrorKind::Usage("--fxid is not a hexadecimal file id"))
}

fn format_epoch(seconds: u64) -> String {
    i64::try_from(seconds)
        .ok()
        .and_then(|seconds| OffsetDateTime::from_unix_timestamp(seconds).ok())
        .and_then(|timestamp| timestamp.format(&Rfc3339).ok())
        .unwrap_or_else(|| seconds.to_string())
}

fn from_catalogue<T>(result: tapecat_catalogue::error::Result<T>) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(err) => {
            let message = (*err).to_string();
            Err(err).or_raise(|| ErrorKind::Catalogue(message))
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("2a", 42)]
    #[case("0x2a", 42)]
    #[case("DEADBEEF", 0xdead_beef)]
    fn test_parse_fxid(#[case] fxid: &str, #[case] expected: u64) {
        assert_eq!(parse_fxid(fxid).unwrap(), expected);
    }

    #[test]
    fn test_parse_fxid_rejects_garbage() {
        assert!(parse_fxid("zz").is_err());
        assert!(parse_fxid("").is_err());
    }

    #[test]
    fn test_format_epoch() {
        assert_eq!(format_epoch(0), "1970-01-01T00:00:00Z");
    }

    #[test]
    fn test_cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
