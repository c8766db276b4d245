use anyhow::Result;
use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use mysql_backup::cli::{handle_backup_command, BackupCommands, GlobalArgs};

#[derive(Parser)]
#[command(
    name = "mysql_backup",
    version,
    about = "Rotating full, incremental and binlog backups for MySQL",
    long_about = "Takes a full xtrabackup/mariabackup snapshot once a week and \
                  incrementals on the other days, archives binlog segments with \
                  zstd, and deletes backups older than the retention window."
)]
struct Cli {
    #[command(flatten)]
    args: GlobalArgs,

    #[command(subcommand)]
    command: Option<BackupCommands>,
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "mysql_backup=debug"
    } else {
        "mysql_backup=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.args.verbose);

    let today = cli.args.today_or(chrono::Local::now().date_naive())?;
    let options = cli.args.resolve()?;
    let command = cli.command.unwrap_or(BackupCommands::Run);

    if let Err(e) = handle_backup_command(&options, today, command) {
        error!(op = "backup.error", error = %e, "Backup run failed");
        return Err(e.into());
    }

    Ok(())
}
