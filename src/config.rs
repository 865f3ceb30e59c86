//! CLI arguments, environment configuration and the resolved server config.

use clap::Parser;
use shadow_rs::formatcp;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::build;
use crate::commands::CommandSlot;

const VERSION_INFO: &str = formatcp!(
    r#"{}\ncommit_hash: {}\nbuild_time: {}\nbuild_env: {},{}"#,
    build::PKG_VERSION,
    build::SHORT_COMMIT,
    build::BUILD_TIME,
    build::RUST_VERSION,
    build::RUST_CHANNEL
);

pub const DEFAULT_PORT: &str = "8080";
pub const DEFAULT_UPLOAD_DIR: &str = "./uploads";
pub const DEFAULT_LIMIT_MB: u64 = 500;
pub const MAX_LIMIT_MB: u64 = u64::MAX >> 20;
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 300;
pub const DEFAULT_UPDATE_COMMAND: &str = "lscpu";
pub const DEFAULT_BACKUP_APP_COMMAND: &str = "who";
pub const DEFAULT_RESTORE_APP_COMMAND: &str = "vmstat";
pub const DEFAULT_BACKUP_DB_COMMAND: &str = "lsblk";
pub const UPLOAD_FIELD: &str = "files";

/// CLI arguments and environment configuration for the server.
#[derive(Parser, Debug)]
#[command(name = "upt-server", version = VERSION_INFO, about = "Upload and maintenance command server")]
pub struct Args {
    #[arg(
        short = 'b',
        long,
        env = "UPT_BIND",
        default_value = "0.0.0.0",
        help = "Bind address"
    )]
    pub bind: IpAddr,
    #[arg(
        short = 'p',
        long,
        env = "UPT_PORT",
        default_value = DEFAULT_PORT,
        value_parser = parse_port,
        help = "HTTP port (a leading ':' is accepted)"
    )]
    pub port: u16,
    #[arg(
        short = 'd',
        long,
        env = "UPT_URL_PREFIX",
        default_value = DEFAULT_UPLOAD_DIR,
        help = "Directory that receives uploaded files"
    )]
    pub upload_dir: PathBuf,
    #[arg(
        short = 'l',
        long,
        env = "UPT_LIMIT_DOWNLOAD_MB",
        default_value_t = DEFAULT_LIMIT_MB,
        value_parser = clap::value_parser!(u64).range(1..=MAX_LIMIT_MB),
        help = "Max upload request size in megabytes"
    )]
    pub limit_mb: u64,
    #[arg(
        long,
        env = "UPT_SC_UPDATE",
        default_value = DEFAULT_UPDATE_COMMAND,
        help = "Command run by /api/update"
    )]
    pub update_command: String,
    #[arg(
        long,
        env = "UPT_SC_BACKUP_APP",
        default_value = DEFAULT_BACKUP_APP_COMMAND,
        help = "Command run by /api/backupAPP"
    )]
    pub backup_app_command: String,
    #[arg(
        long,
        env = "UPT_SC_RESTORE_APP",
        default_value = DEFAULT_RESTORE_APP_COMMAND,
        help = "Command run by /api/restoreAPP"
    )]
    pub restore_app_command: String,
    #[arg(
        long,
        env = "UPT_SC_BACKUP_BD",
        default_value = DEFAULT_BACKUP_DB_COMMAND,
        help = "Command run by /api/backupBD"
    )]
    pub backup_db_command: String,
    #[arg(
        long,
        env = "UPT_COMMAND_TIMEOUT_SECS",
        default_value_t = DEFAULT_COMMAND_TIMEOUT_SECS,
        help = "Command execution timeout in seconds (0 to disable)"
    )]
    pub command_timeout_secs: u64,
    #[arg(
        long,
        env = "UPT_STATIC_DIR",
        default_value = "static",
        help = "Directory served under /static"
    )]
    pub static_dir: PathBuf,
    #[arg(
        long,
        env = "UPT_INDEX_FILE",
        default_value = "index.html",
        help = "Document served at /"
    )]
    pub index_file: PathBuf,
}

/// Accepts both `8080` and the `:8080` listen-address form.
fn parse_port(value: &str) -> Result<u16, String> {
    value
        .trim()
        .trim_start_matches(':')
        .parse::<u16>()
        .map_err(|err| format!("invalid port `{value}`: {err}"))
}

/// Operator-configured programs, one per command slot.
#[derive(Clone, Debug)]
pub struct CommandTable {
    pub update: String,
    pub backup_app: String,
    pub restore_app: String,
    pub backup_db: String,
}

impl CommandTable {
    pub fn program(&self, slot: CommandSlot) -> &str {
        match slot {
            CommandSlot::Update => &self.update,
            CommandSlot::BackupApp => &self.backup_app,
            CommandSlot::RestoreApp => &self.restore_app,
            CommandSlot::BackupDb => &self.backup_db,
        }
    }
}

/// Resolved configuration, fixed for the lifetime of the process.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub bind: IpAddr,
    pub port: u16,
    pub upload_dir: PathBuf,
    pub upload_limit_bytes: u64,
    pub commands: CommandTable,
    pub command_timeout: Option<Duration>,
    pub static_dir: PathBuf,
    pub index_file: PathBuf,
}

impl From<Args> for AppConfig {
    fn from(args: Args) -> Self {
        let command_timeout =
            (args.command_timeout_secs > 0).then(|| Duration::from_secs(args.command_timeout_secs));
        Self {
            bind: args.bind,
            port: args.port,
            upload_dir: args.upload_dir,
            upload_limit_bytes: args.limit_mb << 20,
            commands: CommandTable {
                update: args.update_command,
                backup_app: args.backup_app_command,
                restore_app: args.restore_app_command,
                backup_db: args.backup_db_command,
            },
            command_timeout,
            static_dir: args.static_dir,
            index_file: args.index_file,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_accepts_listen_address_form() {
        assert_eq!(parse_port(":8080"), Ok(8080));
        assert_eq!(parse_port("9000"), Ok(9000));
        assert!(parse_port("http").is_err());
        assert!(parse_port(":70000").is_err());
    }

    #[test]
    fn limit_must_be_positive() {
        let result = Args::try_parse_from(["upt-server", "--limit-mb", "0"]);
        assert!(result.is_err());

        let result = Args::try_parse_from(["upt-server", "--limit-mb", "lots"]);
        assert!(result.is_err());
    }

    #[test]
    fn config_converts_megabytes_and_timeout() {
        let args = Args::try_parse_from([
            "upt-server",
            "--limit-mb",
            "2",
            "--command-timeout-secs",
            "0",
            "--backup-db-command",
            "/opt/backup-db.sh",
        ])
        .expect("parse args");
        let config = AppConfig::from(args);

        assert_eq!(config.upload_limit_bytes, 2 * 1024 * 1024);
        assert_eq!(config.command_timeout, None);
        assert_eq!(
            config.commands.program(CommandSlot::BackupDb),
            "/opt/backup-db.sh"
        );
    }
}
