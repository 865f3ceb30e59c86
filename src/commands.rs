//! Maintenance command endpoints (update, backup, restore).

use axum::extract::Extension;
use axum::response::Json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::ApiError;
use crate::reply::Reply;
use crate::runner::CommandRunner;

/// Configured command slots, each exposed on its own GET route.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandSlot {
    Update,
    BackupApp,
    RestoreApp,
    BackupDb,
}

impl CommandSlot {
    pub const ALL: [CommandSlot; 4] = [
        CommandSlot::Update,
        CommandSlot::BackupApp,
        CommandSlot::RestoreApp,
        CommandSlot::BackupDb,
    ];

    /// API path the slot is served on.
    pub fn route(self) -> &'static str {
        match self {
            CommandSlot::Update => "/api/update",
            CommandSlot::BackupApp => "/api/backupAPP",
            CommandSlot::RestoreApp => "/api/restoreAPP",
            CommandSlot::BackupDb => "/api/backupBD",
        }
    }

    /// Slot name used in log fields.
    pub fn name(self) -> &'static str {
        match self {
            CommandSlot::Update => "update",
            CommandSlot::BackupApp => "backupApp",
            CommandSlot::RestoreApp => "restoreApp",
            CommandSlot::BackupDb => "backupDb",
        }
    }
}

/// Runs the program configured for `slot` and returns its output.
pub async fn run_command(
    slot: CommandSlot,
    Extension(config): Extension<Arc<AppConfig>>,
    Extension(runner): Extension<Arc<CommandRunner>>,
) -> Result<Json<Reply>, ApiError> {
    let program = config.commands.program(slot);
    info!(slot = slot.name(), program, "run command");
    match runner.run(program).await {
        Ok(output) => {
            info!(slot = slot.name(), program, "command succeeded");
            Ok(Json(Reply::output(output)))
        }
        Err(err) => {
            warn!(slot = slot.name(), program, error = %err, "command failed");
            Err(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::CommandSlot;

    #[test]
    fn every_slot_has_a_distinct_api_route() {
        let mut routes: Vec<&str> = CommandSlot::ALL.iter().map(|slot| slot.route()).collect();
        routes.sort_unstable();
        routes.dedup();
        assert_eq!(routes.len(), CommandSlot::ALL.len());
        assert!(routes.iter().all(|route| route.starts_with("/api/")));
    }
}
