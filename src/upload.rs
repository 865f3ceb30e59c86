//! Multipart batch upload into the upload directory.

use axum::extract::Extension;
use axum::extract::multipart::{Multipart, MultipartRejection};
use axum::response::Json;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::UPLOAD_FIELD;
use crate::error::ApiError;
use crate::reply::Reply;
use crate::storage::{Storage, StoreError};

/// Per-entry outcome of one upload request.
#[derive(Debug, Default)]
pub struct UploadReport {
    pub stored: Vec<String>,
    pub skipped: Vec<(String, String)>,
}

impl UploadReport {
    /// No part under the upload field was seen at all.
    pub fn is_empty(&self) -> bool {
        self.stored.is_empty() && self.skipped.is_empty()
    }
}

/// Stores every file part under `files`. A bad entry is skipped without
/// affecting the rest of the batch; the reply carries the stored count.
pub async fn upload_files(
    Extension(storage): Extension<Arc<Storage>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Reply>, ApiError> {
    let mut multipart = multipart?;
    let mut report = UploadReport::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) if report.stored.is_empty() => {
                warn!(error = %err, "rejecting upload body");
                return Err(err.into());
            }
            Err(err) => {
                warn!(error = %err, stored = report.stored.len(), "upload body ended early");
                break;
            }
        };
        if field.name() != Some(UPLOAD_FIELD) {
            debug!(field = field.name().unwrap_or_default(), "ignoring form field");
            continue;
        }
        // Browsers send an empty filename for a file input left blank.
        let Some(client_name) = field
            .file_name()
            .filter(|name| !name.is_empty())
            .map(str::to_owned)
        else {
            debug!("ignoring upload part without filename");
            continue;
        };

        match storage.store(&client_name, field).await {
            Ok(stored) => {
                info!(name = stored.name, bytes = stored.bytes, "stored upload");
                report.stored.push(stored.name);
            }
            Err(err) => {
                match &err {
                    StoreError::InvalidName(_) => warn!(name = client_name, "skipping unsafe filename"),
                    _ => warn!(name = client_name, error = %err, "failed to store upload"),
                }
                report.skipped.push((client_name, err.to_string()));
            }
        }
    }

    if report.is_empty() {
        return Err(ApiError::BadRequest("no files found".into()));
    }
    info!(
        stored = report.stored.len(),
        skipped = report.skipped.len(),
        "upload batch finished"
    );
    Ok(Json(Reply::uploaded(report.stored.len())))
}
