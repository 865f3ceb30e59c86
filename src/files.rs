//! Listing and deletion handlers for the upload directory.

use axum::extract::rejection::FormRejection;
use axum::extract::{Extension, Form};
use axum::response::Json;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::reply::Reply;
use crate::storage::{Storage, StoreError};

#[derive(Deserialize)]
pub(crate) struct DeleteForm {
    #[serde(default)]
    filename: String,
}

/// Lists the upload directory as size, modification time and name.
pub async fn list_files(
    Extension(storage): Extension<Arc<Storage>>,
) -> Result<Json<Reply>, ApiError> {
    match storage.listing().await {
        Ok(output) => {
            info!(lines = output.lines().count(), "list files");
            Ok(Json(Reply::output(output)))
        }
        Err(err) => {
            warn!(error = %err, "list files failed");
            Err(err.into())
        }
    }
}

/// Deletes one file named by the `filename` form field.
pub async fn delete_file(
    Extension(storage): Extension<Arc<Storage>>,
    form: Result<Form<DeleteForm>, FormRejection>,
) -> Result<Json<Reply>, ApiError> {
    let Form(DeleteForm { filename }) = form?;
    match storage.delete(&filename).await {
        Ok(name) => {
            info!(name, "delete file");
            Ok(Json(Reply::success()))
        }
        Err(err) => {
            if let StoreError::Remove { .. } | StoreError::Io(_) = err {
                warn!(filename, error = %err, "delete file failed");
            }
            Err(err.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_storage() -> (tempfile::TempDir, Arc<Storage>) {
        let temp = tempdir().expect("tempdir");
        let root = temp.path().join("uploads");
        std::fs::create_dir_all(&root).expect("create upload root");
        (temp, Arc::new(Storage::new(root)))
    }

    fn delete_form(filename: &str) -> Result<Form<DeleteForm>, FormRejection> {
        Ok(Form(DeleteForm {
            filename: filename.to_string(),
        }))
    }

    #[tokio::test]
    async fn delete_without_name_is_bad_request() {
        let (_temp, storage) = make_storage();
        let result = delete_file(Extension(storage), delete_form("")).await;
        assert!(matches!(result, Err(ApiError::BadRequest(msg)) if msg == "no filename"));
    }

    #[tokio::test]
    async fn delete_of_absent_file_is_repeatable_not_found() {
        let (_temp, storage) = make_storage();
        for _ in 0..2 {
            let result = delete_file(Extension(storage.clone()), delete_form("ghost.txt")).await;
            assert!(matches!(result, Err(ApiError::NotFound(_))));
        }
        assert_eq!(std::fs::read_dir(storage.root_path()).expect("read dir").count(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn delete_of_directory_reports_removal_failure() {
        let (_temp, storage) = make_storage();
        std::fs::create_dir(storage.root_path().join("subdir")).expect("mkdir");
        let result = delete_file(Extension(storage), delete_form("subdir")).await;
        assert!(matches!(result, Err(ApiError::Internal(msg)) if msg.contains("subdir")));
    }

    #[tokio::test]
    async fn list_reports_stored_files() {
        let (_temp, storage) = make_storage();
        std::fs::write(storage.root_path().join("report.txt"), b"hello").expect("write");
        let Json(reply) = list_files(Extension(storage)).await.expect("list");
        assert!(reply.output.starts_with("total 5\n5 "));
        assert!(reply.output.ends_with(" report.txt\n"));
    }
}
