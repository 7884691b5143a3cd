use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Folder model - a named container forming a tree via an optional parent.
/// Acyclicity is the caller's responsibility; it is not checked here.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Folder {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub parent_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Create folder request
#[derive(Debug, Deserialize)]
pub struct CreateFolderRequest {
    pub name: String,
    pub parent_id: Option<String>,
}

/// Rename folder request
#[derive(Debug, Deserialize)]
pub struct RenameFolderRequest {
    pub name: String,
}
