use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Identifies the database every listen stream is scoped to
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_project_id")]
    pub project_id: String,

    #[serde(default = "default_database_id")]
    pub database_id: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            project_id: default_project_id(),
            database_id: default_database_id(),
        }
    }
}

impl DatabaseConfig {
    /// `projects/{project_id}/databases/{database_id}`
    pub fn formatted_name(&self) -> String {
        format!("projects/{}/databases/{}", self.project_id, self.database_id)
    }

    /// Root under which all document names of the database live
    pub fn documents_root(&self) -> String {
        format!("{}/documents", self.formatted_name())
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("project_id", &self.project_id), ("database_id", &self.database_id)] {
            if value.is_empty() || value.contains('/') {
                return Err(Error::Config(ConfigError::Message(format!(
                    "database.{} must be a non-empty single path segment, got {:?}",
                    name, value
                ))));
            }
        }
        Ok(())
    }
}

fn default_project_id() -> String {
    "demo-project".to_string()
}
fn default_database_id() -> String {
    "(default)".to_string()
}
