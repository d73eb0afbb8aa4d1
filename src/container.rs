use serde::{Deserialize, Serialize};

/// One running container as observed on one host. Built from a single
/// `/containers/json` entry and immutable for the rest of the pipeline's
/// life; every record the pipeline emits carries these fields as tags.
#[derive(Debug, Clone, Serialize)]
pub struct ContainerDescriptor {
    pub id: String,
    pub host: String,
    pub name: String,
    pub image: String,
    pub app: String,
    pub tag: String,
    pub status: String,
    pub created: i64,
}

/// The shape of one entry in the Docker `/containers/json` response.
#[derive(Debug, Deserialize)]
pub struct ContainerSummary {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Names", default)]
    pub names: Vec<String>,
    #[serde(rename = "Image")]
    pub image: String,
    #[serde(rename = "Status", default)]
    pub status: String,
    #[serde(rename = "Created", default)]
    pub created: i64,
}

impl ContainerDescriptor {
    pub fn from_summary(host: &str, summary: ContainerSummary) -> Self {
        let name = summary
            .names
            .first()
            .map(|n| n.trim_start_matches('/').to_string())
            .unwrap_or_default();
        let (app, tag) = split_image(&summary.image);
        Self {
            id: summary.id,
            host: host.to_string(),
            name,
            image: summary.image,
            app,
            tag,
            status: summary.status,
            created: summary.created,
        }
    }

    /// Truncated id for operator-facing log lines.
    pub fn short_id(&self) -> &str {
        let end = self.id.len().min(12);
        &self.id[..end]
    }
}

/// Split an image reference into application name and version tag.
/// The tag is whatever follows the last `:` after the last `/`, so a
/// registry port (`registry:5000/app`) is not mistaken for a tag.
fn split_image(image: &str) -> (String, String) {
    let slash = image.rfind('/').map(|i| i + 1).unwrap_or(0);
    let (repo, tag) = match image[slash..].rfind(':') {
        Some(colon) => (
            &image[..slash + colon],
            image[slash + colon + 1..].to_string(),
        ),
        None => (image, "latest".to_string()),
    };
    let app = repo.rsplit('/').next().unwrap_or(repo).to_string();
    (app, tag)
}

/// Process table returned by `/containers/{id}/top`: ordered column titles
/// plus one row of string cells per process.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessTable {
    #[serde(rename = "Titles")]
    pub titles: Vec<String>,
    #[serde(rename = "Processes", default)]
    pub processes: Vec<Vec<String>>,
}
