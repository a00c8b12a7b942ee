use std::path::Path;

use log::info;
use serde::Serialize;

use crate::error::IngestError;
use crate::storage::catalog::{CatalogStore, NewScreen};
use crate::storage::objects::{ObjectStore, compare_numeric, content_type_for, is_image};

/// One uploaded screenshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub ok: bool,
    pub flow_id: String,
    pub count: usize,
}

/// Storage path for the `index`th screen: `"<app>/<flow>/NN.<ext>"`.
pub fn object_path_for(app: &str, flow: &str, index: usize, file_name: &str) -> String {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .filter(|ext| !ext.is_empty())
        .unwrap_or_else(|| "png".to_string());

    format!("{}/{}/{:02}.{}", app, flow, index, ext)
}

/// Upload a batch of screenshots as one catalog flow.
///
/// Files are numbered 1..n in numeric name order. The flow is created on
/// first use and reused afterwards; each file becomes one screen whose
/// caption is the original file name. Stops at the first failure.
pub async fn ingest_batch(
    catalog: &dyn CatalogStore,
    objects: &dyn ObjectStore,
    app: &str,
    flow: &str,
    mut files: Vec<UploadFile>,
) -> Result<IngestReport, IngestError> {
    let app = app.trim();
    let flow = flow.trim();
    if app.is_empty() || flow.is_empty() {
        return Err(IngestError::MissingNames);
    }
    if files.is_empty() {
        return Err(IngestError::NoFiles);
    }

    files.sort_by(|a, b| compare_numeric(&a.name, &b.name));

    let flow_id = catalog.upsert_flow(app, flow).await?;
    info!("ingest: {} files into '{} / {}' (flow {})", files.len(), app, flow, flow_id);

    let count = files.len();
    for (i, file) in files.into_iter().enumerate() {
        let index = i + 1;
        let path = object_path_for(app, flow, index, &file.name);
        let content_type = content_type_for(&file.name);
        let image_url = objects.upload(&path, file.bytes, content_type).await?;

        catalog
            .insert_screen(&NewScreen {
                flow_id: flow_id.clone(),
                order_index: index as i64,
                image_url,
                caption: Some(file.name),
            })
            .await?;
    }

    Ok(IngestReport {
        ok: true,
        flow_id,
        count,
    })
}

/// Read every image file directly inside `dir`.
pub async fn read_image_dir(dir: &Path) -> Result<Vec<UploadFile>, IngestError> {
    let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| read_error(dir, e))?;
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await.map_err(|e| read_error(dir, e))? {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        if !path.is_file() || !is_image(&name) {
            continue;
        }
        let bytes = tokio::fs::read(&path).await.map_err(|e| read_error(&path, e))?;
        files.push(UploadFile { name, bytes });
    }

    Ok(files)
}

fn read_error(path: &Path, source: std::io::Error) -> IngestError {
    IngestError::ReadFile {
        path: path.display().to_string(),
        source,
    }
}
