//! Per-run output folder and result persistence.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDate};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::errors::ArtifactError;
use crate::record::Record;

pub const RECORDS_JSON: &str = "licitaciones_extraidas.json";
pub const FORM_INVENTORY_JSON: &str = "campos_formulario_busqueda.json";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// `<output_root>/<YYYYmmdd_HHMMSS>_<8 hex>` created at run start.
#[derive(Clone, Debug)]
pub struct RunFolder {
    path: PathBuf,
}

impl RunFolder {
    pub async fn create(
        output_root: &Path,
        started: DateTime<Local>,
        run_id: &Uuid,
    ) -> Result<Self, ArtifactError> {
        let path = output_root.join(folder_name(started, run_id));
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|source| ArtifactError::CreateFolder {
                path: path.clone(),
                source,
            })?;
        info!(target: "procurement-flow", folder = %path.display(), "run folder created");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Pretty JSON array of records.
    pub async fn write_records_json(&self, records: &[Record]) -> Result<PathBuf, ArtifactError> {
        write_json(&self.path.join(RECORDS_JSON), &records).await
    }

    /// `licitaciones_<YYYYMMDD>.csv`, UTF-8 with BOM, header row always
    /// present.
    pub async fn write_records_csv(
        &self,
        records: &[Record],
        day: NaiveDate,
    ) -> Result<PathBuf, ArtifactError> {
        let path = self
            .path
            .join(format!("licitaciones_{}.csv", day.format("%Y%m%d")));
        let bytes = encode_csv(records)?;
        write_bytes(&path, bytes).await?;
        Ok(path)
    }
}

pub fn folder_name(started: DateTime<Local>, run_id: &Uuid) -> String {
    let hex = run_id.simple().to_string();
    format!("{}_{}", started.format("%Y%m%d_%H%M%S"), &hex[..8])
}

pub async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<PathBuf, ArtifactError> {
    let bytes = serde_json::to_vec_pretty(value)?;
    write_bytes(path, bytes).await?;
    Ok(path.to_path_buf())
}

fn encode_csv(records: &[Record]) -> Result<Vec<u8>, ArtifactError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(UTF8_BOM.to_vec());
    writer.write_record(Record::COLUMNS)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer
        .into_inner()
        .map_err(|err| ArtifactError::Csv(err.into_error().into()))
}

async fn write_bytes(path: &Path, bytes: Vec<u8>) -> Result<(), ArtifactError> {
    tokio::fs::write(path, bytes)
        .await
        .map_err(|source| ArtifactError::Write {
            path: path.to_path_buf(),
            source,
        })
}
