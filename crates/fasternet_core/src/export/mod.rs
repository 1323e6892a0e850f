use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::domain::{IncidentCard, UpdateEntry};
use crate::error::AppError;
use crate::normalize::timestamps::to_rfc3339_utc;
use crate::store::CardStore;

pub const CARDS_FILE: &str = "cards.csv";
pub const UPDATES_FILE: &str = "card_updates.csv";
pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExportManifest {
    pub manifest_version: u32,
    pub app_version: String,
    pub export_time: String,
    pub card_count: i64,
    pub update_count: i64,
    pub files: Vec<ExportFileInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExportFileInfo {
    pub filename: String,
    pub bytes: u64,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExportResult {
    pub export_dir: String,
    pub card_count: i64,
    pub update_count: i64,
}

fn filename_safe_timestamp(export_time: &str) -> String {
    export_time
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' => c,
            _ => '_',
        })
        .collect()
}

fn sha256_file_hex(path: &Path) -> Result<(String, u64), AppError> {
    let mut f = fs::File::open(path).map_err(|e| {
        AppError::new("EXPORT_FILE_OPEN_FAILED", "Failed to open file for hashing")
            .with_details(format!("path={}: {}", path.display(), e))
    })?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    let mut total: u64 = 0;
    loop {
        let n = f.read(&mut buf).map_err(|e| {
            AppError::new("EXPORT_FILE_READ_FAILED", "Failed to read file for hashing")
                .with_details(format!("path={}: {}", path.display(), e))
        })?;
        if n == 0 {
            break;
        }
        total += n as u64;
        hasher.update(&buf[..n]);
    }
    Ok((hex::encode(hasher.finalize()), total))
}

fn ts_or_empty(ts: Option<time::OffsetDateTime>) -> Result<String, AppError> {
    match ts {
        Some(ts) => to_rfc3339_utc(ts),
        None => Ok(String::new()),
    }
}

fn csv_error(path: &Path, e: impl std::fmt::Display) -> AppError {
    AppError::new("EXPORT_WRITE_FAILED", "Failed to write export file")
        .with_details(format!("path={}: {}", path.display(), e))
}

/// Column names follow the store's column names so the files re-import cleanly.
fn write_cards_csv(path: &Path, cards: &[IncidentCard]) -> Result<(), AppError> {
    let mut w = csv::Writer::from_path(path).map_err(|e| csv_error(path, e))?;
    w.write_record([
        "id",
        "trecho_cidade",
        "tipo",
        "descricao",
        "ticket",
        "afetacao",
        "grupo_acionado",
        "data_criacao",
        "escala_1",
        "escala_2",
        "escala_3",
        "cor_atual",
    ])
    .map_err(|e| csv_error(path, e))?;

    for card in cards {
        w.write_record([
            card.id.to_string(),
            card.location.clone(),
            card.incident_type.as_str().to_string(),
            card.description.clone(),
            card.ticket.clone(),
            card.affected.clone(),
            card.assigned_group.clone(),
            to_rfc3339_utc(card.created_at)?,
            ts_or_empty(card.escalation_1)?,
            ts_or_empty(card.escalation_2)?,
            ts_or_empty(card.escalation_3)?,
            card.display_color().to_string(),
        ])
        .map_err(|e| csv_error(path, e))?;
    }
    w.flush().map_err(|e| csv_error(path, e))
}

fn write_updates_csv(path: &Path, updates: &[UpdateEntry]) -> Result<(), AppError> {
    let mut w = csv::Writer::from_path(path).map_err(|e| csv_error(path, e))?;
    w.write_record(["id", "card_id", "texto", "data_registro"])
        .map_err(|e| csv_error(path, e))?;
    for u in updates {
        w.write_record([
            u.id.to_string(),
            u.card_id.to_string(),
            u.text.clone(),
            to_rfc3339_utc(u.recorded_at)?,
        ])
        .map_err(|e| csv_error(path, e))?;
    }
    w.flush().map_err(|e| csv_error(path, e))
}

/// Write every card and update held by `store` into a new folder under `destination_dir`.
///
/// Cards are written in id order, updates grouped by card in history order. The folder holds
/// `cards.csv`, `card_updates.csv` and a `manifest.json` with the size and sha256 of each file.
pub fn export_board_csv(
    store: &dyn CardStore,
    destination_dir: &Path,
    export_time: &str,
    app_version: &str,
) -> Result<ExportResult, AppError> {
    if !destination_dir.is_dir() {
        return Err(AppError::new(
            "EXPORT_DEST_NOT_DIR",
            "Export destination must be an existing directory",
        )
        .with_details(destination_dir.display().to_string()));
    }

    let export_dir: PathBuf = destination_dir.join(format!(
        "FasternetExport_{}",
        filename_safe_timestamp(export_time)
    ));
    if export_dir.exists() {
        return Err(AppError::new(
            "EXPORT_DEST_EXISTS",
            "Export destination folder already exists",
        )
        .with_details(export_dir.display().to_string()));
    }
    fs::create_dir_all(&export_dir).map_err(|e| {
        AppError::new("EXPORT_MKDIR_FAILED", "Failed to create export directory")
            .with_details(format!("path={}: {}", export_dir.display(), e))
    })?;

    let mut cards = store.list_cards()?;
    cards.sort_by_key(|c| c.id);

    let mut updates = Vec::new();
    for card in &cards {
        updates.extend(store.list_updates(card.id)?);
    }

    let cards_path = export_dir.join(CARDS_FILE);
    let updates_path = export_dir.join(UPDATES_FILE);
    write_cards_csv(&cards_path, &cards)?;
    write_updates_csv(&updates_path, &updates)?;

    let mut files = Vec::new();
    for (name, path) in [(CARDS_FILE, &cards_path), (UPDATES_FILE, &updates_path)] {
        let (sha256, bytes) = sha256_file_hex(path)?;
        files.push(ExportFileInfo {
            filename: name.to_string(),
            bytes,
            sha256,
        });
    }
    files.sort_by(|a, b| a.filename.cmp(&b.filename));

    let manifest = ExportManifest {
        manifest_version: 1,
        app_version: app_version.to_string(),
        export_time: export_time.to_string(),
        card_count: cards.len() as i64,
        update_count: updates.len() as i64,
        files,
    };
    let manifest_path = export_dir.join(MANIFEST_FILE);
    let json = serde_json::to_string_pretty(&manifest).map_err(|e| {
        AppError::new("EXPORT_ENCODE_FAILED", "Failed to encode export manifest")
            .with_details(e.to_string())
    })?;
    fs::write(&manifest_path, json.as_bytes()).map_err(|e| csv_error(&manifest_path, e))?;

    info!(
        cards = manifest.card_count,
        updates = manifest.update_count,
        dir = %export_dir.display(),
        "board exported"
    );
    Ok(ExportResult {
        export_dir: export_dir.display().to_string(),
        card_count: manifest.card_count,
        update_count: manifest.update_count,
    })
}

/// Recompute hashes of an export folder and compare them with its manifest.
pub fn verify_export(export_dir: &Path) -> Result<ExportManifest, AppError> {
    let manifest_path = export_dir.join(MANIFEST_FILE);
    let text = fs::read_to_string(&manifest_path).map_err(|e| {
        AppError::new("EXPORT_MANIFEST_READ_FAILED", "Failed to read export manifest")
            .with_details(format!("path={}: {}", manifest_path.display(), e))
    })?;
    let manifest: ExportManifest = serde_json::from_str(&text).map_err(|e| {
        AppError::new("EXPORT_MANIFEST_INVALID", "Export manifest is malformed")
            .with_details(e.to_string())
    })?;

    for file in &manifest.files {
        let (sha256, bytes) = sha256_file_hex(&export_dir.join(&file.filename))?;
        if sha256 != file.sha256 || bytes != file.bytes {
            return Err(AppError::new(
                "EXPORT_MANIFEST_MISMATCH",
                "Export file does not match its manifest entry",
            )
            .with_details(format!("file={}", file.filename)));
        }
    }
    Ok(manifest)
}
