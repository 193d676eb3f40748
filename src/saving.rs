//! Per-user file storage.
//!
//! Layout under the configured root:
//!
//! ```text
//! <root>/<user>/uploads.json          index of uploaded workbooks
//! <root>/<user>/uploads/<id>.xlsx.gz  raw workbook bytes, gzipped
//! <root>/<user>/analyses/<id>.bin.gz  SavedAnalysis, bincode + gzip
//! <root>/<user>/exports.json          index of stored export blobs
//! <root>/<user>/exports/<id>.pdf.gz   export bytes, gzipped
//! ```

use crate::axes::AxisSelection;
use crate::chart::ChartDataset;
use crate::error::{Result, VizError};
use bincode::{deserialize_from, serialize_into};
use chrono::{DateTime, Utc};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use lazy_static::lazy_static;
use log::{debug, info};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, create_dir_all};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

lazy_static! {
    static ref USER_ID: Regex = Regex::new(r"^[A-Za-z0-9_-]{1,64}$").unwrap();
}

/// Number of uploads returned by `Store::recent_uploads`.
pub const RECENT_UPLOADS: usize = 5;

const UPLOAD_INDEX: &str = "uploads.json";
const EXPORT_INDEX: &str = "exports.json";

/// Whether `user` is usable as an owner id (and so as a directory name).
pub fn is_valid_user_id(user: &str) -> bool {
    USER_ID.is_match(user)
}

/// An uploaded workbook as listed in `uploads.json`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub id: String,
    pub name: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
}

/// A chart-generation request and its result, kept for later viewing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedAnalysis {
    pub id: String,
    pub file_id: String,
    pub file_name: String,
    pub title: String,
    pub selection: AxisSelection,
    pub dataset: ChartDataset,
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An export document stored as an opaque blob.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredExport {
    pub id: String,
    pub title: String,
    pub chart_kind: String,
    pub file_id: Option<String>,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
}

/// Counts shown on a user's dashboard.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub charts_created: usize,
    pub files_uploaded: usize,
}

/// File-backed storage for uploads, saved analyses and export blobs.
///
/// Every operation is scoped to one owner; ids from another owner's
/// directory are simply not found.
pub struct Store {
    root: PathBuf,
    index_lock: Mutex<()>,
}

impl Store {
    /// Opens (and creates if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        create_dir_all(&root)?;
        info!("storage root at {}", root.display());
        Ok(Store {
            root,
            index_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // Uploads

    pub fn save_upload(&self, user: &str, name: &str, bytes: &[u8]) -> Result<UploadedFile> {
        let dir = self.user_dir(user)?.join("uploads");
        create_dir_all(&dir)?;

        let entry = UploadedFile {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            size: bytes.len() as u64,
            uploaded_at: Utc::now(),
        };
        write_gz(&dir.join(format!("{}.xlsx.gz", entry.id)), bytes)?;

        self.update_index(user, UPLOAD_INDEX, |entries: &mut Vec<UploadedFile>| {
            entries.push(entry.clone());
        })?;
        info!("user {} uploaded {} ({} bytes)", user, entry.name, entry.size);
        Ok(entry)
    }

    /// Uploads of `user`, newest first.
    pub fn list_uploads(&self, user: &str) -> Result<Vec<UploadedFile>> {
        let mut entries: Vec<UploadedFile> = self.read_index(user, UPLOAD_INDEX)?;
        entries.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(entries)
    }

    pub fn recent_uploads(&self, user: &str) -> Result<Vec<UploadedFile>> {
        let mut entries = self.list_uploads(user)?;
        entries.truncate(RECENT_UPLOADS);
        Ok(entries)
    }

    pub fn upload_info(&self, user: &str, id: &str) -> Result<UploadedFile> {
        self.read_index::<UploadedFile>(user, UPLOAD_INDEX)?
            .into_iter()
            .find(|e| e.id == id)
            .ok_or_else(|| VizError::NotFound(format!("file {}", id)))
    }

    /// Index entry and raw bytes of one upload.
    pub fn load_upload(&self, user: &str, id: &str) -> Result<(UploadedFile, Vec<u8>)> {
        let info = self.upload_info(user, id)?;
        let path = self.blob_path(user, "uploads", id, "xlsx.gz")?;
        let bytes = read_gz(&path).map_err(|e| not_found_or(e, format!("file {}", id)))?;
        Ok((info, bytes))
    }

    /// Removes an upload. Saved analyses of the file are kept.
    pub fn delete_upload(&self, user: &str, id: &str) -> Result<()> {
        let path = self.blob_path(user, "uploads", id, "xlsx.gz")?;
        let mut found = false;
        self.update_index(user, UPLOAD_INDEX, |entries: &mut Vec<UploadedFile>| {
            let before = entries.len();
            entries.retain(|e| e.id != id);
            found = entries.len() != before;
        })?;
        if !found {
            return Err(VizError::NotFound(format!("file {}", id)));
        }
        remove_if_present(&path)?;
        info!("user {} deleted upload {}", user, id);
        Ok(())
    }

    // Saved analyses

    pub fn save_analysis(&self, user: &str, analysis: &SavedAnalysis) -> Result<()> {
        let dir = self.user_dir(user)?.join("analyses");
        create_dir_all(&dir)?;
        let path = self.blob_path(user, "analyses", &analysis.id, "bin.gz")?;

        let file = File::create(&path)?;
        let mut writer = BufWriter::new(GzEncoder::new(file, Compression::default()));
        serialize_into(&mut writer, analysis)?;
        writer.into_inner().map_err(|e| e.into_error())?.finish()?;

        info!("user {} saved analysis {}", user, analysis.id);
        Ok(())
    }

    pub fn load_analysis(&self, user: &str, id: &str) -> Result<SavedAnalysis> {
        let path = self.blob_path(user, "analyses", id, "bin.gz")?;
        let file = File::open(&path).map_err(|e| not_found_or(e, format!("analysis {}", id)))?;
        let mut reader = BufReader::new(GzDecoder::new(file));
        Ok(deserialize_from(&mut reader)?)
    }

    /// Saved analyses of `user`, newest first.
    pub fn list_analyses(&self, user: &str) -> Result<Vec<SavedAnalysis>> {
        let dir = self.user_dir(user)?.join("analyses");
        let read_dir = match fs::read_dir(&dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut analyses = Vec::new();
        for entry in read_dir {
            let name = entry?.file_name();
            let Some(id) = name.to_str().and_then(|n| n.strip_suffix(".bin.gz")) else {
                continue;
            };
            analyses.push(self.load_analysis(user, id)?);
        }
        analyses.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(analyses)
    }

    pub fn delete_analysis(&self, user: &str, id: &str) -> Result<()> {
        let path = self.blob_path(user, "analyses", id, "bin.gz")?;
        fs::remove_file(&path).map_err(|e| not_found_or(e, format!("analysis {}", id)))?;
        info!("user {} deleted analysis {}", user, id);
        Ok(())
    }

    // Stored exports

    pub fn save_export(
        &self,
        user: &str,
        title: &str,
        chart_kind: &str,
        file_id: Option<&str>,
        bytes: &[u8],
    ) -> Result<StoredExport> {
        let dir = self.user_dir(user)?.join("exports");
        create_dir_all(&dir)?;

        let entry = StoredExport {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            chart_kind: chart_kind.to_string(),
            file_id: file_id.map(String::from),
            size: bytes.len() as u64,
            uploaded_at: Utc::now(),
        };
        write_gz(&dir.join(format!("{}.pdf.gz", entry.id)), bytes)?;

        self.update_index(user, EXPORT_INDEX, |entries: &mut Vec<StoredExport>| {
            entries.push(entry.clone());
        })?;
        info!("user {} stored export {} ({} bytes)", user, entry.id, entry.size);
        Ok(entry)
    }

    /// Stored exports of `user`, newest first.
    pub fn list_exports(&self, user: &str) -> Result<Vec<StoredExport>> {
        let mut entries: Vec<StoredExport> = self.read_index(user, EXPORT_INDEX)?;
        entries.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(entries)
    }

    pub fn load_export(&self, user: &str, id: &str) -> Result<(StoredExport, Vec<u8>)> {
        let info = self
            .read_index::<StoredExport>(user, EXPORT_INDEX)?
            .into_iter()
            .find(|e| e.id == id)
            .ok_or_else(|| VizError::NotFound(format!("export {}", id)))?;
        let path = self.blob_path(user, "exports", id, "pdf.gz")?;
        let bytes = read_gz(&path).map_err(|e| not_found_or(e, format!("export {}", id)))?;
        Ok((info, bytes))
    }

    pub fn stats(&self, user: &str) -> Result<UserStats> {
        Ok(UserStats {
            charts_created: self.list_analyses(user)?.len(),
            files_uploaded: self.read_index::<UploadedFile>(user, UPLOAD_INDEX)?.len(),
        })
    }

    // Paths and indexes

    fn user_dir(&self, user: &str) -> Result<PathBuf> {
        if !is_valid_user_id(user) {
            return Err(VizError::Unauthorized(format!("invalid user id {:?}", user)));
        }
        Ok(self.root.join(user))
    }

    /// Path of a stored blob. Ids that are not UUIDs never name a file.
    fn blob_path(&self, user: &str, dir: &str, id: &str, ext: &str) -> Result<PathBuf> {
        if Uuid::parse_str(id).is_err() {
            return Err(VizError::NotFound(format!("no entry with id {:?}", id)));
        }
        Ok(self.user_dir(user)?.join(dir).join(format!("{}.{}", id, ext)))
    }

    fn read_index<T: DeserializeOwned>(&self, user: &str, name: &str) -> Result<Vec<T>> {
        let path = self.user_dir(user)?.join(name);
        match fs::read_to_string(&path) {
            Ok(data) => Ok(serde_json::from_str(&data)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn update_index<T, F>(&self, user: &str, name: &str, update: F) -> Result<()>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut Vec<T>),
    {
        let _guard = self
            .index_lock
            .lock()
            .map_err(|_| VizError::Storage(std::io::Error::other("index lock poisoned")))?;

        let dir = self.user_dir(user)?;
        create_dir_all(&dir)?;
        let mut entries: Vec<T> = self.read_index(user, name)?;
        update(&mut entries);

        let path = dir.join(name);
        let tmp = dir.join(format!("{}.tmp", name));
        fs::write(&tmp, serde_json::to_string_pretty(&entries)?)?;
        fs::rename(&tmp, &path)?;
        debug!("rewrote {}", path.display());
        Ok(())
    }
}

fn write_gz(path: &Path, bytes: &[u8]) -> Result<()> {
    let file = File::create(path)?;
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder.write_all(bytes)?;
    encoder.finish()?;
    Ok(())
}

fn read_gz(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(File::open(path)?);
    let mut bytes = Vec::new();
    decoder.read_to_end(&mut bytes)?;
    Ok(bytes)
}

fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

fn not_found_or(e: std::io::Error, what: String) -> VizError {
    if e.kind() == ErrorKind::NotFound {
        VizError::NotFound(what)
    } else {
        VizError::Storage(e)
    }
}
