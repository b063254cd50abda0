use crate::document_processor::DocumentKind;
use crate::models::StoredFile;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use futures_util::io::Cursor;
use futures_util::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Bson, Document as BsonDocument};
use mongodb::gridfs::GridFsBucket;
use mongodb::options::FindOptions;
use mongodb::{Client, Database};
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Where uploaded files live.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn list(&self) -> Result<Vec<StoredFile>>;

    async fn read(&self, id: &str) -> Result<Vec<u8>>;

    async fn save(&self, filename: &str, bytes: &[u8]) -> Result<StoredFile>;

    /// Human-readable location of a stored file, if it has one outside the store.
    fn location(&self, file: &StoredFile) -> Option<String>;

    fn describe(&self) -> String;
}

/// Keeps only the final component of a client-supplied file name.
pub fn sanitize_filename(filename: &str) -> Result<String> {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
        .trim();

    if name.is_empty() || name == "." || name == ".." {
        return Err(anyhow!("Invalid file name '{}'", filename));
    }
    Ok(name.to_string())
}

pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, id: &str) -> Result<PathBuf> {
        let relative = Path::new(id);
        let is_plain = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if !is_plain || id.is_empty() {
            return Err(anyhow!("Invalid document id '{}'", id));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn list(&self) -> Result<Vec<StoredFile>> {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || -> Result<Vec<StoredFile>> {
            let mut files = Vec::new();
            if !root.exists() {
                return Ok(files);
            }

            for entry in WalkDir::new(&root).follow_links(true).sort_by_file_name() {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        log::warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                        continue;
                    }
                };
                if !entry.file_type().is_file() {
                    continue;
                }
                let filename = entry.file_name().to_string_lossy().to_string();
                if DocumentKind::from_filename(&filename).is_none() {
                    continue;
                }
                let relative = entry.path().strip_prefix(&root)?;
                let id = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                files.push(StoredFile { id, filename });
            }
            Ok(files)
        })
        .await?
    }

    async fn read(&self, id: &str) -> Result<Vec<u8>> {
        let path = self.resolve(id)?;
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))
    }

    async fn save(&self, filename: &str, bytes: &[u8]) -> Result<StoredFile> {
        let filename = sanitize_filename(filename)?;
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("Failed to create {}", self.root.display()))?;

        let path = self.root.join(&filename);
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        log::info!("File uploaded successfully: {}", path.display());
        Ok(StoredFile {
            id: filename.clone(),
            filename,
        })
    }

    fn location(&self, file: &StoredFile) -> Option<String> {
        Some(self.root.join(&file.id).to_string_lossy().to_string())
    }

    fn describe(&self) -> String {
        format!("filesystem ({})", self.root.display())
    }
}

/// GridFS-backed store. Ids are hex-encoded ObjectIds.
pub struct MongoDocumentStore {
    database: Database,
    bucket: GridFsBucket,
}

impl MongoDocumentStore {
    pub async fn connect(url: &str, database: &str) -> Result<Self> {
        let client = Client::with_uri_str(url)
            .await
            .with_context(|| format!("Failed to connect to MongoDB at {}", url))?;
        let database = client.database(database);
        let bucket = database.gridfs_bucket(None);

        log::info!("Using MongoDB database {}", database.name());
        Ok(Self { database, bucket })
    }
}

#[async_trait]
impl DocumentStore for MongoDocumentStore {
    async fn list(&self) -> Result<Vec<StoredFile>> {
        let files = self.database.collection::<BsonDocument>("fs.files");
        let options = FindOptions::builder().sort(doc! { "uploadDate": 1 }).build();
        let mut cursor = files.find(doc! {}, options).await?;

        let mut stored = Vec::new();
        while let Some(file) = cursor.try_next().await? {
            let id = file.get_object_id("_id")?.to_hex();
            let filename = file.get_str("filename").unwrap_or("unnamed").to_string();
            stored.push(StoredFile { id, filename });
        }
        Ok(stored)
    }

    async fn read(&self, id: &str) -> Result<Vec<u8>> {
        let object_id = ObjectId::parse_str(id)
            .with_context(|| format!("Invalid GridFS file id '{}'", id))?;

        let mut destination = Cursor::new(Vec::new());
        self.bucket
            .download_to_futures_0_3_writer(Bson::ObjectId(object_id), &mut destination)
            .await
            .with_context(|| format!("File {} not found", id))?;
        Ok(destination.into_inner())
    }

    async fn save(&self, filename: &str, bytes: &[u8]) -> Result<StoredFile> {
        let filename = sanitize_filename(filename)?;
        let source = Cursor::new(bytes.to_vec());
        let object_id = self
            .bucket
            .upload_from_futures_0_3_reader(&filename, source, None)
            .await
            .with_context(|| format!("Failed to store {} in GridFS", filename))?;

        log::info!("Stored {} in GridFS as {}", filename, object_id.to_hex());
        Ok(StoredFile {
            id: object_id.to_hex(),
            filename,
        })
    }

    fn location(&self, _file: &StoredFile) -> Option<String> {
        None
    }

    fn describe(&self) -> String {
        format!("mongodb ({})", self.database.name())
    }
}
