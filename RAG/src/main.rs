// Offline index builder: loads DOCUMENTS_DIR, embeds it and writes VECTOR_STORE_PATH.
// The HTTP server lives in ../api.

use anyhow::Result;
use docqa_rag::{RagModel, Settings, StorageBackend};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut settings = Settings::from_env()?;
    if settings.storage_backend != StorageBackend::Filesystem {
        log::warn!(
            "STORAGE_BACKEND is {}, building the filesystem index anyway",
            settings.storage_backend.as_str()
        );
        settings.storage_backend = StorageBackend::Filesystem;
    }

    let model = RagModel::from_settings(settings).await?;
    let chunks = model.load_and_process_documents().await?;

    if chunks == 0 {
        println!(
            "No documents found in {}; nothing was indexed.",
            model.settings().documents_dir.display()
        );
    } else {
        let documents = model.list_documents().await?;
        println!(
            "Indexed {} chunks from {} files into {}",
            chunks,
            documents.len(),
            model.settings().vector_store_path.display()
        );
    }

    Ok(())
}
