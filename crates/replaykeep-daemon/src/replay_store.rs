//! On-disk replay files, one `<match id>.rofl` per match.
//!
//! Downloads are streamed into a uniquely named temp file in the same
//! directory and renamed into place only once complete, so a reader never
//! sees a partial file under the final name.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use replaykeep_rofl::{Chunk, ReplayDecoder};
use tokio::fs;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{FetchError, LoadError};

const REPLAY_EXTENSION: &str = "rofl";

/// Source of replay bodies.
#[async_trait]
pub trait ReplayTransport: Send + Sync {
    /// Stream the body served at `url` into `sink`. Returns the number of
    /// bytes written.
    async fn download(
        &self,
        url: &str,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<u64, FetchError>;
}

/// Plain HTTP(S) transport. Replay URLs are pre-signed, so no API key is
/// attached.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: std::time::Duration) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ReplayTransport for HttpTransport {
    async fn download(
        &self,
        url: &str,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
    ) -> Result<u64, FetchError> {
        let mut response = self.client.get(url).send().await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(FetchError::Status {
                status,
                url: url.to_string(),
            });
        }

        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            sink.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        Ok(written)
    }
}

/// Outcome of [`ReplayStore::ensure_downloaded`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayStatus {
    AlreadyStored,
    Downloaded { bytes: u64 },
}

#[derive(Clone)]
pub struct ReplayStore {
    dir: PathBuf,
    min_bytes: u64,
    transport: Arc<dyn ReplayTransport>,
    decoder: ReplayDecoder,
}

impl ReplayStore {
    /// Open the store, creating `dir` if missing.
    pub async fn new(
        dir: PathBuf,
        min_bytes: u64,
        transport: Arc<dyn ReplayTransport>,
    ) -> Result<Self, FetchError> {
        fs::create_dir_all(&dir).await?;

        info!(path = %dir.display(), "Replay store initialized");

        Ok(Self {
            dir,
            min_bytes,
            transport,
            decoder: ReplayDecoder::default(),
        })
    }

    /// Decode stored replays with `decoder` and its logging span.
    pub fn with_decoder(mut self, decoder: ReplayDecoder) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Deterministic location of the replay for `match_id`.
    pub fn replay_path(&self, match_id: i64) -> PathBuf {
        self.dir.join(format!("{match_id}.{REPLAY_EXTENSION}"))
    }

    /// Whether a complete-looking replay is stored for `match_id`.
    pub async fn is_stored(&self, match_id: i64) -> bool {
        match fs::metadata(self.replay_path(match_id)).await {
            Ok(meta) => meta.is_file() && meta.len() > self.min_bytes,
            Err(_) => false,
        }
    }

    /// Make sure the replay for `match_id` is on disk, downloading it from
    /// `url` unless a large enough file is already present.
    ///
    /// On failure no partial file is left behind.
    pub async fn ensure_downloaded(
        &self,
        match_id: i64,
        url: &str,
    ) -> Result<ReplayStatus, FetchError> {
        if url.is_empty() {
            return Err(FetchError::EmptyUrl);
        }
        if self.is_stored(match_id).await {
            debug!(match_id, "Replay already stored");
            return Ok(ReplayStatus::AlreadyStored);
        }

        let temp = self
            .dir
            .join(format!(".{match_id}.{}.part", Uuid::new_v4().simple()));

        match self.download_to(&temp, url).await {
            Ok(bytes) => {
                if let Err(e) = fs::rename(&temp, self.replay_path(match_id)).await {
                    remove_partial(&temp).await;
                    return Err(e.into());
                }
                info!(match_id, bytes, "Stored replay");
                Ok(ReplayStatus::Downloaded { bytes })
            }
            Err(e) => {
                warn!(match_id, url, error = %e, "Replay download failed");
                remove_partial(&temp).await;
                Err(e)
            }
        }
    }

    async fn download_to(&self, temp: &Path, url: &str) -> Result<u64, FetchError> {
        let mut file = fs::File::create(temp).await?;
        let written = self.transport.download(url, &mut file).await?;
        file.flush().await?;
        file.sync_all().await?;

        if written <= self.min_bytes {
            return Err(FetchError::TooSmall {
                written,
                min: self.min_bytes,
            });
        }
        Ok(written)
    }

    /// Read the stored replay for `match_id` and decode its chunk stream on a
    /// blocking worker.
    pub async fn load_chunks(&self, match_id: i64) -> Result<Vec<Chunk>, LoadError> {
        let raw = match fs::read(self.replay_path(match_id)).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(LoadError::NotStored(match_id));
            }
            Err(e) => return Err(e.into()),
        };

        let decoder = self.decoder.clone();
        let chunks = tokio::task::spawn_blocking(move || decoder.decode(&raw)).await??;
        debug!(match_id, chunks = chunks.len(), "Loaded replay chunks");
        Ok(chunks)
    }
}

async fn remove_partial(path: &Path) {
    if let Err(e) = fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to remove partial replay");
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Serves a fixed body in two halves with a yield between them, or fails
    /// after writing part of it.
    pub(crate) struct FakeTransport {
        pub body: Vec<u8>,
        pub fail_after: Option<usize>,
        pub calls: AtomicUsize,
    }

    impl FakeTransport {
        pub fn serving(body: Vec<u8>) -> Self {
            Self {
                body,
                fail_after: None,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ReplayTransport for FakeTransport {
        async fn download(
            &self,
            _url: &str,
            sink: &mut (dyn AsyncWrite + Unpin + Send),
        ) -> Result<u64, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.fail_after {
                Some(n) => {
                    sink.write_all(&self.body[..n]).await?;
                    Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset").into())
                }
                None => {
                    let (head, tail) = self.body.split_at(self.body.len() / 2);
                    sink.write_all(head).await?;
                    tokio::task::yield_now().await;
                    sink.write_all(tail).await?;
                    Ok(self.body.len() as u64)
                }
            }
        }
    }

    const MIN: u64 = 64;

    async fn test_store(transport: Arc<FakeTransport>) -> (ReplayStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = ReplayStore::new(dir.path().join("replays"), MIN, transport)
            .await
            .unwrap();
        (store, dir)
    }

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn second_call_does_not_fetch() {
        let transport = Arc::new(FakeTransport::serving(vec![9u8; 100]));
        let (store, _dir) = test_store(transport.clone()).await;

        let first = store.ensure_downloaded(42, "https://replays/42").await.unwrap();
        let second = store.ensure_downloaded(42, "https://replays/42").await.unwrap();

        assert_eq!(first, ReplayStatus::Downloaded { bytes: 100 });
        assert_eq!(second, ReplayStatus::AlreadyStored);
        assert_eq!(transport.calls(), 1);
        assert_eq!(file_names(store.dir()), vec!["42.rofl".to_string()]);
    }

    #[tokio::test]
    async fn concurrent_downloads_publish_one_complete_file() {
        let transport = Arc::new(FakeTransport::serving((0..=255u8).cycle().take(300).collect()));
        let (store, _dir) = test_store(transport.clone()).await;

        let (a, b) = tokio::join!(
            store.ensure_downloaded(42, "https://replays/42"),
            store.ensure_downloaded(42, "https://replays/42"),
        );
        let statuses = [a.unwrap(), b.unwrap()];
        assert!(statuses.contains(&ReplayStatus::Downloaded { bytes: 300 }));
        assert!(statuses
            .iter()
            .all(|s| matches!(s, ReplayStatus::Downloaded { bytes: 300 } | ReplayStatus::AlreadyStored)));

        assert_eq!(file_names(store.dir()), vec!["42.rofl".to_string()]);
        assert_eq!(std::fs::read(store.replay_path(42)).unwrap(), transport.body);
    }

    #[tokio::test]
    async fn interrupted_download_leaves_nothing() {
        let transport = Arc::new(FakeTransport {
            fail_after: Some(30),
            ..FakeTransport::serving(vec![1u8; 100])
        });
        let (store, _dir) = test_store(transport.clone()).await;

        assert!(store.ensure_downloaded(7, "https://replays/7").await.is_err());
        assert!(file_names(store.dir()).is_empty());
        assert!(!store.is_stored(7).await);
    }

    #[tokio::test]
    async fn undersized_body_is_rejected() {
        let transport = Arc::new(FakeTransport::serving(vec![1u8; MIN as usize]));
        let (store, _dir) = test_store(transport).await;

        let err = store.ensure_downloaded(7, "https://replays/7").await.unwrap_err();
        assert!(matches!(err, FetchError::TooSmall { written: 64, min: 64 }));
        assert!(file_names(store.dir()).is_empty());
    }

    #[tokio::test]
    async fn truncated_file_is_replaced() {
        let transport = Arc::new(FakeTransport::serving(vec![5u8; 200]));
        let (store, _dir) = test_store(transport.clone()).await;
        std::fs::write(store.replay_path(3), b"stub").unwrap();

        let status = store.ensure_downloaded(3, "https://replays/3").await.unwrap();
        assert_eq!(status, ReplayStatus::Downloaded { bytes: 200 });
        assert_eq!(std::fs::read(store.replay_path(3)).unwrap().len(), 200);
    }

    #[tokio::test]
    async fn empty_url_is_rejected() {
        let transport = Arc::new(FakeTransport::serving(Vec::new()));
        let (store, _dir) = test_store(transport.clone()).await;

        assert!(matches!(
            store.ensure_downloaded(1, "").await,
            Err(FetchError::EmptyUrl)
        ));
        assert_eq!(transport.calls(), 0);
    }

    #[tokio::test]
    async fn load_chunks_decodes_stored_file() {
        let transport = Arc::new(FakeTransport::serving(Vec::new()));
        let (store, _dir) = test_store(transport).await;
        let store = store.with_decoder(ReplayDecoder::new(tracing::info_span!("decoder")));

        let mut raw = vec![0u8; 16 + 13];
        raw.extend_from_slice(&1u32.to_le_bytes());
        raw.push(0);
        raw.extend_from_slice(&[0u8; 12]);
        raw.extend_from_slice(&[0u8; 256]);
        raw.extend_from_slice(&0u32.to_le_bytes());
        std::fs::write(store.replay_path(11), &raw).unwrap();

        let chunks = store.load_chunks(11).await.unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, 1);
    }

    #[tokio::test]
    async fn load_chunks_without_file() {
        let transport = Arc::new(FakeTransport::serving(Vec::new()));
        let (store, _dir) = test_store(transport).await;

        assert!(matches!(
            store.load_chunks(99).await,
            Err(LoadError::NotStored(99))
        ));
    }
}
