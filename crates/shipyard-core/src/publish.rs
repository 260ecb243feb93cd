use crate::config::ReleaseTarget;
use crate::signal::shutdown_flag;
use crate::CoreError;
use chrono::{DateTime, FixedOffset, Utc};
use shipyard_remote::StorageBackend;
use shipyard_schema::{
    digest_bytes, manifest_key, ContentDigest, ReleaseManifest, ReleaseUpdate,
    ARTIFACT_CONTENT_TYPE, MANIFEST_CONTENT_TYPE,
};
use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Upper bound on the buffer reserved up front from the stat'd size.
const MAX_PREALLOC: usize = 64 * 1024 * 1024;

/// A local artifact: its bytes plus the size and modification time recorded
/// when it was opened.
pub struct ArtifactSource<R> {
    reader: R,
    size: u64,
    modified: DateTime<FixedOffset>,
    path: PathBuf,
}

impl ArtifactSource<File> {
    pub fn open(path: &Path) -> Result<Self, CoreError> {
        let io_err = |context: &'static str| {
            move |source: io::Error| CoreError::Io {
                context,
                path: path.to_path_buf(),
                source,
            }
        };
        let file = File::open(path).map_err(io_err("open artifact"))?;
        let meta = file.metadata().map_err(io_err("stat artifact"))?;
        let modified = meta.modified().map_err(io_err("stat artifact"))?;
        Ok(Self {
            reader: file,
            size: meta.len(),
            modified: DateTime::<Utc>::from(modified).into(),
            path: path.to_path_buf(),
        })
    }
}

impl<R: Read + Seek> ArtifactSource<R> {
    pub fn new(
        reader: R,
        size: u64,
        modified: DateTime<FixedOffset>,
        path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            reader,
            size,
            modified,
            path: path.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn modified(&self) -> DateTime<FixedOffset> {
        self.modified
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole artifact from its start. The byte count must match the
    /// size seen at open time.
    fn read_counted(&mut self) -> Result<Vec<u8>, CoreError> {
        let io_err = |context: &'static str| {
            let path = self.path.clone();
            move |source: io::Error| CoreError::Io {
                context,
                path,
                source,
            }
        };
        self.reader
            .seek(SeekFrom::Start(0))
            .map_err(io_err("rewind artifact"))?;
        let capacity = usize::try_from(self.size).map_or(0, |n| n.min(MAX_PREALLOC));
        let mut data = Vec::with_capacity(capacity);
        (&mut self.reader)
            .take(self.size.saturating_add(1))
            .read_to_end(&mut data)
            .map_err(io_err("read artifact"))?;
        if data.len() as u64 != self.size {
            return Err(io_err("read artifact")(io::Error::other(format!(
                "artifact changed while publishing: expected {} bytes, read {}",
                self.size,
                data.len()
            ))));
        }
        Ok(data)
    }
}

/// Progress event emitted after each successful upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Uploaded<'a> {
    Artifact { key: &'a str, bytes: u64 },
    Manifest { key: &'a str },
}

/// Outcome of a successful publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub checksum: ContentDigest,
    pub artifact_key: String,
    pub manifest_key: String,
    pub size: u64,
    pub build: DateTime<FixedOffset>,
    /// Whether a manifest already existed before this publish.
    pub manifest_existed: bool,
}

/// Publishes one artifact and its manifest record to a storage backend.
pub struct Publisher<'a> {
    backend: &'a dyn StorageBackend,
    cancel: &'a AtomicBool,
    notify: Option<Box<dyn Fn(&Uploaded<'_>) + 'a>>,
}

impl<'a> Publisher<'a> {
    /// Publisher that stops on the process-wide shutdown flag.
    pub fn new(backend: &'a dyn StorageBackend) -> Self {
        Self {
            backend,
            cancel: shutdown_flag(),
            notify: None,
        }
    }

    #[must_use]
    pub fn with_cancel_flag(mut self, cancel: &'a AtomicBool) -> Self {
        self.cancel = cancel;
        self
    }

    /// Call `f` after each upload completes.
    #[must_use]
    pub fn on_upload<F>(mut self, f: F) -> Self
    where
        F: Fn(&Uploaded<'_>) + 'a,
    {
        self.notify = Some(Box::new(f));
        self
    }

    pub fn publish_file(
        &self,
        target: &ReleaseTarget,
        path: &Path,
    ) -> Result<PublishReport, CoreError> {
        self.publish(target, ArtifactSource::open(path)?)
    }

    /// Run a full publish for `target`.
    ///
    /// Steps, in order: fetch and decode the manifest, read and digest the
    /// artifact, merge the release record, encode the manifest, upload the
    /// artifact, upload the manifest. Nothing is written if any step before the
    /// artifact upload fails, and the manifest is never written if the
    /// artifact upload fails.
    pub fn publish<R: Read + Seek>(
        &self,
        target: &ReleaseTarget,
        mut source: ArtifactSource<R>,
    ) -> Result<PublishReport, CoreError> {
        let manifest_key = manifest_key(&target.app_id);

        info!("fetching manifest {manifest_key}");
        let fetched = self
            .backend
            .fetch_optional(&manifest_key)
            .map_err(|source| CoreError::ManifestFetch {
                key: manifest_key.clone(),
                source,
            })?;
        let manifest_existed = fetched.is_some();
        let mut manifest = match fetched {
            Some(data) => ReleaseManifest::from_bytes(&data).map_err(|source| {
                CoreError::ManifestDecode {
                    key: manifest_key.clone(),
                    source,
                }
            })?,
            None => {
                info!("no manifest at {manifest_key}, starting a new one");
                ReleaseManifest::new()
            }
        };

        info!("reading {}", source.path().display());
        let data = source.read_counted()?;
        let checksum = digest_bytes(&data);
        debug!("{} bytes, checksum {checksum}", data.len());

        let update = ReleaseUpdate {
            app_id: target.app_id.clone(),
            channel: target.channel.clone(),
            platform: target.platform.clone(),
            version: target.version.clone(),
            build: source.modified,
            checksum,
        };
        manifest.apply(&update).map_err(CoreError::InvalidTarget)?;
        let manifest_bytes = manifest.to_bytes().map_err(CoreError::Serialization)?;
        let artifact_key = update.artifact_key();

        self.check_cancel("artifact upload")?;
        info!("uploading artifact {artifact_key}");
        self.backend
            .put_object(&artifact_key, &data, ARTIFACT_CONTENT_TYPE)
            .map_err(|source| CoreError::ArtifactUpload {
                key: artifact_key.clone(),
                source,
            })?;
        self.emit(&Uploaded::Artifact {
            key: &artifact_key,
            bytes: source.size,
        });

        self.check_cancel("manifest upload")?;
        info!("uploading manifest {manifest_key}");
        self.backend
            .put_object(&manifest_key, &manifest_bytes, MANIFEST_CONTENT_TYPE)
            .map_err(|source| CoreError::ManifestUpload {
                key: manifest_key.clone(),
                source,
            })?;
        self.emit(&Uploaded::Manifest { key: &manifest_key });

        Ok(PublishReport {
            checksum: update.checksum,
            artifact_key,
            manifest_key,
            size: source.size,
            build: update.build,
            manifest_existed,
        })
    }

    fn check_cancel(&self, step: &'static str) -> Result<(), CoreError> {
        if self.cancel.load(Ordering::SeqCst) {
            return Err(CoreError::Interrupted(step));
        }
        Ok(())
    }

    fn emit(&self, event: &Uploaded<'_>) {
        if let Some(notify) = &self.notify {
            notify(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shipyard_remote::{BackendCall, MemoryBackend};
    use std::cell::RefCell;
    use std::io::Cursor;

    fn target() -> ReleaseTarget {
        ReleaseTarget {
            app_id: "app1".to_owned(),
            channel: "stable".to_owned(),
            platform: "linux-x64".to_owned(),
            version: "1.0.0".to_owned(),
        }
    }

    fn build_time() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-06-01T09:00:00Z").unwrap()
    }

    fn source(bytes: &[u8]) -> ArtifactSource<Cursor<Vec<u8>>> {
        ArtifactSource::new(
            Cursor::new(bytes.to_vec()),
            bytes.len() as u64,
            build_time(),
            "app.bin",
        )
    }

    /// Never set, so `run` is not affected by a real Ctrl-C in the test process.
    static NOT_CANCELLED: AtomicBool = AtomicBool::new(false);

    fn run(backend: &MemoryBackend, bytes: &[u8]) -> Result<PublishReport, CoreError> {
        Publisher::new(backend)
            .with_cancel_flag(&NOT_CANCELLED)
            .publish(&target(), source(bytes))
    }

    fn stored_manifest(backend: &MemoryBackend) -> String {
        String::from_utf8(backend.object("app1/manifest.json").unwrap().data).unwrap()
    }

    #[test]
    fn publish_into_empty_bucket() {
        let backend = MemoryBackend::new();
        let report = run(&backend, b"hello").unwrap();

        let h = digest_bytes(b"hello");
        assert_eq!(report.checksum, h);
        assert_eq!(report.artifact_key, format!("app1/artifact/{h}"));
        assert_eq!(report.manifest_key, "app1/manifest.json");
        assert_eq!(report.size, 5);
        assert!(!report.manifest_existed);

        let artifact = backend.object(&report.artifact_key).unwrap();
        assert_eq!(artifact.data, b"hello");
        assert_eq!(artifact.content_type, "application/octet-stream");
        assert_eq!(
            backend.object("app1/manifest.json").unwrap().content_type,
            "application/json"
        );
        assert_eq!(
            stored_manifest(&backend),
            format!(
                r#"{{"channel":{{"stable":{{"version":"1.0.0","build":"2024-06-01T09:00:00Z","artifact":{{"linux-x64":{{"binary":"app1/artifact/{h}","checksum":"{h}","patch":""}}}}}}}}}}"#
            )
        );
    }

    #[test]
    fn uploads_artifact_before_manifest() {
        let backend = MemoryBackend::new();
        let report = run(&backend, b"hello").unwrap();
        assert_eq!(
            backend.calls(),
            vec![
                BackendCall::Get("app1/manifest.json".to_owned()),
                BackendCall::Put {
                    key: report.artifact_key.clone(),
                    content_type: "application/octet-stream".to_owned(),
                },
                BackendCall::Put {
                    key: "app1/manifest.json".to_owned(),
                    content_type: "application/json".to_owned(),
                },
            ]
        );
    }

    #[test]
    fn republishing_same_bytes_is_stable() {
        let backend = MemoryBackend::new();
        run(&backend, b"hello").unwrap();
        let first = stored_manifest(&backend);
        let report = run(&backend, b"hello").unwrap();
        assert!(report.manifest_existed);
        assert_eq!(stored_manifest(&backend), first);
        assert_eq!(backend.keys().len(), 2);
    }

    #[test]
    fn fetch_error_aborts_before_any_upload() {
        let backend = MemoryBackend::new();
        backend.fail_gets("HTTP 500 for GET");
        let err = run(&backend, b"hello").unwrap_err();
        assert!(matches!(err, CoreError::ManifestFetch { .. }));
        assert!(backend.put_keys().is_empty());
        assert!(backend.keys().is_empty());
    }

    #[test]
    fn undecodable_manifest_aborts_before_any_upload() {
        let backend = MemoryBackend::new();
        backend.insert("app1/manifest.json", b"{not json", "application/json");
        let err = run(&backend, b"hello").unwrap_err();
        assert!(matches!(err, CoreError::ManifestDecode { .. }));
        assert!(backend.put_keys().is_empty());
    }

    #[test]
    fn artifact_upload_failure_skips_manifest() {
        let backend = MemoryBackend::new();
        backend.fail_puts_with_prefix("app1/artifact/", "HTTP 503");
        let err = run(&backend, b"hello").unwrap_err();
        assert!(matches!(err, CoreError::ArtifactUpload { .. }));
        assert_eq!(backend.put_keys().len(), 1);
        assert!(backend.object("app1/manifest.json").is_none());
    }

    #[test]
    fn manifest_upload_failure_is_reported() {
        let backend = MemoryBackend::new();
        backend.fail_puts_with_prefix("app1/manifest", "HTTP 503");
        let err = run(&backend, b"hello").unwrap_err();
        match err {
            CoreError::ManifestUpload { key, .. } => assert_eq!(key, "app1/manifest.json"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn empty_target_field_aborts_before_any_upload() {
        let backend = MemoryBackend::new();
        let cancel = AtomicBool::new(false);
        let mut t = target();
        t.platform.clear();
        let err = Publisher::new(&backend)
            .with_cancel_flag(&cancel)
            .publish(&t, source(b"hello"))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidTarget(_)));
        assert!(backend.put_keys().is_empty());
    }

    #[test]
    fn cancel_flag_stops_before_uploads() {
        let backend = MemoryBackend::new();
        let cancel = AtomicBool::new(true);
        let err = Publisher::new(&backend)
            .with_cancel_flag(&cancel)
            .publish(&target(), source(b"hello"))
            .unwrap_err();
        assert!(matches!(err, CoreError::Interrupted("artifact upload")));
        assert!(backend.put_keys().is_empty());
    }

    #[test]
    fn cancel_between_uploads_skips_manifest() {
        let backend = MemoryBackend::new();
        let cancel = AtomicBool::new(false);
        let err = Publisher::new(&backend)
            .with_cancel_flag(&cancel)
            .on_upload(|_| cancel.store(true, Ordering::SeqCst))
            .publish(&target(), source(b"hello"))
            .unwrap_err();
        assert!(matches!(err, CoreError::Interrupted("manifest upload")));
        assert_eq!(backend.put_keys().len(), 1);
        assert!(backend.object("app1/manifest.json").is_none());
    }

    #[test]
    fn size_mismatch_is_an_io_error() {
        let backend = MemoryBackend::new();
        let short = ArtifactSource::new(Cursor::new(b"hello".to_vec()), 9, build_time(), "app.bin");
        let cancel = AtomicBool::new(false);
        let err = Publisher::new(&backend)
            .with_cancel_flag(&cancel)
            .publish(&target(), short)
            .unwrap_err();
        assert!(matches!(err, CoreError::Io { context: "read artifact", .. }));
        assert!(err.to_string().contains("artifact changed while publishing"));
        assert!(backend.put_keys().is_empty());
    }

    #[test]
    fn oversized_declared_size_is_an_io_error() {
        let backend = MemoryBackend::new();
        let huge = ArtifactSource::new(
            Cursor::new(b"hello".to_vec()),
            u64::MAX,
            build_time(),
            "app.bin",
        );
        let cancel = AtomicBool::new(false);
        let err = Publisher::new(&backend)
            .with_cancel_flag(&cancel)
            .publish(&target(), huge)
            .unwrap_err();
        assert!(matches!(err, CoreError::Io { context: "read artifact", .. }));
        assert!(err.to_string().contains("artifact changed while publishing"));
        assert!(backend.put_keys().is_empty());
    }

    #[test]
    fn reads_from_start_regardless_of_position() {
        let backend = MemoryBackend::new();
        let mut cursor = Cursor::new(b"hello".to_vec());
        cursor.set_position(3);
        let cancel = AtomicBool::new(false);
        let report = Publisher::new(&backend)
            .with_cancel_flag(&cancel)
            .publish(
                &target(),
                ArtifactSource::new(cursor, 5, build_time(), "app.bin"),
            )
            .unwrap();
        assert_eq!(report.checksum, digest_bytes(b"hello"));
        assert_eq!(backend.object(&report.artifact_key).unwrap().data, b"hello");
    }

    #[test]
    fn notifies_each_upload_in_order() {
        let backend = MemoryBackend::new();
        let cancel = AtomicBool::new(false);
        let seen = RefCell::new(Vec::new());
        let report = Publisher::new(&backend)
            .with_cancel_flag(&cancel)
            .on_upload(|event| {
                seen.borrow_mut().push(match event {
                    Uploaded::Artifact { key, bytes } => format!("artifact {key} {bytes}"),
                    Uploaded::Manifest { key } => format!("manifest {key}"),
                });
            })
            .publish(&target(), source(b"hello"))
            .unwrap();
        assert_eq!(
            seen.into_inner(),
            vec![
                format!("artifact {} 5", report.artifact_key),
                "manifest app1/manifest.json".to_owned(),
            ]
        );
    }
}
