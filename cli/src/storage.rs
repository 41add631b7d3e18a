use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use thiserror::Error;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncWrite, AsyncWriteExt};

const MAX_FILENAME_LEN: usize = 255;
const MAX_RENAME_ATTEMPTS: u32 = 10_000;

/// What to do when an attachment's file name is already taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollisionPolicy {
    /// Write `name_2.ext`, `name_3.ext`, ... instead
    #[default]
    Rename,
    Overwrite,
    Fail,
}

impl FromStr for CollisionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rename" => Ok(CollisionPolicy::Rename),
            "overwrite" => Ok(CollisionPolicy::Overwrite),
            "fail" => Ok(CollisionPolicy::Fail),
            other => Err(format!(
                "expected `rename`, `overwrite` or `fail`, got `{}`",
                other
            )),
        }
    }
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create output directory {}: {source}", path.display())]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("File {} already exists", .0.display())]
    FileExists(PathBuf),
}

/// Writes attachments into one output directory.
#[derive(Debug, Clone)]
pub struct AttachmentStore {
    dir: PathBuf,
    policy: CollisionPolicy,
}

impl AttachmentStore {
    pub fn new(dir: impl Into<PathBuf>, policy: CollisionPolicy) -> Self {
        Self {
            dir: dir.into(),
            policy,
        }
    }

    /// Saves `contents` under the sanitized `filename` and returns the path
    /// actually written. A failed write leaves no file behind.
    pub async fn save(&self, filename: &str, contents: &[u8]) -> Result<PathBuf, StorageError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| StorageError::CreateDir {
                path: self.dir.clone(),
                source,
            })?;

        let name = sanitize_filename(filename);
        let (path, file) = self.create(&name).await?;
        write_or_remove(path, file, contents).await
    }

    async fn create(&self, name: &str) -> Result<(PathBuf, File), StorageError> {
        let path = self.dir.join(name);
        match self.policy {
            CollisionPolicy::Overwrite => {
                let file = File::create(&path).await.map_err(|source| StorageError::Write {
                    path: path.clone(),
                    source,
                })?;
                Ok((path, file))
            }
            CollisionPolicy::Fail => match create_new(&path).await {
                Ok(file) => Ok((path, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    Err(StorageError::FileExists(path))
                }
                Err(source) => Err(StorageError::Write { path, source }),
            },
            CollisionPolicy::Rename => {
                let (stem, ext) = split_extension(name);
                for n in 1..=MAX_RENAME_ATTEMPTS {
                    let candidate = match n {
                        1 => path.clone(),
                        _ => self.dir.join(format!("{}_{}{}", stem, n, ext)),
                    };
                    match create_new(&candidate).await {
                        Ok(file) => {
                            if n > 1 {
                                tracing::info!(
                                    requested = name,
                                    path = %candidate.display(),
                                    "File name taken, saving under a new name"
                                );
                            }
                            return Ok((candidate, file));
                        }
                        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                        Err(source) => {
                            return Err(StorageError::Write {
                                path: candidate,
                                source,
                            });
                        }
                    }
                }
                Err(StorageError::FileExists(path))
            }
        }
    }
}

async fn create_new(path: &Path) -> io::Result<File> {
    // Atomic: fails with AlreadyExists if the path is taken
    OpenOptions::new().write(true).create_new(true).open(path).await
}

/// Writes `contents` to the freshly created `path`, deleting it again if
/// the write fails partway.
async fn write_or_remove<W>(
    path: PathBuf,
    writer: W,
    contents: &[u8],
) -> Result<PathBuf, StorageError>
where
    W: AsyncWrite + Unpin,
{
    if let Err(source) = write_contents(writer, contents).await {
        if let Err(e) = fs::remove_file(&path).await {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove partial file");
        }
        return Err(StorageError::Write { path, source });
    }
    Ok(path)
}

async fn write_contents<W>(mut writer: W, contents: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(contents).await?;
    writer.flush().await?;
    Ok(())
}

/// `report.tar.gz` → (`report.tar`, `.gz`); names without a dot, or with
/// only a leading one, have no extension.
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(pos) if pos > 0 => (&name[..pos], &name[pos..]),
        _ => (name, ""),
    }
}

/// Reduces an attacker-controlled file name to a safe single path component.
pub fn sanitize_filename(filename: &str) -> String {
    let last = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename);

    let cleaned: String = last
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let cleaned = cleaned.trim_matches(|c| c == '.' || c == ' ');

    if cleaned.is_empty() {
        return "attachment".to_string();
    }
    if cleaned.len() <= MAX_FILENAME_LEN {
        return cleaned.to_string();
    }

    let (stem, ext) = split_extension(cleaned);
    let ext = if ext.len() > 50 { "" } else { ext };
    let mut end = MAX_FILENAME_LEN - ext.len();
    while !stem.is_char_boundary(end.min(stem.len())) {
        end -= 1;
    }
    format!("{}{}", &stem[..end.min(stem.len())], ext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tempfile::TempDir;

    /// Passes the first `budget` bytes through to the file, then fails.
    struct FailAfter {
        file: File,
        budget: usize,
    }

    impl AsyncWrite for FailAfter {
        fn poll_write(
            mut self: Pin<&mut Self>,
            cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            let this = &mut *self;
            if this.budget == 0 {
                return Poll::Ready(Err(io::Error::other("disk full")));
            }
            let n = buf.len().min(this.budget);
            match Pin::new(&mut this.file).poll_write(cx, &buf[..n]) {
                Poll::Ready(Ok(written)) => {
                    this.budget -= written;
                    Poll::Ready(Ok(written))
                }
                other => other,
            }
        }

        fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Pin::new(&mut self.file).poll_flush(cx)
        }

        fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Pin::new(&mut self.file).poll_shutdown(cx)
        }
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("report.pdf"), "report.pdf");
        assert_eq!(sanitize_filename("Q3 report (final).pdf"), "Q3 report _final_.pdf");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\evil.exe"), "evil.exe");
        assert_eq!(sanitize_filename(".hidden"), "hidden");
        assert_eq!(sanitize_filename(".."), "attachment");
        assert_eq!(sanitize_filename(""), "attachment");
        assert_eq!(sanitize_filename("dir/"), "attachment");
        assert_eq!(sanitize_filename("Übersicht.txt"), "Übersicht.txt");
    }

    #[test]
    fn test_sanitize_filename_caps_length() {
        let long = format!("{}.pdf", "a".repeat(300));
        let sanitized = sanitize_filename(&long);
        assert_eq!(sanitized.len(), MAX_FILENAME_LEN);
        assert!(sanitized.ends_with(".pdf"));

        let wide = format!("{}.txt", "é".repeat(200));
        let sanitized = sanitize_filename(&wide);
        assert!(sanitized.len() <= MAX_FILENAME_LEN);
        assert!(sanitized.ends_with(".txt"));
    }

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("report.tar.gz"), ("report.tar", ".gz"));
        assert_eq!(split_extension("README"), ("README", ""));
        assert_eq!(split_extension(".env"), (".env", ""));
    }

    #[tokio::test]
    async fn test_save_creates_directory() {
        let tmp = TempDir::new().unwrap();
        let store = AttachmentStore::new(tmp.path().join("nested/out"), CollisionPolicy::Rename);

        let path = store.save("report.pdf", b"%PDF-1.4").await.unwrap();
        assert_eq!(path, tmp.path().join("nested/out/report.pdf"));
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.4");
    }

    #[tokio::test]
    async fn test_rename_on_conflict() {
        let tmp = TempDir::new().unwrap();
        let store = AttachmentStore::new(tmp.path(), CollisionPolicy::Rename);

        let first = store.save("report.pdf", b"one").await.unwrap();
        let second = store.save("report.pdf", b"two").await.unwrap();
        let third = store.save("report.pdf", b"three").await.unwrap();

        assert_eq!(first, tmp.path().join("report.pdf"));
        assert_eq!(second, tmp.path().join("report_2.pdf"));
        assert_eq!(third, tmp.path().join("report_3.pdf"));
        assert_eq!(std::fs::read(&first).unwrap(), b"one");
        assert_eq!(std::fs::read(&third).unwrap(), b"three");
    }

    #[tokio::test]
    async fn test_overwrite_on_conflict() {
        let tmp = TempDir::new().unwrap();
        let store = AttachmentStore::new(tmp.path(), CollisionPolicy::Overwrite);

        store.save("notes.txt", b"a much longer first version").await.unwrap();
        let path = store.save("notes.txt", b"short").await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"short");
    }

    #[tokio::test]
    async fn test_fail_on_conflict() {
        let tmp = TempDir::new().unwrap();
        let store = AttachmentStore::new(tmp.path(), CollisionPolicy::Fail);

        store.save("notes.txt", b"first").await.unwrap();
        let err = store.save("notes.txt", b"second").await.unwrap_err();

        assert!(matches!(err, StorageError::FileExists(_)));
        assert_eq!(std::fs::read(tmp.path().join("notes.txt")).unwrap(), b"first");
    }

    #[tokio::test]
    async fn test_failed_write_removes_partial_file() {
        let tmp = TempDir::new().unwrap();
        let store = AttachmentStore::new(tmp.path(), CollisionPolicy::Rename);
        let (path, file) = store.create("big.bin").await.unwrap();
        assert!(path.exists());

        let writer = FailAfter { file, budget: 4 };
        let err = write_or_remove(path.clone(), writer, b"0123456789")
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::Write { path: ref p, .. } if *p == path));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_output_dir_is_a_file() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("out");
        std::fs::write(&blocker, b"").unwrap();

        let store = AttachmentStore::new(&blocker, CollisionPolicy::Rename);
        let err = store.save("a.txt", b"x").await.unwrap_err();
        assert!(matches!(err, StorageError::CreateDir { .. }));
    }

    #[test]
    fn test_collision_policy_from_str() {
        assert_eq!("Rename".parse::<CollisionPolicy>(), Ok(CollisionPolicy::Rename));
        assert_eq!("overwrite".parse::<CollisionPolicy>(), Ok(CollisionPolicy::Overwrite));
        assert_eq!("FAIL".parse::<CollisionPolicy>(), Ok(CollisionPolicy::Fail));
        assert!("merge".parse::<CollisionPolicy>().is_err());
    }
}
