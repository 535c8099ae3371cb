//! Best-effort audio preview extraction across ranked candidates.
//!
//! Candidates are tried strictly in rank order. Each attempt downloads the
//! best available audio stream into a scoped temp dir (`yt-dlp`), cuts and
//! re-encodes the requested window (`ffmpeg`, AAC), and reads the clip into
//! memory. The temp dir is an RAII guard, so storage is released on every
//! exit path. The first end-to-end success wins; only exhaustion of all
//! candidates is an error.

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::{info, warn};

use crate::error::{Error, Result};

pub const MIN_PREVIEW_SECS: f64 = 5.0;
pub const MAX_PREVIEW_SECS: f64 = 90.0;

const PRIMARY_FORMAT: &str =
    "bestaudio[ext=m4a]/bestaudio[ext=mp4]/bestaudio/best[height<=480]/best";
/// Maximally permissive retry when the primary selection fails.
const FALLBACK_FORMAT: &str = "worst/best";

/// What to cut out of the downloaded track.
#[derive(Debug, Clone, Copy)]
pub struct PreviewSpec {
    pub start_sec: f64,
    pub length_sec: f64,
    pub bitrate_kbps: u32,
}

impl PreviewSpec {
    fn validate(&self) -> Result<()> {
        if self.start_sec < 0.0 {
            return Err(Error::provider("preview start must be >= 0"));
        }
        if self.length_sec < MIN_PREVIEW_SECS || self.length_sec > MAX_PREVIEW_SECS {
            return Err(Error::provider(format!(
                "preview length {}s outside [{MIN_PREVIEW_SECS}, {MAX_PREVIEW_SECS}]",
                self.length_sec
            )));
        }
        Ok(())
    }
}

/// A re-encoded audio clip, read fully into memory. Ephemeral.
#[derive(Debug, Clone)]
pub struct PreviewArtifact {
    pub bytes: Vec<u8>,
    pub duration_sec: f64,
    pub bitrate_kbps: u32,
    pub codec: &'static str,
    pub source_url: String,
}

/// Pipeline driver holding the external tool paths.
#[derive(Debug, Clone)]
pub struct AudioExtractor {
    yt_dlp: String,
    ffmpeg: String,
    work_dir: PathBuf,
}

impl AudioExtractor {
    pub fn new(yt_dlp: &str, ffmpeg: &str, work_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(work_dir)
            .map_err(|e| Error::provider(format!("create {}: {e}", work_dir.display())))?;
        Ok(Self {
            yt_dlp: yt_dlp.to_string(),
            ffmpeg: ffmpeg.to_string(),
            work_dir: work_dir.to_path_buf(),
        })
    }

    /// Try each candidate in order; first end-to-end success produces the
    /// artifact. Per-candidate failures are logged and skipped; exhaustion
    /// reports the last failure.
    pub async fn extract(&self, candidate_urls: &[String], spec: &PreviewSpec) -> Result<PreviewArtifact> {
        spec.validate()?;
        if candidate_urls.is_empty() {
            return Err(Error::no_results("no preview candidates to try"));
        }

        let mut last: Option<(String, Error)> = None;
        for url in candidate_urls {
            match self.attempt(url, spec).await {
                Ok(artifact) => {
                    info!(%url, bytes = artifact.bytes.len(), "preview extracted");
                    return Ok(artifact);
                }
                Err(e) => {
                    warn!(%url, error = %e, "preview candidate failed, trying next");
                    last = Some((url.clone(), e));
                }
            }
        }

        let (url, e) = last.expect("at least one candidate was attempted");
        Err(Error::provider(format!(
            "all {} preview candidates failed; last ({url}): {e}",
            candidate_urls.len()
        )))
    }

    async fn attempt(&self, url: &str, spec: &PreviewSpec) -> Result<PreviewArtifact> {
        // Dropped on every exit path below, releasing the storage.
        let tmp = tempfile::Builder::new()
            .prefix("preview-")
            .tempdir_in(&self.work_dir)
            .map_err(|e| Error::provider(format!("create temp dir: {e}")))?;

        let src = self.download_best_audio(url, tmp.path()).await?;
        let clip = tmp.path().join("clip.m4a");
        self.cut_to_m4a(&src, &clip, spec).await?;

        let bytes = tokio::fs::read(&clip)
            .await
            .map_err(|e| Error::provider(format!("read clip: {e}")))?;

        Ok(PreviewArtifact {
            bytes,
            duration_sec: spec.length_sec,
            bitrate_kbps: spec.bitrate_kbps,
            codec: "aac",
            source_url: url.to_string(),
        })
    }

    /// Download the best audio stream, retrying once with a maximally
    /// permissive format before giving up on this candidate.
    async fn download_best_audio(&self, url: &str, dir: &Path) -> Result<PathBuf> {
        let primary = self.run_yt_dlp(url, dir, PRIMARY_FORMAT).await;
        if let Err(primary_err) = primary {
            warn!(%url, error = %primary_err, "primary format failed, retrying permissive");
            if let Err(fallback_err) = self.run_yt_dlp(url, dir, FALLBACK_FORMAT).await {
                return Err(Error::provider(format!(
                    "download failed (primary and fallback): primary: {primary_err}, fallback: {fallback_err}"
                )));
            }
        }
        newest_download(dir)
    }

    async fn run_yt_dlp(&self, url: &str, dir: &Path, format: &str) -> Result<()> {
        let out_tmpl = dir.join("%(id)s.%(ext)s");
        let out = Command::new(&self.yt_dlp)
            .arg("-f")
            .arg(format)
            .arg("-o")
            .arg(&out_tmpl)
            .arg("--no-playlist")
            .arg("--quiet")
            .arg("--no-warnings")
            .args(["--socket-timeout", "15"])
            .args(["--retries", "3"])
            .args(["--concurrent-fragments", "4"])
            .arg(url)
            .output()
            .await
            .map_err(|e| Error::provider(format!("spawn {}: {e}", self.yt_dlp)))?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(Error::provider(format!(
                "{} exited with {}: {}",
                self.yt_dlp,
                out.status,
                stderr.trim()
            )));
        }
        Ok(())
    }

    async fn cut_to_m4a(&self, src: &Path, dst: &Path, spec: &PreviewSpec) -> Result<()> {
        let out = Command::new(&self.ffmpeg)
            .args(["-hide_banner", "-loglevel", "error"])
            .args(["-ss", &spec.start_sec.to_string()])
            .args(["-t", &spec.length_sec.to_string()])
            .arg("-i")
            .arg(src)
            .arg("-vn")
            .args(["-c:a", "aac"])
            .args(["-b:a", &format!("{}k", spec.bitrate_kbps)])
            .args(["-movflags", "faststart"])
            .arg(dst)
            .output()
            .await
            .map_err(|e| Error::provider(format!("spawn {}: {e}", self.ffmpeg)))?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(Error::provider(format!(
                "{} exited with {}: {}",
                self.ffmpeg,
                out.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

/// The downloaded track is the newest complete file in the temp dir
/// (yt-dlp picks the extension).
fn newest_download(dir: &Path) -> Result<PathBuf> {
    let mut files: Vec<(std::time::SystemTime, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| Error::provider(format!("list {}: {e}", dir.display())))? {
        let entry = entry.map_err(|e| Error::provider(format!("read dir entry: {e}")))?;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(".part") || name.ends_with(".info.json") || !path.is_file() {
            continue;
        }
        let mtime = entry
            .metadata()
            .and_then(|m| m.modified())
            .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
        files.push((mtime, path));
    }
    files.sort_by_key(|(mtime, _)| *mtime);
    files
        .pop()
        .map(|(_, path)| path)
        .ok_or_else(|| Error::provider("download produced no file"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPEC: PreviewSpec = PreviewSpec {
        start_sec: 10.0,
        length_sec: 30.0,
        bitrate_kbps: 128,
    };

    /// yt-dlp stand-in: fails for urls containing "fail", otherwise drops a
    /// fake track next to the `-o` output template.
    const FAKE_YTDLP: &str = r#"#!/bin/sh
out=""; prev=""; url=""
for a in "$@"; do
  [ "$prev" = "-o" ] && out="$a"
  prev="$a"; url="$a"
done
case "$url" in
  *fail*) echo "simulated download failure" >&2; exit 1 ;;
esac
printf 'AUDIO' > "$(dirname "$out")/track.m4a"
"#;

    /// ffmpeg stand-in: writes clip bytes to its last argument.
    const FAKE_FFMPEG: &str = r#"#!/bin/sh
for a in "$@"; do dst="$a"; done
printf 'CLIPBYTES' > "$dst"
"#;

    fn write_stub(dir: &Path, name: &str, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path.to_string_lossy().into_owned()
    }

    fn extractor(stub_dir: &Path, work_dir: &Path) -> AudioExtractor {
        let yt_dlp = write_stub(stub_dir, "fake-yt-dlp", FAKE_YTDLP);
        let ffmpeg = write_stub(stub_dir, "fake-ffmpeg", FAKE_FFMPEG);
        AudioExtractor::new(&yt_dlp, &ffmpeg, work_dir).unwrap()
    }

    #[tokio::test]
    async fn test_second_candidate_wins_and_temp_is_released() {
        let stubs = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let ex = extractor(stubs.path(), work.path());

        let urls = vec![
            "https://example.com/watch?v=fail1".to_string(),
            "https://example.com/watch?v=good".to_string(),
            "https://example.com/watch?v=fail2".to_string(),
        ];
        let artifact = ex.extract(&urls, &SPEC).await.unwrap();

        assert_eq!(artifact.source_url, urls[1]);
        assert_eq!(artifact.bytes, b"CLIPBYTES");
        assert_eq!(artifact.codec, "aac");
        assert_eq!(artifact.bitrate_kbps, 128);

        // Every attempt's temp dir is gone once the call returns.
        let leftovers: Vec<_> = std::fs::read_dir(work.path()).unwrap().collect();
        assert!(leftovers.is_empty(), "temp dirs leaked: {leftovers:?}");
    }

    #[tokio::test]
    async fn test_all_candidates_fail_reports_last() {
        let stubs = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let ex = extractor(stubs.path(), work.path());

        let urls = vec![
            "https://example.com/watch?v=fail-first".to_string(),
            "https://example.com/watch?v=fail-last".to_string(),
        ];
        let err = ex.extract(&urls, &SPEC).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("fail-last"), "message was: {msg}");
        assert!(matches!(err, Error::Provider(_)));

        let leftovers: Vec<_> = std::fs::read_dir(work.path()).unwrap().collect();
        assert!(leftovers.is_empty(), "temp dirs leaked: {leftovers:?}");
    }

    #[tokio::test]
    async fn test_spec_bounds_enforced() {
        let stubs = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let ex = extractor(stubs.path(), work.path());
        let urls = vec!["https://example.com/watch?v=good".to_string()];

        for bad in [
            PreviewSpec { start_sec: -1.0, ..SPEC },
            PreviewSpec { length_sec: 3.0, ..SPEC },
            PreviewSpec { length_sec: 91.0, ..SPEC },
        ] {
            assert!(ex.extract(&urls, &bad).await.is_err());
        }
    }

    #[tokio::test]
    async fn test_empty_candidates_is_no_results() {
        let stubs = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let ex = extractor(stubs.path(), work.path());
        let err = ex.extract(&[], &SPEC).await.unwrap_err();
        assert!(matches!(err, Error::NoResults(_)));
    }

    #[test]
    fn test_newest_download_skips_partials() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("track.m4a.part"), b"x").unwrap();
        std::fs::write(dir.path().join("track.info.json"), b"{}").unwrap();
        std::fs::write(dir.path().join("track.m4a"), b"audio").unwrap();
        let picked = newest_download(dir.path()).unwrap();
        assert_eq!(picked.file_name().unwrap(), "track.m4a");
    }

    #[test]
    fn test_newest_download_empty_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(newest_download(dir.path()).is_err());
    }
}
