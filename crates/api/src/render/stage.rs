//! Input staging, background resolution, and artifact promotion.
//!
//! All paths are derived from the injected [`MediaConfig`] roots -- the
//! pipeline never touches ambient filesystem constants, which keeps it
//! unit-testable against temporary directories.
//!
//! [`MediaConfig`]: crate::config::MediaConfig

use std::path::{Path, PathBuf};

use tokio::fs;
use waveclip_core::command::{lavfi_background, BackgroundSource};
use waveclip_core::visual::Background;

use super::RenderError;

/// Resolve the song's audio reference to a concrete local file.
///
/// Remote `http(s)` URLs are downloaded into the working directory;
/// anything else is treated as a server-relative asset path beneath the
/// public root and must already exist. The attempted path is included in
/// the error so a missing file is diagnosable.
pub async fn resolve_audio(
    http: &reqwest::Client,
    public_root: &Path,
    workdir: &Path,
    audio_url: &str,
) -> Result<PathBuf, RenderError> {
    if is_remote(audio_url) {
        let target = workdir.join(filename_from_url(audio_url, "audio"));
        download_to(http, audio_url, &target).await?;
        Ok(target)
    } else {
        resolve_public_asset(public_root, audio_url).await
    }
}

/// Resolve the background input for the encoder.
///
/// Precedence: explicit custom image > the song's own cover artwork >
/// procedurally generated fill sized to the probed duration. A missing
/// custom image is a hard failure; missing cover art silently falls back
/// to the generated fill, since the song record may simply predate
/// artwork support.
pub async fn resolve_background(
    http: &reqwest::Client,
    public_root: &Path,
    workdir: &Path,
    background: &Background,
    cover_art_url: Option<&str>,
    duration_secs: f64,
) -> Result<BackgroundSource, RenderError> {
    match background {
        Background::Custom { path } => {
            let resolved = resolve_public_asset(public_root, path).await?;
            Ok(BackgroundSource::Image(resolved))
        }
        Background::CoverArt => match cover_art_url {
            Some(url) if is_remote(url) => {
                let target = workdir.join(filename_from_url(url, "cover"));
                download_to(http, url, &target).await?;
                Ok(BackgroundSource::Image(target))
            }
            Some(url) => match resolve_public_asset(public_root, url).await {
                Ok(path) => Ok(BackgroundSource::Image(path)),
                Err(RenderError::AssetNotFound { path }) => {
                    tracing::warn!(path, "Cover art missing; using generated background");
                    Ok(BackgroundSource::Lavfi(lavfi_background(
                        &Background::default(),
                        duration_secs,
                    )))
                }
                Err(e) => Err(e),
            },
            None => Ok(BackgroundSource::Lavfi(lavfi_background(
                &Background::default(),
                duration_secs,
            ))),
        },
        generated => Ok(BackgroundSource::Lavfi(lavfi_background(
            generated,
            duration_secs,
        ))),
    }
}

/// Promote the private render output into its public location.
///
/// Rename is atomic on the same filesystem; if the workdir sits on a
/// different filesystem the rename fails and we fall back to
/// copy-then-remove.
pub async fn promote(private: &Path, public: &Path) -> Result<(), RenderError> {
    if let Some(parent) = public.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|e| storage_error(parent, e))?;
    }

    match fs::rename(private, public).await {
        Ok(()) => Ok(()),
        Err(_) => {
            fs::copy(private, public)
                .await
                .map_err(|e| storage_error(public, e))?;
            let _ = fs::remove_file(private).await;
            Ok(())
        }
    }
}

/// Remove a job's working directory. Best-effort: a cleanup failure is
/// logged, never surfaced -- the job outcome is already decided.
pub async fn cleanup_workdir(workdir: &Path) {
    match fs::remove_dir_all(workdir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(workdir = %workdir.display(), error = %e, "Workdir cleanup failed");
        }
    }
}

/// Whether an asset reference is a remote URL.
fn is_remote(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// Resolve a server-relative reference beneath the public asset root,
/// verifying the file exists.
///
/// References come from client-supplied request bodies; anything with a
/// parent-directory component is rejected so a reference can never
/// resolve outside the root.
async fn resolve_public_asset(public_root: &Path, reference: &str) -> Result<PathBuf, RenderError> {
    let relative = reference.trim_start_matches('/');
    if Path::new(relative)
        .components()
        .any(|c| matches!(c, std::path::Component::ParentDir))
    {
        return Err(RenderError::AssetNotFound {
            path: reference.to_string(),
        });
    }

    let path = public_root.join(relative);
    match fs::metadata(&path).await {
        Ok(_) => Ok(path),
        Err(_) => Err(RenderError::AssetNotFound {
            path: path.display().to_string(),
        }),
    }
}

/// Download a remote asset into the working directory.
async fn download_to(
    http: &reqwest::Client,
    url: &str,
    target: &Path,
) -> Result<(), RenderError> {
    let response = http.get(url).send().await?.error_for_status()?;
    let bytes = response.bytes().await?;
    fs::write(target, &bytes)
        .await
        .map_err(|e| storage_error(target, e))?;
    Ok(())
}

/// Extract a filename from a URL by taking the last path segment,
/// stripping query parameters and fragments.
fn filename_from_url(url: &str, fallback: &str) -> String {
    let clean = url.split('?').next().unwrap_or(url);
    let clean = clean.split('#').next().unwrap_or(clean);

    let path = if let Some(rest) = clean
        .strip_prefix("https://")
        .or_else(|| clean.strip_prefix("http://"))
    {
        rest.find('/').map(|i| &rest[i..]).unwrap_or("")
    } else {
        clean
    };

    path.rsplit('/')
        .find(|s| !s.is_empty())
        .unwrap_or(fallback)
        .to_string()
}

fn storage_error(path: &Path, source: std::io::Error) -> RenderError {
    RenderError::Storage {
        path: path.display().to_string(),
        source,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
