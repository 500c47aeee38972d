use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::constants::APP_DIR_NAME;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine cache directory")]
    NoCacheDir,
    #[error("model {name} not found (searched {searched:?}) and no download URL configured")]
    NotFound { name: String, searched: Vec<PathBuf> },
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// Resolve a model file by name.
///
/// Resolution order:
/// 1. User cache directory (platform-specific)
/// 2. `model_dir` (configured or bundled models)
/// 3. Download from `url` into the cache, when a URL is configured
pub fn resolve(
    name: &str,
    url: Option<&str>,
    model_dir: Option<&Path>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    let cache_dir = model_cache_dir()?;
    resolve_in(&cache_dir, name, url, model_dir, progress)
}

fn resolve_in(
    cache_dir: &Path,
    name: &str,
    url: Option<&str>,
    model_dir: Option<&Path>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    let cached_path = cache_dir.join(name);
    if cached_path.exists() {
        return Ok(cached_path);
    }

    let mut searched = vec![cached_path.clone()];
    if let Some(dir) = model_dir {
        let local_path = dir.join(name);
        if local_path.exists() {
            return Ok(local_path);
        }
        searched.push(local_path);
    }

    let Some(url) = url else {
        return Err(ModelResolveError::NotFound {
            name: name.to_string(),
            searched,
        });
    };

    log::info!("Downloading {name} from {url}");
    fs::create_dir_all(cache_dir).map_err(ModelResolveError::CacheDir)?;
    download(url, &cached_path, progress)?;
    Ok(cached_path)
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/Facemark/models/`
/// - Linux: `$XDG_CACHE_HOME/Facemark/models/` or `~/.cache/Facemark/models/`
/// - Windows: `%LOCALAPPDATA%/Facemark/models/`
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    {
        dirs::data_dir()
            .map(|d| d.join(APP_DIR_NAME).join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::cache_dir()
            .map(|d| d.join(APP_DIR_NAME).join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
}

fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let temp_path = dest.with_extension("part");

    let result = download_inner(url, dest, &temp_path, progress);

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }

    result
}

fn download_inner(
    url: &str,
    dest: &Path,
    temp_path: &Path,
    progress: Option<ProgressFn>,
) -> Result<(), ModelResolveError> {
    let write_err = |path: &Path| {
        let path = path.to_path_buf();
        move |e| ModelResolveError::Write { path, source: e }
    };

    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| ModelResolveError::Download {
            url: url.to_string(),
            source: e,
        })?;

    let total = response.content_length().unwrap_or(0);
    let mut downloaded: u64 = 0;

    let mut file = fs::File::create(temp_path).map_err(write_err(temp_path))?;

    let mut buf = vec![0u8; 1024 * 1024];
    loop {
        let n = response.read(&mut buf).map_err(write_err(temp_path))?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).map_err(write_err(temp_path))?;
        downloaded += n as u64;
        if let Some(ref cb) = progress {
            cb(downloaded, total);
        }
    }

    file.flush().map_err(write_err(temp_path))?;
    drop(file);

    fs::rename(temp_path, dest).map_err(write_err(dest))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_prefers_cached_file() {
        let tmp = TempDir::new().unwrap();
        let cache = tmp.path().join("cache");
        let local = tmp.path().join("local");
        fs::create_dir_all(&cache).unwrap();
        fs::create_dir_all(&local).unwrap();
        fs::write(cache.join("mesh.onnx"), b"cached").unwrap();
        fs::write(local.join("mesh.onnx"), b"local").unwrap();

        let path = resolve_in(&cache, "mesh.onnx", None, Some(&local), None).unwrap();
        assert_eq!(path, cache.join("mesh.onnx"));
    }

    #[test]
    fn test_resolve_falls_back_to_model_dir() {
        let tmp = TempDir::new().unwrap();
        let cache = tmp.path().join("cache");
        let local = tmp.path().join("local");
        fs::create_dir_all(&local).unwrap();
        fs::write(local.join("mesh.onnx"), b"local").unwrap();

        let path = resolve_in(&cache, "mesh.onnx", None, Some(&local), None).unwrap();
        assert_eq!(path, local.join("mesh.onnx"));
    }

    #[test]
    fn test_resolve_without_url_reports_searched_paths() {
        let tmp = TempDir::new().unwrap();
        let cache = tmp.path().join("cache");
        let local = tmp.path().join("local");

        let err = resolve_in(&cache, "mesh.onnx", None, Some(&local), None).unwrap_err();
        match err {
            ModelResolveError::NotFound { name, searched } => {
                assert_eq!(name, "mesh.onnx");
                assert_eq!(searched, vec![cache.join("mesh.onnx"), local.join("mesh.onnx")]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_model_cache_dir_returns_path() {
        let path = model_cache_dir().unwrap();
        assert!(path.to_string_lossy().contains("Facemark"));
        assert!(path.to_string_lossy().contains("models"));
    }

    #[test]
    fn test_download_invalid_url_returns_error() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("model.onnx");
        let result = download("http://invalid.nonexistent.example.com/model", &dest, None);
        assert!(result.is_err());
    }

    #[test]
    fn test_download_atomic_no_partial_on_failure() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("model.onnx");
        let _ = download("http://invalid.nonexistent.example.com/model", &dest, None);
        assert!(!dest.exists());
        assert!(!dest.with_extension("part").exists());
    }

    #[test]
    fn test_resolve_with_unreachable_url_leaves_cache_clean() {
        let tmp = TempDir::new().unwrap();
        let cache = tmp.path().join("cache");
        let result = resolve_in(
            &cache,
            "mesh.onnx",
            Some("http://invalid.nonexistent.example.com/mesh.onnx"),
            None,
            None,
        );
        assert!(matches!(result, Err(ModelResolveError::Download { .. })));
        assert!(!cache.join("mesh.onnx").exists());
    }
}
