//! Store path construction and key derivation.

use std::path::{Path, PathBuf};

/// Directory holding every descriptor for one source asset.
///
/// # Example
///
/// ```
/// use std::path::PathBuf;
/// use imagerunner::store::descriptor_dir;
///
/// let dir = descriptor_dir(&PathBuf::from("/cache"), "abc123");
/// assert_eq!(dir, PathBuf::from("/cache/abc123"));
/// ```
pub fn descriptor_dir(cache_root: &Path, file_hash: &str) -> PathBuf {
    cache_root.join(file_hash)
}

/// Full path of one job descriptor.
///
/// Layout: `<cacheRoot>/<fileHash>/<queryHash>.json`.
///
/// # Example
///
/// ```
/// use std::path::PathBuf;
/// use imagerunner::store::descriptor_path;
///
/// let path = descriptor_path(&PathBuf::from("/cache"), "abc123", "q1");
/// assert_eq!(path, PathBuf::from("/cache/abc123/q1.json"));
/// ```
pub fn descriptor_path(cache_root: &Path, file_hash: &str, query_hash: &str) -> PathBuf {
    descriptor_dir(cache_root, file_hash).join(format!("{query_hash}.json"))
}

/// Filename of a copied original: content digest plus the source extension.
pub fn original_name(content_digest: &str, source: &Path) -> String {
    match source.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => format!("{content_digest}.{ext}"),
        None => content_digest.to_string(),
    }
}

/// Destination of an original asset copy inside the publish tree.
///
/// Layout: `<publishRoot>/<originalsDir>/<fileHash>/<original>`, where
/// `originalsDir` is the persisted relative directory from the store
/// metadata (it may itself contain separators).
pub fn original_path(
    publish_root: &Path,
    originals_dir: &str,
    file_hash: &str,
    original: &str,
) -> PathBuf {
    originals_dir
        .split('/')
        .fold(publish_root.to_path_buf(), |path, part| path.join(part))
        .join(file_hash)
        .join(original)
}

/// Store-relative reference to a copied original, as recorded in the
/// descriptor and later resolved against the serving origin. Always uses
/// forward slashes.
pub fn source_image_ref(originals_dir: &str, file_hash: &str, original: &str) -> String {
    format!("{originals_dir}/{file_hash}/{original}")
}

/// Derives the fileHash grouping a request's variants: the final component
/// of the declared output directory.
pub fn file_hash_for(output_dir: &Path) -> Option<&str> {
    output_dir.file_name().and_then(|name| name.to_str())
}

/// Derives the queryHash of one operation: the first segment of its
/// declared output path.
pub fn query_hash_for(output_path: &str) -> Option<&str> {
    output_path.split('/').next().filter(|hash| !hash.is_empty())
}
