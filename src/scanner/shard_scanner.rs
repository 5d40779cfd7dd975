use crate::config::{ExtractConfig, SHARD_PLACEHOLDER};
use crate::error::{ExtractError, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// One piece of a shard archive on disk.
#[derive(Debug, Clone)]
pub struct ChunkFile {
    pub path: PathBuf,
    pub filename: String,
    pub index: u64,
    pub size: u64,
}

/// The ordered chunks that concatenate into one shard's tarball.
#[derive(Debug, Clone)]
pub struct ShardArchive {
    pub shard: u32,
    pub directory: PathBuf,
    pub chunks: Vec<ChunkFile>,
}

impl ShardArchive {
    pub fn total_bytes(&self) -> u64 {
        self.chunks.iter().map(|c| c.size).sum()
    }

    pub fn display_summary(&self) -> String {
        format!(
            "shard {}: {} chunk(s), {} in {}",
            self.shard,
            self.chunks.len(),
            format_bytes(self.total_bytes()),
            self.directory.display()
        )
    }
}

#[derive(Debug, Clone)]
pub struct ShardScanner {
    dir_template: String,
    chunk_pattern: Regex,
}

impl ShardScanner {
    pub fn new(config: &ExtractConfig) -> Result<Self> {
        Ok(Self {
            dir_template: config.shard_dir_template.clone(),
            chunk_pattern: Regex::new(&config.chunk_pattern)?,
        })
    }

    pub fn shard_directory(&self, source_dir: &Path, shard: u32) -> PathBuf {
        source_dir.join(
            self.dir_template
                .replace(SHARD_PLACEHOLDER, &shard.to_string()),
        )
    }

    /// Lists the chunks of `shard` in extraction order.
    ///
    /// Chunks sort by the first capture group of the pattern read as a
    /// number, with the file name as tie-break.
    pub fn scan_shard(&self, source_dir: &Path, shard: u32) -> Result<ShardArchive> {
        let directory = self.shard_directory(source_dir, shard);

        if !directory.is_dir() {
            return Err(ExtractError::ArchiveMissing {
                shard,
                path: directory,
            });
        }

        let walker = WalkDir::new(&directory)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false);

        let mut chunks = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|e| match e.into_io_error() {
                Some(io) => ExtractError::Io(io),
                None => ExtractError::InvalidPath {
                    path: directory.display().to_string(),
                },
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            let filename = entry.file_name().to_string_lossy().into_owned();
            let Some(captures) = self.chunk_pattern.captures(&filename) else {
                tracing::trace!(file = %filename, "skipping non-chunk file");
                continue;
            };

            let index = captures
                .get(1)
                .and_then(|m| m.as_str().parse::<u64>().ok())
                .unwrap_or(0);
            let metadata = entry.metadata().map_err(|e| match e.into_io_error() {
                Some(io) => ExtractError::Io(io),
                None => ExtractError::InvalidPath {
                    path: entry.path().display().to_string(),
                },
            })?;

            chunks.push(ChunkFile {
                path: entry.path().to_path_buf(),
                filename,
                index,
                size: metadata.len(),
            });
        }

        if chunks.is_empty() {
            return Err(ExtractError::ArchiveMissing {
                shard,
                path: directory,
            });
        }

        chunks.sort_by(|a, b| a.index.cmp(&b.index).then_with(|| a.filename.cmp(&b.filename)));

        Ok(ShardArchive {
            shard,
            directory,
            chunks,
        })
    }
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn scanner() -> ShardScanner {
        ShardScanner::new(&ExtractConfig::default()).unwrap()
    }

    #[test]
    fn test_shard_directory_template() {
        let scanner = scanner();
        assert_eq!(
            scanner.shard_directory(Path::new("/snap"), 2),
            PathBuf::from("/snap/shard-2")
        );
    }

    #[test]
    fn test_chunks_sorted_numerically() {
        let temp_dir = TempDir::new().unwrap();
        let shard_dir = temp_dir.path().join("shard-0");
        fs::create_dir(&shard_dir).unwrap();
        fs::write(shard_dir.join("chunk_10.bin"), b"cc").unwrap();
        fs::write(shard_dir.join("chunk_2.bin"), b"b").unwrap();
        fs::write(shard_dir.join("chunk_0001.bin"), b"aaa").unwrap();
        fs::write(shard_dir.join("manifest.json"), b"{}").unwrap();
        fs::create_dir(shard_dir.join("chunk_3.bin")).unwrap();

        let archive = scanner().scan_shard(temp_dir.path(), 0).unwrap();
        let names: Vec<_> = archive.chunks.iter().map(|c| c.filename.as_str()).collect();

        assert_eq!(names, vec!["chunk_0001.bin", "chunk_2.bin", "chunk_10.bin"]);
        assert_eq!(archive.total_bytes(), 6);
        assert!(archive.display_summary().contains("3 chunk(s)"));
    }

    #[test]
    fn test_missing_shard_directory() {
        let temp_dir = TempDir::new().unwrap();
        let result = scanner().scan_shard(temp_dir.path(), 1);
        assert!(matches!(
            result,
            Err(ExtractError::ArchiveMissing { shard: 1, .. })
        ));
    }

    #[test]
    fn test_empty_shard_directory() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("shard-2")).unwrap();
        fs::write(temp_dir.path().join("shard-2").join("README"), b"x").unwrap();

        let result = scanner().scan_shard(temp_dir.path(), 2);
        assert!(matches!(
            result,
            Err(ExtractError::ArchiveMissing { shard: 2, .. })
        ));
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(1048576), "1.0 MB");
    }
}
