//! Builds the parameterized folder tree and seeds it with format-rotated
//! files.

use crate::client::S3Client;
use crate::config::ObjectStoreConfig;
use crate::files;
use loader_core::AdapterError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tracing::{info, warn};

/// Name of the folder at `level` with index `k`.
pub fn folder_name(level: u32, k: u32) -> String {
    format!("Depth_{level}_Folder_{k}")
}

/// A random folder path descending to `depth` (inclusive).
pub fn random_folder_path<R: Rng + ?Sized>(rng: &mut R, folders_per_level: u32, depth: u32) -> String {
    let mut path = String::new();
    for level in 0..=depth {
        let k = rng.random_range(0..folders_per_level.max(1));
        path.push_str(&folder_name(level, k));
        path.push('/');
    }
    path
}

/// Writes the bucket tree: every folder at every level down to the
/// configured depth receives `ceil(F/B)` files, formats rotating per file.
/// Uploads are issued concurrently per level before recursing deeper.
pub struct TreeBuilder {
    client: Arc<S3Client>,
    config: ObjectStoreConfig,
}

impl TreeBuilder {
    pub fn new(client: Arc<S3Client>, config: ObjectStoreConfig) -> Self {
        Self { client, config }
    }

    pub async fn build_bucket(&self, bucket: &str) -> Result<(), AdapterError> {
        let formats = self.config.formats();
        let files_per_folder = self.config.files_per_folder();
        let mut rng = StdRng::from_os_rng();

        let mut parents = vec![String::new()];
        for depth in 0..self.config.depth_level {
            let mut next_parents = Vec::new();
            let mut uploads = Vec::new();
            for parent in &parents {
                for folder in 0..self.config.num_folders_per_level {
                    let folder_path = format!("{parent}{}/", folder_name(depth, folder));
                    for count in 0..files_per_folder {
                        let format = formats[count as usize % formats.len()];
                        let record = files::generate(&mut rng, self.config.file_size);
                        let content = match files::render(format, &record) {
                            Ok(content) => content,
                            Err(err) => {
                                warn!("skipping {format:?} file in {folder_path}: {err}");
                                continue;
                            }
                        };
                        let key = format!("{folder_path}{count}.{}", format.extension());
                        let client = self.client.clone();
                        let bucket = bucket.to_string();
                        uploads.push(async move {
                            if let Err(err) = client.upload_object(&bucket, &key, content).await {
                                warn!("upload of {key} failed: {err}");
                            }
                        });
                    }
                    next_parents.push(folder_path);
                }
            }
            futures::future::join_all(uploads).await;
            parents = next_parents;
        }
        info!(
            "seeded bucket {bucket}: depth {}, {} folders per level, {} files per folder",
            self.config.depth_level, self.config.num_folders_per_level, files_per_folder
        );
        Ok(())
    }

    /// Empty the bucket and re-seed it from scratch.
    pub async fn rebalance(&self, bucket: &str) -> Result<(), AdapterError> {
        self.client.empty_bucket(bucket).await?;
        self.build_bucket(bucket).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_name_shape() {
        assert_eq!(folder_name(0, 2), "Depth_0_Folder_2");
        assert_eq!(folder_name(3, 0), "Depth_3_Folder_0");
    }

    #[test]
    fn test_random_folder_path_depth() {
        let mut rng = StdRng::seed_from_u64(42);
        for depth in 0..4u32 {
            let path = random_folder_path(&mut rng, 3, depth);
            assert_eq!(path.matches('/').count() as u32, depth + 1);
            assert!(path.starts_with("Depth_0_Folder_"));
            assert!(path.ends_with('/'));
        }
    }

    #[test]
    fn test_random_folder_path_respects_branching() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let path = random_folder_path(&mut rng, 1, 2);
            assert_eq!(path, "Depth_0_Folder_0/Depth_1_Folder_0/Depth_2_Folder_0/");
        }
    }
}
