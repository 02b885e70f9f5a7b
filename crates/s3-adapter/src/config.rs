//! Object-store loader configuration.

use serde::Deserialize;

/// File formats the tree builder rotates through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Json,
    Csv,
    Tsv,
    Parquet,
    Avro,
}

impl FileFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Json => "json",
            FileFormat::Csv => "csv",
            FileFormat::Tsv => "tsv",
            FileFormat::Parquet => "parquet",
            FileFormat::Avro => "avro",
        }
    }
}

fn default_file_size() -> usize {
    1024
}

fn default_formats() -> Vec<FileFormat> {
    vec![FileFormat::Json, FileFormat::Csv, FileFormat::Tsv]
}

/// Shape of the bucket tree and the files that populate it.
///
/// Folder `Depth_{level}_Folder_{k}` exists for every `k < num_folders_per_level`
/// at every level below `depth_level`, and every folder holds
/// `ceil(num_files_per_level / num_folders_per_level)` files.
#[derive(Debug, Clone, Deserialize)]
pub struct ObjectStoreConfig {
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub num_buckets: u32,
    pub depth_level: u32,
    pub num_folders_per_level: u32,
    pub num_files_per_level: u32,
    #[serde(default)]
    pub session_token: Option<String>,
    #[serde(default = "default_file_size")]
    pub file_size: usize,
    #[serde(default = "default_formats")]
    pub file_format: Vec<FileFormat>,
}

impl ObjectStoreConfig {
    /// Files written into each folder of the tree.
    pub fn files_per_folder(&self) -> u32 {
        if self.num_folders_per_level == 0 {
            return 0;
        }
        self.num_files_per_level.div_ceil(self.num_folders_per_level)
    }

    /// The formats to rotate through; falls back to the default set when
    /// the caller supplied an empty list.
    pub fn formats(&self) -> Vec<FileFormat> {
        if self.file_format.is_empty() {
            default_formats()
        } else {
            self.file_format.clone()
        }
    }
}
