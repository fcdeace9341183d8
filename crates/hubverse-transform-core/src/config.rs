//! Run options shared by the add/update and delete pipelines.

use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;

/// Leading path segment under which hubs keep submissions as uploaded.
pub const DEFAULT_ORIGIN_PREFIX: &str = "raw";

/// Directory (relative to the hub root) holding `admin.json` and `tasks.json`.
pub const DEFAULT_HUB_CONFIG_DIR: &str = "hub-config";

/// Options controlling a transform run.
///
/// The defaults match the layout of a cloud-enabled hub: submissions under
/// `raw/`, configuration under `hub-config/`, snappy-compressed output.
#[derive(Debug, Clone)]
pub struct TransformOptions {
    /// Leading path segment every submission path must start with; it is
    /// stripped when deriving the output location.
    pub origin_prefix: String,
    /// Hub configuration directory, relative to the hub root.
    pub hub_config_dir: String,
    /// Whether add/update consults the hub's task configuration for column
    /// types. A missing configuration is never fatal.
    pub use_hub_config: bool,
    /// Number of CSV records used for type inference (`None` = all).
    pub csv_infer_records: Option<usize>,
    /// Compression codec for the output Parquet file.
    pub compression: Compression,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            origin_prefix: DEFAULT_ORIGIN_PREFIX.to_string(),
            hub_config_dir: DEFAULT_HUB_CONFIG_DIR.to_string(),
            use_hub_config: true,
            csv_infer_records: None,
            compression: Compression::SNAPPY,
        }
    }
}

impl TransformOptions {
    /// Use a different origin prefix.
    pub fn with_origin_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.origin_prefix = prefix.into();
        self
    }

    /// Use a different hub configuration directory.
    pub fn with_hub_config_dir(mut self, dir: impl Into<String>) -> Self {
        self.hub_config_dir = dir.into();
        self
    }

    /// Enable or disable the hub task-configuration lookup.
    pub fn with_hub_config(mut self, enabled: bool) -> Self {
        self.use_hub_config = enabled;
        self
    }

    /// Limit CSV type inference to the first `records` rows.
    pub fn with_csv_infer_records(mut self, records: usize) -> Self {
        self.csv_infer_records = Some(records);
        self
    }

    /// Use a different output compression codec.
    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Writer properties for the output Parquet file.
    pub fn writer_properties(&self) -> WriterProperties {
        WriterProperties::builder()
            .set_compression(self.compression)
            .build()
    }
}
