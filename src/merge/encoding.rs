use crate::config::{ParquetCompression, ParquetConfig};
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::{EnabledStatistics, WriterProperties};
use parquet::format::KeyValue;

impl From<ParquetCompression> for Compression {
    fn from(value: ParquetCompression) -> Self {
        match value {
            ParquetCompression::Snappy => Compression::SNAPPY,
            ParquetCompression::Zstd => Compression::ZSTD(ZstdLevel::default()),
            ParquetCompression::Uncompressed => Compression::UNCOMPRESSED,
        }
    }
}

/// Writer properties for merged output files.
///
/// - Configured compression (Snappy unless overridden)
/// - Dictionary encoding enabled
/// - Configured rows per group (32k by default)
/// - partcat version embedded in file metadata
pub(crate) fn writer_properties(config: &ParquetConfig) -> WriterProperties {
    let metadata = vec![KeyValue {
        key: "partcat.version".to_string(),
        value: Some(env!("CARGO_PKG_VERSION").to_string()),
    }];

    WriterProperties::builder()
        .set_dictionary_enabled(true)
        .set_statistics_enabled(EnabledStatistics::Page)
        .set_compression(config.compression.into())
        .set_data_page_size_limit(256 * 1024)
        .set_write_batch_size(32 * 1024)
        .set_max_row_group_size(config.row_group_size)
        .set_dictionary_page_size_limit(128 * 1024)
        .set_key_value_metadata(Some(metadata))
        .build()
}
