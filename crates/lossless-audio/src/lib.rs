pub mod metadata;
pub mod range;
pub mod storage;

pub use metadata::{extract_metadata_from_file, AudioFormat, AudioMetadata, CoverArt, MetadataError};
pub use range::{content_type_for_path, image_content_type, resolve_range, ByteRange, RangeError};
pub use storage::{is_plain_filename, sanitize_filename, AudioStorage, StorageBackend, StorageError};
