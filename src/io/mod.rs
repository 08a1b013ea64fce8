mod object_store;
mod s3_store;

pub use object_store::{ObjectStore, StoredObject, FALLBACK_CONTENT_TYPE};
pub use s3_store::{create_s3_client, S3ObjectStore, DEFAULT_KEY_PREFIX};
