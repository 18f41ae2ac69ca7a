mod mock;
mod s3;

pub use mock::MockObjectStore;
pub use s3::{S3ObjectStore, S3ObjectStoreConfig};
