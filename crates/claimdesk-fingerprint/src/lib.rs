pub mod detector;
pub mod phash;

pub use detector::{check_duplicate, ensure_unique};
pub use phash::{FingerprintError, fingerprint, fingerprint_image};
