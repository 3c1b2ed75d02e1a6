use crate::contract::UploadMethod;

/// Files at or above this size go through Git LFS instead of the contents API.
pub const DEFAULT_THRESHOLD_BYTES: u64 = 25 * 1024 * 1024;

/// Picks the upload path for a file of `size_bytes`.
pub fn classify(size_bytes: u64, threshold_bytes: u64) -> UploadMethod {
    if size_bytes < threshold_bytes {
        UploadMethod::Direct
    } else {
        UploadMethod::BulkTransfer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn below_threshold_is_direct() {
        for size in [0, 1, 1024, DEFAULT_THRESHOLD_BYTES - 1] {
            assert_eq!(
                classify(size, DEFAULT_THRESHOLD_BYTES),
                UploadMethod::Direct,
                "size {size}"
            );
        }
    }

    #[test]
    fn threshold_and_above_is_bulk() {
        for size in [
            DEFAULT_THRESHOLD_BYTES,
            DEFAULT_THRESHOLD_BYTES + 1,
            30 * 1024 * 1024,
            u64::MAX,
        ] {
            assert_eq!(
                classify(size, DEFAULT_THRESHOLD_BYTES),
                UploadMethod::BulkTransfer,
                "size {size}"
            );
        }
    }

    #[test]
    fn zero_threshold_sends_everything_to_bulk() {
        assert_eq!(classify(0, 0), UploadMethod::BulkTransfer);
    }
}
