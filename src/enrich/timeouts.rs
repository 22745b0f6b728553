use std::time::Duration;

const LONG_PAYLOAD_BYTES: usize = 1024 * 1024;
const EXTENDED_PAYLOAD_BYTES: usize = 4 * 1024 * 1024;

/// Request timeout for an enrichment call carrying `payload_bytes` of file
/// data. Large inline payloads take longer to upload and to process.
pub fn enrichment_timeout(base: Duration, payload_bytes: usize) -> Duration {
    if payload_bytes >= EXTENDED_PAYLOAD_BYTES {
        base * 3
    } else if payload_bytes >= LONG_PAYLOAD_BYTES {
        base * 2
    } else {
        base
    }
}
