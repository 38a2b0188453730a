use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Field holding a document's identity. Unique within a collection.
pub const ID_FIELD: &str = "_id";

/// Canonical lookup key for an `_id` value.
///
/// The key is the value's JSON text, so `1` and `"1"` are distinct ids.
pub fn id_key(id: &Value) -> String {
    id.to_string()
}

/// Generates store-assigned `_id`s: 8 hex digits of epoch seconds followed by
/// 16 hex digits of a per-instance sequence number.
#[derive(Debug, Default)]
pub struct IdGenerator {
    seq: AtomicU64,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_id(&self) -> String {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs());
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        format!("{:08x}{seq:016x}", secs as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn generated_ids_are_24_hex_digits() {
        let ids = IdGenerator::new();
        let id = ids.next_id();
        assert_eq!(id.len(), 24);
        assert!(id.bytes().all(|b| b.is_ascii_hexdigit()));
    }

    #[test]
    fn generated_ids_are_unique() {
        let ids = IdGenerator::new();
        let a = ids.next_id();
        let b = ids.next_id();
        assert_ne!(a, b);
    }

    #[test]
    fn id_key_distinguishes_number_and_string() {
        assert_ne!(id_key(&json!(1)), id_key(&json!("1")));
        assert_eq!(id_key(&json!("abc")), id_key(&json!("abc")));
    }
}
