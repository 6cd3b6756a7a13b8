//! Key and value helpers for scenarios.

use uuid::Uuid;

/// A key that will not collide across scenario runs against a shared
/// physical cluster.
pub fn distinct_key() -> String {
    format!("key-{}", Uuid::new_v4())
}

/// A value distinct from every other generated value.
pub fn distinct_value() -> String {
    format!("value-{}", Uuid::new_v4())
}

/// Namespaces a key into the bucket-prefixed form the proxy routes to the
/// write-through backend.
pub fn namespaced_key(bucket: &str, key: &str) -> String {
    format!("{bucket}:{key}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_keys_do_not_collide() {
        assert_ne!(distinct_key(), distinct_key());
        assert_ne!(distinct_value(), distinct_value());
    }

    #[test]
    fn namespacing_prefixes_the_bucket() {
        assert_eq!(namespaced_key("bbb", "k1"), "bbb:k1");
    }
}
