//! Deterministic identifier routing.
//!
//! Maps any hashable identifier to a bucket in `[0, bucket_count)` using
//! blake3, so the same identifier always lands in the same dispatcher queue
//! (and the same index shard) for a given bucket count. Unlike
//! `std::collections::hash_map::DefaultHasher`, the result does not depend
//! on a per-process random seed.

use std::hash::{Hash, Hasher};

/// `Hasher` adapter feeding everything written into blake3.
///
/// `finish` reads the first 8 bytes of the digest, little-endian.
pub struct RouteHasher {
    inner: blake3::Hasher,
}

impl RouteHasher {
    pub fn new() -> Self {
        Self {
            inner: blake3::Hasher::new(),
        }
    }
}

impl Default for RouteHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher for RouteHasher {
    fn write(&mut self, bytes: &[u8]) {
        self.inner.update(bytes);
    }

    fn finish(&self) -> u64 {
        let digest = self.inner.finalize();
        let mut head = [0u8; 8];
        head.copy_from_slice(&digest.as_bytes()[0..8]);
        u64::from_le_bytes(head)
    }
}

/// Deterministic router: identifier -> bucket.
#[derive(Debug, Clone, Copy)]
pub struct Router {
    buckets: usize,
}

impl Router {
    /// Create a router over `buckets` buckets.
    ///
    /// # Panics
    ///
    /// Panics if `buckets` is 0.
    pub fn new(buckets: usize) -> Self {
        assert!(buckets > 0, "bucket count must be > 0");
        Self { buckets }
    }

    pub fn buckets(&self) -> usize {
        self.buckets
    }

    /// 64-bit routing hash of an identifier.
    pub fn hash_of<H: Hash + ?Sized>(id: &H) -> u64 {
        let mut hasher = RouteHasher::new();
        id.hash(&mut hasher);
        hasher.finish()
    }

    /// Bucket for an identifier. Pure function of the identifier and the
    /// bucket count.
    pub fn bucket_for<H: Hash + ?Sized>(&self, id: &H) -> usize {
        (Self::hash_of(id) % self.buckets as u64) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_bucket_for_deterministic() {
        let router = Router::new(8);
        let b1 = router.bucket_for("partition-42");
        let b2 = router.bucket_for("partition-42");
        let b3 = Router::new(8).bucket_for("partition-42");
        assert_eq!(b1, b2);
        assert_eq!(b2, b3);
        assert!(b1 < 8);
    }

    #[test]
    fn test_identifiers_spread_across_buckets() {
        let router = Router::new(16);
        let buckets: HashSet<usize> = (0..200u32).map(|i| router.bucket_for(&i)).collect();
        // 200 identifiers over 16 buckets should touch most of them
        assert!(buckets.len() >= 12, "only {} buckets used", buckets.len());
        assert!(buckets.iter().all(|b| *b < 16));
    }

    #[test]
    fn test_string_and_str_route_alike() {
        let router = Router::new(32);
        let owned = String::from("tenant/7");
        assert_eq!(router.bucket_for(&owned), router.bucket_for("tenant/7"));
    }

    #[test]
    fn test_single_bucket_all_zero() {
        let router = Router::new(1);
        assert_eq!(router.bucket_for("a"), 0);
        assert_eq!(router.bucket_for(&12345u64), 0);
    }

    #[test]
    #[should_panic(expected = "bucket count must be > 0")]
    fn test_zero_buckets_panics() {
        Router::new(0);
    }
}
