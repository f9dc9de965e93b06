//! Fixtures for pub/sub tests.
//!
//! | item | feature | purpose |
//! |---|---|---|
//! | [`TestDatabase`] | `postgres` (default) | empty Postgres in a container |
//! | [`TestNats`] | `nats` | NATS with JetStream in a container |
//! | [`TestDataBuilder`] | always | per-test names so tests never collide |
//! | [`assertions`] | always | assertion helpers with readable failures |
//!
//! ```rust,no_run
//! use test_utils::{TestDataBuilder, TestDatabase};
//!
//! # async fn example() {
//! let db = TestDatabase::new().await;
//! let names = TestDataBuilder::from_test_name("test_ack_writes_offset");
//! let table = names.table("messages");
//! # }
//! ```

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

#[cfg(feature = "nats")]
mod nats;
#[cfg(feature = "postgres")]
mod postgres;

#[cfg(feature = "nats")]
pub use nats::TestNats;
#[cfg(feature = "postgres")]
pub use postgres::TestDatabase;

/// Derives topic, table, group and stream names from a seed.
///
/// Equal seeds give equal names, so a failing test can be rerun against the
/// same objects.
#[derive(Debug, Clone, Copy)]
pub struct TestDataBuilder {
    seed: u64,
}

impl TestDataBuilder {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Seed from a stable hash of the test name.
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let a = TestDataBuilder::from_test_name("test_ack_writes_offset");
    /// let b = TestDataBuilder::from_test_name("test_ack_writes_offset");
    /// assert_eq!(a.topic("orders"), b.topic("orders"));
    /// ```
    pub fn from_test_name(name: &str) -> Self {
        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    /// Uuid of the `n`-th message a test publishes.
    pub fn message_uuid(&self, n: u64) -> String {
        Uuid::from_u64_pair(self.seed, n).to_string()
    }

    /// `test.{seed}.{name}`
    pub fn topic(&self, name: &str) -> String {
        format!("test.{}.{name}", self.seed)
    }

    /// `{prefix}_{seed}`, a valid unquoted SQL identifier
    pub fn table(&self, prefix: &str) -> String {
        format!("{prefix}_{}", self.seed)
    }

    /// `test-group-{seed}-{name}`
    pub fn consumer_group(&self, name: &str) -> String {
        format!("test-group-{}-{name}", self.seed)
    }

    /// `TEST_{seed}_{NAME}`; JetStream names may not contain dots
    pub fn stream(&self, name: &str) -> String {
        format!("TEST_{}_{}", self.seed, name.to_uppercase())
    }
}

pub mod assertions {
    use std::collections::HashSet;

    /// Panic listing the input when any id occurs more than once.
    pub fn assert_unique(ids: &[String], context: &str) {
        let mut seen = HashSet::with_capacity(ids.len());
        let duplicates: Vec<&String> = ids.iter().filter(|id| !seen.insert(*id)).collect();
        assert!(
            duplicates.is_empty(),
            "{context}: duplicates {duplicates:?} in {ids:?}"
        );
    }

    /// Unwrap `value`, panicking with `context` when it is `None`.
    pub fn assert_some<T>(value: Option<T>, context: &str) -> T {
        match value {
            Some(value) => value,
            None => panic!("{context}: got None"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_follow_seed() {
        let names = TestDataBuilder::new(42);
        assert_eq!(names.topic("orders"), "test.42.orders");
        assert_eq!(names.table("messages"), "messages_42");
        assert_eq!(names.consumer_group("a"), "test-group-42-a");
        assert_eq!(names.stream("orders"), "TEST_42_ORDERS");
    }

    #[test]
    fn test_test_name_seeds_are_stable_and_distinct() {
        let first = TestDataBuilder::from_test_name("test1");
        assert_eq!(
            first.table("messages"),
            TestDataBuilder::from_test_name("test1").table("messages")
        );
        assert_ne!(
            first.table("messages"),
            TestDataBuilder::from_test_name("test2").table("messages")
        );
    }

    #[test]
    fn test_message_uuids_differ_per_message() {
        let names = TestDataBuilder::new(7);
        assert_ne!(names.message_uuid(1), names.message_uuid(2));
        assert_eq!(names.message_uuid(1), TestDataBuilder::new(7).message_uuid(1));
        assert_eq!(names.message_uuid(1).len(), 36);
    }

    #[test]
    #[should_panic(expected = "duplicates")]
    fn test_assert_unique_detects_duplicates() {
        assertions::assert_unique(&["a".to_string(), "b".to_string(), "a".to_string()], "ids");
    }

    #[test]
    fn test_assert_some_returns_value() {
        assert_eq!(assertions::assert_some(Some(3), "value"), 3);
    }
}
