//! Tag filtering with a bounded memo.

use std::collections::BTreeSet;

use moka::sync::Cache;

/// Canonical memo key: every component lowercased and sorted, so tag order
/// never produces distinct entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TagKey {
    tags: Vec<String>,
    required: Vec<String>,
    excluded: Vec<String>,
}

impl TagKey {
    fn canonical<'a>(
        tags: impl IntoIterator<Item = &'a String>,
        required: &BTreeSet<String>,
        excluded: &BTreeSet<String>,
    ) -> Self {
        fn normalize<'a>(items: impl IntoIterator<Item = &'a String>) -> Vec<String> {
            let set: BTreeSet<String> = items.into_iter().map(|t| t.to_lowercase()).collect();
            set.into_iter().collect()
        }

        Self {
            tags: normalize(tags),
            required: normalize(required),
            excluded: normalize(excluded),
        }
    }

    fn evaluate(&self) -> bool {
        let has = |tag: &String| self.tags.binary_search(tag).is_ok();
        let required_ok = self.required.is_empty() || self.required.iter().any(has);
        required_ok && !self.excluded.iter().any(has)
    }
}

/// Does a thread's tag set satisfy the required/excluded constraints?
///
/// True iff (no required tags or at least one present) and no excluded tag
/// present, compared case-insensitively.
pub fn tags_match(
    thread_tags: &[String],
    required: &BTreeSet<String>,
    excluded: &BTreeSet<String>,
) -> bool {
    TagKey::canonical(thread_tags, required, excluded).evaluate()
}

/// Memoized [`tags_match`].
///
/// The same thread/condition pairs recur across repeated searches, so the
/// answers are kept in a capacity-bounded cache.
#[derive(Clone)]
pub struct TagMatcher {
    memo: Cache<TagKey, bool>,
}

impl TagMatcher {
    pub fn new(capacity: u64) -> Self {
        Self {
            memo: Cache::new(capacity),
        }
    }

    pub fn matches(
        &self,
        thread_tags: &[String],
        required: &BTreeSet<String>,
        excluded: &BTreeSet<String>,
    ) -> bool {
        if required.is_empty() && excluded.is_empty() {
            return true;
        }

        let key = TagKey::canonical(thread_tags, required, excluded);
        if let Some(hit) = self.memo.get(&key) {
            return hit;
        }

        let result = key.evaluate();
        self.memo.insert(key, result);
        result
    }

    #[cfg(test)]
    fn memo_len(&self) -> u64 {
        self.memo.run_pending_tasks();
        self.memo.entry_count()
    }
}

impl Default for TagMatcher {
    fn default() -> Self {
        Self::new(256)
    }
}
