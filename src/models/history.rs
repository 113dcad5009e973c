use std::collections::HashMap;

/// Per-user log of previously recommended titles with integer ages.
///
/// Ages advance once per logged recommendation cycle; entries whose age
/// reaches the retention limit are evicted. This mirrors the relational
/// history rows so the aging rules can be tested without storage, and backs
/// the in-memory history store.
#[derive(Debug, Clone, Default)]
pub struct AgingLog {
    entries: HashMap<String, i32>,
}

impl AgingLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a log from stored (title, age) rows
    pub fn from_entries<I: IntoIterator<Item = (String, i32)>>(entries: I) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }

    /// Ages every entry by one cycle
    pub fn advance(&mut self) {
        for age in self.entries.values_mut() {
            *age += 1;
        }
    }

    /// Records a freshly emitted recommendation at age zero.
    /// Re-recommending a title resets its age.
    pub fn record(&mut self, title: &str) {
        self.entries.insert(title.to_string(), 0);
    }

    /// Removes entries whose age reached `max_age`, returning the evicted titles
    pub fn evict(&mut self, max_age: i32) -> Vec<String> {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, age)| **age >= max_age)
            .map(|(title, _)| title.clone())
            .collect();
        for title in &expired {
            self.entries.remove(title);
        }
        expired
    }

    pub fn age_of(&self, title: &str) -> Option<i32> {
        self.entries.get(title).copied()
    }

    pub fn titles(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, i32)> {
        self.entries.iter().map(|(t, a)| (t.as_str(), *a))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_advance_increments_every_age() {
        let mut log = AgingLog::from_entries([("A".to_string(), 0), ("B".to_string(), 3)]);
        log.advance();
        assert_eq!(log.age_of("A"), Some(1));
        assert_eq!(log.age_of("B"), Some(4));
    }

    #[test]
    fn test_record_starts_fresh_and_resets() {
        let mut log = AgingLog::new();
        log.record("A");
        log.advance();
        assert_eq!(log.age_of("A"), Some(1));

        // Re-recommending resets the age
        log.record("A");
        assert_eq!(log.age_of("A"), Some(0));
    }

    #[test]
    fn test_evict_removes_only_expired() {
        let mut log = AgingLog::from_entries([
            ("old".to_string(), 7),
            ("older".to_string(), 9),
            ("fresh".to_string(), 2),
        ]);

        let mut evicted = log.evict(7);
        evicted.sort();
        assert_eq!(evicted, vec!["old".to_string(), "older".to_string()]);
        assert_eq!(log.len(), 1);
        assert_eq!(log.age_of("fresh"), Some(2));
    }

    #[test]
    fn test_ages_strictly_increase_across_cycles() {
        let mut log = AgingLog::new();
        log.record("A");

        // One logged cycle: prior entries advance, new rows land at zero
        log.advance();
        log.record("B");

        assert_eq!(log.age_of("A"), Some(1));
        assert_eq!(log.age_of("B"), Some(0));

        log.advance();
        assert_eq!(log.age_of("A"), Some(2));
        assert_eq!(log.age_of("B"), Some(1));
    }
}
