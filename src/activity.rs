use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::ActivityRecord;

/// Append-only record of page fetches, shared by clones of a fetcher.
#[derive(Clone, Debug, Default)]
pub(crate) struct ActivityLog {
    records: Arc<Mutex<Vec<ActivityRecord>>>,
}

impl ActivityLog {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, record: ActivityRecord) {
        self.lock().push(record);
    }

    /// Copies the records in the order they were appended.
    pub(crate) fn snapshot(&self) -> Vec<ActivityRecord> {
        self.lock().clone()
    }

    /// Removes and returns every record appended so far.
    pub(crate) fn take(&self) -> Vec<ActivityRecord> {
        std::mem::take(&mut *self.lock())
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    // Records are only ever appended whole, so a poisoned lock still holds a
    // consistent list.
    fn lock(&self) -> MutexGuard<'_, Vec<ActivityRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::ActivityLog;
    use crate::ActivityRecord;

    fn record(url: &str) -> ActivityRecord {
        ActivityRecord {
            url: url.to_owned(),
            attempts: 1,
            delays: Vec::new(),
        }
    }

    #[test]
    fn clones_share_records() {
        let log = ActivityLog::new();
        let other = log.clone();
        other.push(record("u"));

        assert_eq!(log.len(), 1);
        assert_eq!(log.snapshot()[0].url, "u");
    }

    #[test]
    fn take_drains_for_every_clone() {
        let log = ActivityLog::new();
        let other = log.clone();
        log.push(record("a"));
        log.push(record("b"));

        let taken = other.take();

        assert_eq!(taken.iter().map(|r| r.url.as_str()).collect::<Vec<_>>(), ["a", "b"]);
        assert_eq!(log.len(), 0);
        log.push(record("c"));
        assert_eq!(other.snapshot(), vec![record("c")]);
    }

    #[test]
    fn concurrent_appends_are_all_kept() {
        let log = ActivityLog::new();
        let handles: Vec<_> = (0..8)
            .map(|index| {
                let log = log.clone();
                std::thread::spawn(move || log.push(record(&format!("u{index}"))))
            })
            .collect();
        for handle in handles {
            handle.join().expect("thread must not panic");
        }
        assert_eq!(log.len(), 8);
    }
}
