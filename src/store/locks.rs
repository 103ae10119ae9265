use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Per-project write locks.
///
/// The load, align and save cycle of one project runs under its lock so two
/// requests in the same process never interleave their read-modify-write.
/// Cross-process races are caught by the store's revision check instead.
#[derive(Default)]
pub struct ProjectLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ProjectLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the lock for a project.
    ///
    /// Entries nobody holds a handle to are dropped on the way, so the table
    /// only grows with the number of projects in flight. Handles are cloned
    /// under the table lock, which keeps a pruned entry from being in use.
    pub fn handle(&self, project_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        if let Some(lock) = locks.get(project_id) {
            return lock.clone();
        }
        let lock = Arc::new(Mutex::new(()));
        locks.insert(project_id.to_string(), lock.clone());
        lock
    }

    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lock a handle from [`ProjectLocks::handle`]. A panic in a previous holder
/// does not poison the project: the guarded data is `()`.
pub fn acquire(lock: &Mutex<()>) -> MutexGuard<'_, ()> {
    lock.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn same_project_shares_one_lock() {
        let locks = ProjectLocks::new();
        let a = locks.handle("p1");
        let b = locks.handle("p1");
        let c = locks.handle("p2");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(locks.len(), 2);
    }

    #[test]
    fn holders_of_one_project_do_not_overlap() {
        let locks = Arc::new(ProjectLocks::new());
        let active = Arc::new(AtomicUsize::new(0));
        let overlaps = Arc::new(AtomicUsize::new(0));

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let locks = Arc::clone(&locks);
                let active = Arc::clone(&active);
                let overlaps = Arc::clone(&overlaps);
                thread::spawn(move || {
                    let handle = locks.handle("p1");
                    let _guard = acquire(&handle);
                    if active.fetch_add(1, Ordering::SeqCst) > 0 {
                        overlaps.fetch_add(1, Ordering::SeqCst);
                    }
                    thread::sleep(Duration::from_millis(5));
                    active.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for worker in workers {
            worker.join().expect("worker thread");
        }
        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn released_locks_are_pruned() {
        let locks = ProjectLocks::new();
        for n in 0..100 {
            let handle = locks.handle(&format!("project-{n}"));
            let _guard = acquire(&handle);
        }
        assert_eq!(locks.len(), 1);

        let held = locks.handle("busy");
        drop(locks.handle("idle"));
        let again = locks.handle("busy");
        assert!(Arc::ptr_eq(&held, &again));
        assert_eq!(locks.len(), 1);
    }
}
