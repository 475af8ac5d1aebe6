//! Bounded work queue shared by producers and workers.
//!
//! Holds path references, not file contents. Producers never block: a full
//! queue rejects the entry and the next backfill scan recovers it. Workers
//! block on [`WorkQueue::pop`]. An outstanding-work counter (incremented per
//! queued file, decremented by [`WorkQueue::task_done`]) lets the batch
//! coordinator wait for drain with [`WorkQueue::join`].
//!
//! Paths that are queued or currently held by a worker are tracked so
//! producers can skip duplicates. A worker can also hold extra paths on
//! behalf of the file it is processing (the intermediate name of a rename);
//! those are released together with the file.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// A candidate file and how many stability checks it has already failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub path: PathBuf,
    pub attempts: u32,
}

impl QueueEntry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            attempts: 0,
        }
    }

    /// The same file, one stability attempt later.
    pub fn retry(&self) -> Self {
        Self {
            path: self.path.clone(),
            attempts: self.attempts + 1,
        }
    }
}

/// An item taken from the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    File(QueueEntry),
    /// Tells exactly one worker to exit its loop.
    Shutdown,
}

/// Result of a non-blocking enqueue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    Queued,
    /// Already queued or being processed.
    Duplicate,
    /// At capacity; the entry was dropped.
    Full,
    /// Rejected by the caller's check (the file is gone).
    Gone,
}

/// Returned by [`WorkQueue::try_push`] when the queue is at capacity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueFull(pub QueueEntry);

#[derive(Debug, Default)]
struct State {
    items: VecDeque<Entry>,
    /// File entries in `items` (shutdown signals do not use capacity).
    files: usize,
    /// Queued plus in-flight files not yet acknowledged.
    outstanding: usize,
    queued_paths: HashSet<PathBuf>,
    /// Held paths with their hold counts.
    in_flight: HashMap<PathBuf, usize>,
    /// Extra paths held on behalf of an in-flight file.
    holds: HashMap<PathBuf, Vec<PathBuf>>,
}

impl State {
    fn is_known(&self, path: &Path) -> bool {
        self.queued_paths.contains(path) || self.in_flight.contains_key(path)
    }

    fn hold(&mut self, path: PathBuf) {
        *self.in_flight.entry(path).or_insert(0) += 1;
    }

    fn release(&mut self, path: &Path) {
        if let Some(count) = self.in_flight.get_mut(path) {
            *count -= 1;
            if *count == 0 {
                self.in_flight.remove(path);
            }
        }
    }

    /// Drop `owner`'s own hold and every extra path held for it.
    fn release_with_extras(&mut self, owner: &Path) {
        for extra in self.holds.remove(owner).unwrap_or_default() {
            self.release(&extra);
        }
        self.release(owner);
    }
}

/// Bounded MPMC queue of [`Entry`] values.
#[derive(Debug)]
pub struct WorkQueue {
    capacity: usize,
    state: Mutex<State>,
    available: Condvar,
    drained: Condvar,
}

impl WorkQueue {
    /// Create a queue holding at most `capacity` files (minimum 1).
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(State::default()),
            available: Condvar::new(),
            drained: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of queued file entries.
    pub fn len(&self) -> usize {
        self.lock().files
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    /// Files enqueued but not yet acknowledged.
    pub fn outstanding(&self) -> usize {
        self.lock().outstanding
    }

    /// Whether `path` is queued or held by a worker.
    pub fn contains(&self, path: &Path) -> bool {
        self.lock().is_known(path)
    }

    /// Enqueue without blocking. Duplicates are not checked.
    pub fn try_push(&self, entry: QueueEntry) -> Result<(), QueueFull> {
        let mut state = self.lock();
        if state.files >= self.capacity {
            return Err(QueueFull(entry));
        }
        Self::push_locked(&mut state, entry);
        drop(state);
        self.available.notify_one();
        Ok(())
    }

    /// Enqueue a fresh entry for `path` unless it is already known or the
    /// queue is full. Never blocks.
    pub fn offer(&self, path: &Path) -> Offer {
        self.offer_if(path, |_| true)
    }

    /// Like [`offer`](Self::offer), but runs `present` under the queue lock
    /// after the duplicate check. A worker acknowledges a file only after
    /// moving it, so a path that is neither tracked nor present has already
    /// been handled.
    pub fn offer_if(&self, path: &Path, present: impl FnOnce(&Path) -> bool) -> Offer {
        let mut state = self.lock();
        if state.is_known(path) {
            return Offer::Duplicate;
        }
        if !present(path) {
            return Offer::Gone;
        }
        if state.files >= self.capacity {
            return Offer::Full;
        }
        Self::push_locked(&mut state, QueueEntry::new(path));
        drop(state);
        self.available.notify_one();
        Offer::Queued
    }

    fn push_locked(state: &mut State, entry: QueueEntry) {
        state.outstanding += 1;
        Self::append_locked(state, entry);
    }

    fn append_locked(state: &mut State, entry: QueueEntry) {
        state.files += 1;
        state.queued_paths.insert(entry.path.clone());
        state.items.push_back(Entry::File(entry));
    }

    /// Put an in-flight file back at the tail for another attempt.
    ///
    /// The worker's hold on the path turns into a queued entry under one
    /// lock, so producers see it as a duplicate throughout and the attempt
    /// needs no [`task_done`](Self::task_done). On `QueueFull` the hold is
    /// kept and the caller must acknowledge as usual.
    pub fn requeue(&self, entry: QueueEntry) -> Result<(), QueueFull> {
        let mut state = self.lock();
        if state.files >= self.capacity {
            return Err(QueueFull(entry));
        }
        state.release_with_extras(&entry.path);
        Self::append_locked(&mut state, entry);
        drop(state);
        self.available.notify_one();
        Ok(())
    }

    /// Hold `path` for the in-flight file `owner` until `owner` is
    /// acknowledged. Producers treat a held path as a duplicate.
    pub fn hold_for(&self, owner: &Path, path: &Path) {
        let mut state = self.lock();
        state.hold(path.to_path_buf());
        state
            .holds
            .entry(owner.to_path_buf())
            .or_default()
            .push(path.to_path_buf());
    }

    /// Append a shutdown signal. Always accepted, regardless of capacity.
    pub fn push_shutdown(&self) {
        self.lock().items.push_back(Entry::Shutdown);
        self.available.notify_one();
    }

    fn take_locked(state: &mut State) -> Option<Entry> {
        let entry = state.items.pop_front()?;
        if let Entry::File(ref file) = entry {
            state.files -= 1;
            state.queued_paths.remove(&file.path);
            state.hold(file.path.clone());
        }
        Some(entry)
    }

    /// Block until an entry is available and take it.
    pub fn pop(&self) -> Entry {
        let mut state = self.lock();
        loop {
            if let Some(entry) = Self::take_locked(&mut state) {
                return entry;
            }
            state = self
                .available
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Like [`pop`](Self::pop) but gives up after `timeout`.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<Entry> {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        loop {
            if let Some(entry) = Self::take_locked(&mut state) {
                return Some(entry);
            }
            let remaining = deadline.checked_duration_since(Instant::now())?;
            let (guard, _) = self
                .available
                .wait_timeout(state, remaining)
                .unwrap_or_else(|e| e.into_inner());
            state = guard;
        }
    }

    /// Acknowledge that the worker holding `path` is done with it. Extra
    /// paths held for it are released too.
    pub fn task_done(&self, path: &Path) {
        let mut state = self.lock();
        state.release_with_extras(path);
        state.outstanding = state.outstanding.saturating_sub(1);
        let drained = state.outstanding == 0;
        drop(state);
        if drained {
            self.drained.notify_all();
        }
    }

    /// Block until every enqueued file has been acknowledged.
    pub fn join(&self) {
        let mut state = self.lock();
        while state.outstanding > 0 {
            state = self
                .drained
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Like [`join`](Self::join) with a deadline. Returns whether the queue drained.
    pub fn join_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut state = self.lock();
        while state.outstanding > 0 {
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                return false;
            };
            let (guard, _) = self
                .drained
                .wait_timeout(state, remaining)
                .unwrap_or_else(|e| e.into_inner());
            state = guard;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn entry(name: &str) -> QueueEntry {
        QueueEntry::new(format!("/w/{name}"))
    }

    fn file_path(e: Entry) -> PathBuf {
        match e {
            Entry::File(f) => f.path,
            Entry::Shutdown => panic!("unexpected shutdown"),
        }
    }

    #[test]
    fn fifo_order() {
        let q = WorkQueue::new(4);
        q.try_push(entry("a")).unwrap();
        q.try_push(entry("b")).unwrap();
        assert_eq!(file_path(q.pop()), PathBuf::from("/w/a"));
        assert_eq!(file_path(q.pop()), PathBuf::from("/w/b"));
    }

    #[test]
    fn full_queue_rejects_without_blocking() {
        let q = WorkQueue::new(2);
        q.try_push(entry("a")).unwrap();
        q.try_push(entry("b")).unwrap();

        let start = Instant::now();
        assert_eq!(q.try_push(entry("c")), Err(QueueFull(entry("c"))));
        assert_eq!(q.offer(Path::new("/w/d")), Offer::Full);
        assert!(start.elapsed() < Duration::from_millis(100));
        assert_eq!(q.len(), 2);
        assert_eq!(q.outstanding(), 2);
    }

    #[test]
    fn offer_skips_queued_and_in_flight_paths() {
        let q = WorkQueue::new(4);
        assert_eq!(q.offer(Path::new("/w/a")), Offer::Queued);
        assert_eq!(q.offer(Path::new("/w/a")), Offer::Duplicate);

        let taken = file_path(q.pop());
        assert!(q.contains(&taken));
        assert_eq!(q.offer(&taken), Offer::Duplicate);

        q.task_done(&taken);
        assert!(!q.contains(&taken));
        assert_eq!(q.offer(&taken), Offer::Queued);
    }

    #[test]
    fn offer_if_rejects_vanished_paths() {
        let q = WorkQueue::new(4);
        assert_eq!(q.offer_if(Path::new("/w/a"), |_| false), Offer::Gone);
        assert_eq!(q.outstanding(), 0);
        q.offer(Path::new("/w/a"));
        // Duplicates win over the presence check.
        assert_eq!(q.offer_if(Path::new("/w/a"), |_| false), Offer::Duplicate);
    }

    #[test]
    fn shutdown_ignores_capacity() {
        let q = WorkQueue::new(1);
        q.try_push(entry("a")).unwrap();
        q.push_shutdown();
        assert_eq!(q.len(), 1);
        assert_eq!(q.outstanding(), 1);
        assert!(matches!(q.pop(), Entry::File(_)));
        assert_eq!(q.pop(), Entry::Shutdown);
    }

    #[test]
    fn requeue_keeps_outstanding_balanced() {
        let q = WorkQueue::new(2);
        q.try_push(entry("a")).unwrap();
        let Entry::File(first) = q.pop() else {
            panic!("expected file");
        };
        q.requeue(first.retry()).unwrap();
        assert_eq!(q.outstanding(), 1);
        assert_eq!(q.len(), 1);

        let Entry::File(second) = q.pop() else {
            panic!("expected file");
        };
        assert_eq!(second.attempts, 1);
        q.task_done(&second.path);
        assert_eq!(q.outstanding(), 0);
        assert!(q.join_timeout(Duration::from_millis(10)));
    }

    #[test]
    fn requeued_path_stays_known_while_another_worker_holds_it() {
        let q = WorkQueue::new(2);
        let p = Path::new("/w/growing.txt");
        q.offer(p);
        let Entry::File(first) = q.pop() else {
            panic!("expected file");
        };
        q.requeue(first.retry()).unwrap();
        assert_eq!(q.offer(p), Offer::Duplicate);

        // A second worker picks it up; the first attempt has nothing left to ack.
        let Entry::File(second) = q.pop() else {
            panic!("expected file");
        };
        assert_eq!(q.offer(p), Offer::Duplicate);
        assert_eq!(q.outstanding(), 1);

        q.task_done(&second.path);
        assert_eq!(q.outstanding(), 0);
        assert_eq!(q.offer(p), Offer::Queued);
    }

    #[test]
    fn requeue_into_full_queue_keeps_the_hold() {
        let q = WorkQueue::new(1);
        q.offer(Path::new("/w/a"));
        let Entry::File(a) = q.pop() else {
            panic!("expected file");
        };
        q.offer(Path::new("/w/b"));
        assert!(q.requeue(a.retry()).is_err());
        assert!(q.contains(&a.path));
        q.task_done(&a.path);
        assert!(!q.contains(&a.path));
        assert_eq!(q.outstanding(), 1);
    }

    #[test]
    fn extra_holds_are_released_with_their_owner() {
        let q = WorkQueue::new(4);
        let src = Path::new("/w/scan001.txt");
        let renamed = Path::new("/w/meeting notes_2024-05-01_09.30.00.txt");
        q.offer(src);
        let Entry::File(taken) = q.pop() else {
            panic!("expected file");
        };
        q.hold_for(&taken.path, renamed);
        assert_eq!(q.offer(renamed), Offer::Duplicate);

        q.task_done(&taken.path);
        assert!(!q.contains(renamed));
        assert!(!q.contains(src));
        assert_eq!(q.offer(renamed), Offer::Queued);
    }

    #[test]
    fn pop_timeout_on_empty_queue() {
        let q = WorkQueue::new(1);
        assert_eq!(q.pop_timeout(Duration::from_millis(20)), None);
    }

    #[test]
    fn pop_blocks_until_push() {
        let q = Arc::new(WorkQueue::new(1));
        let consumer = {
            let q = Arc::clone(&q);
            std::thread::spawn(move || q.pop())
        };
        std::thread::sleep(Duration::from_millis(30));
        q.try_push(entry("late")).unwrap();
        assert_eq!(file_path(consumer.join().unwrap()), PathBuf::from("/w/late"));
    }

    #[test]
    fn join_waits_for_acknowledgement() {
        let q = Arc::new(WorkQueue::new(4));
        q.try_push(entry("a")).unwrap();
        q.try_push(entry("b")).unwrap();
        assert!(!q.join_timeout(Duration::from_millis(10)));

        let worker = {
            let q = Arc::clone(&q);
            std::thread::spawn(move || {
                for _ in 0..2 {
                    let path = file_path(q.pop());
                    std::thread::sleep(Duration::from_millis(10));
                    q.task_done(&path);
                }
            })
        };
        q.join();
        assert_eq!(q.outstanding(), 0);
        worker.join().unwrap();
    }
}
