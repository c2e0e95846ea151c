use std::collections::VecDeque;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

/// Priority class of a task; high-priority tasks are drained before default ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Priority {
    High,
    Default,
}

impl Priority {
    fn index(self) -> usize {
        match self {
            Priority::High => 0,
            Priority::Default => 1,
        }
    }
}

type Task = Box<dyn FnOnce() + Send + 'static>;

struct QueuedTask {
    f: Task,
    set: Option<Arc<SetState>>,
}

struct SetState {
    total: AtomicI64,
    finished: AtomicI64,
    done_mtx: Mutex<()>,
    done_cv: Condvar,
}

impl SetState {
    fn new() -> SetState {
        SetState {
            total: AtomicI64::new(0),
            finished: AtomicI64::new(0),
            done_mtx: Mutex::new(()),
            done_cv: Condvar::new(),
        }
    }

    fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst) >= self.total.load(Ordering::SeqCst)
    }

    fn finish_one(&self) {
        self.finished.fetch_add(1, Ordering::SeqCst);
        if self.is_finished() {
            let _guard = self.done_mtx.lock().unwrap();
            self.done_cv.notify_all();
        }
    }
}

struct PoolState {
    queues: Mutex<[VecDeque<QueuedTask>; 2]>,
    work_cv: Condvar,
    stop: AtomicBool,
    first_error: Mutex<Option<String>>,
}

impl PoolState {
    fn pop(&self) -> Option<QueuedTask> {
        let mut queues = self.queues.lock().unwrap();
        for q in queues.iter_mut() {
            if let Some(t) = q.pop_front() {
                return Some(t);
            }
        }
        None
    }

    /// Blocks an idle worker until `enqueue`, a task completion or a panic signals
    /// the condvar. The queue state is re-checked under the lock, so a task pushed
    /// between `pop` and this call is seen immediately; the timeout bounds the wait
    /// for exit conditions that are not signalled through `work_cv`.
    fn wait_for_work(&self) {
        let queues = self.queues.lock().unwrap();
        if queues.iter().any(|q| !q.is_empty()) {
            return;
        }
        let _ = self
            .work_cv
            .wait_timeout(queues, std::time::Duration::from_millis(10))
            .unwrap();
    }

    fn record_panic(&self, message: String) {
        log::warn!("worker failed: {}", message);
        let mut slot = self.first_error.lock().unwrap();
        if slot.is_none() {
            *slot = Some(message);
        }
        self.stop.store(true, Ordering::SeqCst);
        self.work_cv.notify_all();
    }

    fn run_task(&self, task: QueuedTask) {
        let result = catch_unwind(AssertUnwindSafe(task.f));
        if let Err(e) = result {
            let message = e
                .downcast_ref::<String>()
                .cloned()
                .or_else(|| e.downcast_ref::<&str>().map(|s| s.to_string()))
                .unwrap_or_else(|| "worker task panicked".to_string());
            self.record_panic(message);
        }
        if let Some(set) = task.set {
            set.finish_one();
            // idle workers re-check their set's finish condition
            self.work_cv.notify_all();
        }
    }
}

/// A bulk-joinable group of tasks submitted to a [`ThreadPool`].
///
/// A worker may enqueue a sub-set of tasks and then [`run`](TaskSet::run) the pool
/// until its own set finishes; this makes the pool safe for nested use.
pub struct TaskSet {
    state: Arc<SetState>,
    pool: Arc<PoolState>,
    priority: Priority,
}

impl TaskSet {
    /// Submits a task belonging to this set.
    pub fn enqueue<F: FnOnce() + Send + 'static>(&self, f: F) {
        self.state.total.fetch_add(1, Ordering::SeqCst);
        {
            let mut queues = self.pool.queues.lock().unwrap();
            queues[self.priority.index()].push_back(QueuedTask {
                f: Box::new(f),
                set: Some(self.state.clone()),
            });
        }
        self.pool.work_cv.notify_one();
    }

    /// Executes queued tasks on the calling thread until every task of this set has finished.
    pub fn run(&self) {
        while !self.state.is_finished() {
            match self.pool.pop() {
                Some(task) => self.pool.run_task(task),
                None => {
                    // Tasks of this set may still be running on other workers.
                    let guard = self.state.done_mtx.lock().unwrap();
                    if self.state.is_finished() {
                        return;
                    }
                    let (_guard, _timeout) = self
                        .state
                        .done_cv
                        .wait_timeout(guard, std::time::Duration::from_millis(2))
                        .unwrap();
                }
            }
        }
    }

    /// Number of tasks submitted to this set so far.
    pub fn total(&self) -> i64 {
        self.state.total.load(Ordering::SeqCst)
    }
}

/// A thread pool with two priority queues and an optional default work range.
///
/// Workers drain queued tasks, high priority first; when the queues are empty they
/// pick indices from the default range, if one was installed with
/// [`run_default`](ThreadPool::run_default). Fatal panics inside a worker stop
/// scheduling of new work; the first panic message is rethrown from
/// [`join`](ThreadPool::join).
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicI64, Ordering};
/// use seqsieve_util::{ThreadPool, Priority};
///
/// let pool = ThreadPool::new();
/// let sum = Arc::new(AtomicI64::new(0));
/// let set = pool.task_set(Priority::Default);
/// for i in 0..100 {
///     let sum = sum.clone();
///     set.enqueue(move || { sum.fetch_add(i, Ordering::SeqCst); });
/// }
/// pool.run(4, &set);
/// pool.join();
/// assert_eq!(sum.load(Ordering::SeqCst), 4950);
/// ```
pub struct ThreadPool {
    state: Arc<PoolState>,
    workers: Mutex<Vec<thread::JoinHandle<()>>>,
}

impl ThreadPool {
    pub fn new() -> ThreadPool {
        ThreadPool {
            state: Arc::new(PoolState {
                queues: Mutex::new([VecDeque::new(), VecDeque::new()]),
                work_cv: Condvar::new(),
                stop: AtomicBool::new(false),
                first_error: Mutex::new(None),
            }),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Creates a new, empty task set bound to this pool.
    pub fn task_set(&self, priority: Priority) -> TaskSet {
        TaskSet {
            state: Arc::new(SetState::new()),
            pool: self.state.clone(),
            priority,
        }
    }

    /// Spawns `threads` workers that run until `set` has finished.
    pub fn run(&self, threads: usize, set: &TaskSet) {
        let mut workers = self.workers.lock().unwrap();
        for _ in 0..threads {
            let state = self.state.clone();
            let set_state = set.state.clone();
            workers.push(thread::spawn(move || {
                while !set_state.is_finished() && !state.stop.load(Ordering::SeqCst) {
                    match state.pop() {
                        Some(task) => state.run_task(task),
                        None => state.wait_for_work(),
                    }
                }
            }));
        }
    }

    /// Executes `f(i)` for every `i` in `begin..end` on `threads` workers, draining any
    /// queued tasks first whenever the queues are non-empty.
    pub fn run_default<F>(&self, threads: usize, begin: i64, end: i64, f: F)
    where
        F: Fn(i64) + Send + Sync + 'static,
    {
        let next = Arc::new(AtomicI64::new(begin));
        let f = Arc::new(f);
        let mut workers = self.workers.lock().unwrap();
        for _ in 0..threads {
            let state = self.state.clone();
            let next = next.clone();
            let f = f.clone();
            workers.push(thread::spawn(move || loop {
                if state.stop.load(Ordering::SeqCst) {
                    return;
                }
                if let Some(task) = state.pop() {
                    state.run_task(task);
                    continue;
                }
                let i = next.fetch_add(1, Ordering::SeqCst);
                if i >= end {
                    return;
                }
                let result = catch_unwind(AssertUnwindSafe(|| f(i)));
                if let Err(e) = result {
                    let message = e
                        .downcast_ref::<String>()
                        .cloned()
                        .or_else(|| e.downcast_ref::<&str>().map(|s| s.to_string()))
                        .unwrap_or_else(|| "worker task panicked".to_string());
                    state.record_panic(message);
                }
            }));
        }
    }

    /// Joins all workers; rethrows the first worker panic, if any.
    pub fn join(&self) {
        let mut workers = self.workers.lock().unwrap();
        for w in workers.drain(..) {
            let _ = w.join();
        }
        let mut slot = self.state.first_error.lock().unwrap();
        if let Some(message) = slot.take() {
            panic!("{}", message);
        }
    }
}

impl Default for ThreadPool {
    fn default() -> Self {
        ThreadPool::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn nested_task_sets() {
        let pool = Arc::new(ThreadPool::new());
        let count = Arc::new(AtomicUsize::new(0));
        let outer = pool.task_set(Priority::Default);
        for _ in 0..8 {
            let pool2 = pool.clone();
            let count2 = count.clone();
            outer.enqueue(move || {
                let inner = pool2.task_set(Priority::High);
                for _ in 0..4 {
                    let c = count2.clone();
                    inner.enqueue(move || {
                        c.fetch_add(1, Ordering::SeqCst);
                    });
                }
                inner.run();
            });
        }
        pool.run(3, &outer);
        outer.run();
        pool.join();
        assert_eq!(count.load(Ordering::SeqCst), 32);
    }

    #[test]
    fn default_range_runs_all_indices() {
        let pool = ThreadPool::new();
        let count = Arc::new(AtomicI64::new(0));
        let c = count.clone();
        pool.run_default(4, 0, 1000, move |_i| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        pool.join();
        assert_eq!(count.load(Ordering::SeqCst), 1000);
    }

    #[test]
    #[should_panic]
    fn worker_panic_rethrown_on_join() {
        let pool = ThreadPool::new();
        let set = pool.task_set(Priority::Default);
        set.enqueue(|| panic!("boom"));
        pool.run(2, &set);
        set.run();
        pool.join();
    }
}
