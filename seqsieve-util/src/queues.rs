use std::collections::{BTreeMap, VecDeque};
use std::sync::{Condvar, Mutex};

/// A bounded multi-producer multi-consumer queue.
///
/// `enqueue` blocks while the queue is full; `wait_and_dequeue` blocks while it is
/// empty and not yet closed. After [`close`](BoundedQueue::close), consumers drain the
/// remaining items and then receive `None`.
pub struct BoundedQueue<T> {
    state: Mutex<QueueState<T>>,
    not_full: Condvar,
    not_empty: Condvar,
    capacity: usize,
}

struct QueueState<T> {
    items: VecDeque<T>,
    closed: bool,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> BoundedQueue<T> {
        assert!(capacity > 0, "queue capacity must be positive");
        BoundedQueue {
            state: Mutex::new(QueueState {
                items: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            capacity,
        }
    }

    /// Adds an item, blocking while the queue is full. Panics if the queue was closed.
    pub fn enqueue(&self, item: T) {
        let mut state = self.state.lock().unwrap();
        while state.items.len() >= self.capacity {
            state = self.not_full.wait(state).unwrap();
        }
        if state.closed {
            panic!("enqueue on a closed queue");
        }
        state.items.push_back(item);
        self.not_empty.notify_one();
    }

    /// Removes the oldest item, blocking while the queue is empty and open.
    /// Returns `None` once the queue is closed and drained.
    pub fn wait_and_dequeue(&self) -> Option<T> {
        let mut state = self.state.lock().unwrap();
        loop {
            if let Some(item) = state.items.pop_front() {
                self.not_full.notify_one();
                return Some(item);
            }
            if state.closed {
                return None;
            }
            state = self.not_empty.wait(state).unwrap();
        }
    }

    /// Closes the queue; consumers finish the remaining items and stop.
    pub fn close(&self) {
        let mut state = self.state.lock().unwrap();
        state.closed = true;
        self.not_empty.notify_all();
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Restores input order over items produced out of order by parallel workers.
///
/// Each item is keyed by its input ordinal; the sink closure receives items in strictly
/// increasing key order no matter in which order workers push them. Either a whole item
/// is committed to the sink or it is still buffered, so the output stream is never
/// partially written.
pub struct ReorderQueue<T> {
    state: Mutex<ReorderState<T>>,
}

struct ReorderState<T> {
    next: u32,
    pending: BTreeMap<u32, T>,
    sink: Box<dyn FnMut(T) + Send>,
}

impl<T> ReorderQueue<T> {
    pub fn new(next: u32, sink: Box<dyn FnMut(T) + Send>) -> ReorderQueue<T> {
        ReorderQueue {
            state: Mutex::new(ReorderState {
                next,
                pending: BTreeMap::new(),
                sink,
            }),
        }
    }

    /// Hands over the item with ordinal `key`; flushes every consecutive ready item.
    pub fn push(&self, key: u32, item: T) {
        let mut state = self.state.lock().unwrap();
        state.pending.insert(key, item);
        while let Some(item) = {
            let next = state.next;
            state.pending.remove(&next)
        } {
            (state.sink)(item);
            state.next += 1;
        }
    }

    /// Number of items buffered waiting for their predecessors.
    pub fn pending(&self) -> usize {
        self.state.lock().unwrap().pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn bounded_queue_drains_after_close() {
        let q = Arc::new(BoundedQueue::new(4));
        let producer = {
            let q = q.clone();
            thread::spawn(move || {
                for i in 0..100 {
                    q.enqueue(i);
                }
                q.close();
            })
        };
        let consumer = {
            let q = q.clone();
            thread::spawn(move || {
                let mut items = Vec::new();
                while let Some(i) = q.wait_and_dequeue() {
                    items.push(i);
                }
                items
            })
        };
        producer.join().unwrap();
        let items = consumer.join().unwrap();
        assert_eq!(items, (0..100).collect::<Vec<i32>>());
    }

    #[test]
    fn reorder_queue_restores_input_order() {
        let out = Arc::new(Mutex::new(Vec::new()));
        let out2 = out.clone();
        let q = ReorderQueue::new(0, Box::new(move |i: u32| out2.lock().unwrap().push(i)));
        for key in [3u32, 1, 0, 2, 5, 4] {
            q.push(key, key);
        }
        assert_eq!(*out.lock().unwrap(), vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(q.pending(), 0);
    }
}
