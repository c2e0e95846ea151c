use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

/// Runs `f(partition, thread_id)` over `0..partition_count` on `thread_count` OS threads.
///
/// Partitions are handed out through a shared atomic counter, so threads that finish
/// early pick up the remaining work.
pub fn scheduled_thread_pool<F>(thread_count: usize, partition_count: usize, f: F)
where
    F: Fn(usize, usize) + Send + Sync + 'static,
{
    let next = Arc::new(AtomicUsize::new(0));
    let f = Arc::new(f);
    let mut threads = Vec::with_capacity(thread_count);
    for thread_id in 0..thread_count {
        let next = next.clone();
        let f = f.clone();
        threads.push(thread::spawn(move || {
            loop {
                let p = next.fetch_add(1, Ordering::Relaxed);
                if p >= partition_count {
                    break;
                }
                f(p, thread_id);
            }
        }));
    }
    for t in threads {
        t.join().expect("worker thread panicked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn all_partitions_visited_once() {
        let seen = Arc::new(Mutex::new(vec![0usize; 100]));
        let seen2 = seen.clone();
        scheduled_thread_pool(4, 100, move |p, _t| {
            seen2.lock().unwrap()[p] += 1;
        });
        assert!(seen.lock().unwrap().iter().all(|&n| n == 1));
    }
}
