//! Bounded pool of OS threads draining an explicit task queue.

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::thread;

/// Run `work` over every task on at most `threads` scoped threads.
///
/// Each output is paired with the position of its task in `tasks`, so callers
/// can re-associate results however they complete. Output order is
/// completion order.
pub fn run_pool<T, R, F>(tasks: Vec<T>, threads: usize, work: F) -> Vec<(usize, R)>
where
    T: Send,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    if tasks.is_empty() {
        return Vec::new();
    }

    let threads = threads.clamp(1, tasks.len());
    let (task_tx, task_rx) = unbounded();
    for item in tasks.into_iter().enumerate() {
        // The receiver is still held here, so the send cannot fail.
        let _ = task_tx.send(item);
    }
    drop(task_tx);
    let (result_tx, result_rx) = unbounded();

    thread::scope(|scope| {
        let mut spawned = 0;
        for n in 0..threads {
            let tasks = task_rx.clone();
            let results = result_tx.clone();
            let work = &work;
            let handle = thread::Builder::new()
                .name(format!("dispatch-{n}"))
                .spawn_scoped(scope, move || drain(&tasks, work, &results));
            match handle {
                Ok(_) => spawned += 1,
                Err(e) => tracing::warn!("Could not start pool thread {}: {}", n, e),
            }
        }

        if spawned == 0 {
            tracing::warn!("No pool threads available, running tasks inline");
            drain(&task_rx, &work, &result_tx);
        }
    });
    drop(result_tx);

    result_rx.into_iter().collect()
}

fn drain<T, R, F>(tasks: &Receiver<(usize, T)>, work: &F, results: &Sender<(usize, R)>)
where
    F: Fn(&T) -> R,
{
    for (index, task) in tasks.iter() {
        let output = work(&task);
        if results.send((index, output)).is_err() {
            break;
        }
    }
}
