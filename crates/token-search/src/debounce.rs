use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::trace;

/// Trailing-edge debounce of a value.
///
/// The output only takes a pushed value once no new value has been pushed for
/// a full window. Every push restarts the window. Pushing the value that is
/// already pending is a no-op.
///
/// Must be created inside a tokio runtime; the timer runs on a spawned task
/// which is aborted on drop.
pub struct Debouncer<T> {
    input: watch::Sender<T>,
    output: watch::Receiver<T>,
    task: JoinHandle<()>,
}

impl<T> Debouncer<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    pub fn new(initial: T, window: Duration) -> Self {
        let (input, mut input_rx) = watch::channel(initial.clone());
        let (output_tx, output) = watch::channel(initial);

        let task = tokio::spawn(async move {
            loop {
                if input_rx.changed().await.is_err() {
                    return;
                }
                loop {
                    tokio::select! {
                        changed = input_rx.changed() => {
                            if changed.is_err() {
                                return;
                            }
                            trace!("debounce window restarted");
                        }
                        _ = tokio::time::sleep(window) => break,
                    }
                }
                let value = input_rx.borrow_and_update().clone();
                output_tx.send_if_modified(|current| {
                    if *current == value {
                        return false;
                    }
                    *current = value;
                    true
                });
            }
        });

        Self {
            input,
            output,
            task,
        }
    }

    /// Feed a new raw value.
    pub fn push(&self, value: T) {
        self.input.send_if_modified(|pending| {
            if *pending == value {
                return false;
            }
            *pending = value;
            true
        });
    }

    /// The latest debounced value.
    pub fn current(&self) -> T {
        self.output.borrow().clone()
    }

    /// Receiver notified on every debounced transition.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.output.clone()
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}
