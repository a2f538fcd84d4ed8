use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cloneable stop flag raised from the Ctrl-C handler.
#[derive(Clone, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Sleeps for `delay` or until the flag is raised, whichever is first.
    /// Returns true if woken by the flag.
    pub fn wait(&self, delay: Duration) -> bool {
        const SLICE: Duration = Duration::from_millis(100);
        let deadline = Instant::now() + delay;
        loop {
            if self.is_triggered() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            std::thread::sleep(SLICE.min(deadline - now));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_returns_early_once_triggered() {
        let shutdown = Shutdown::new();
        let remote = shutdown.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            remote.trigger();
        });
        let started = Instant::now();
        assert!(shutdown.wait(Duration::from_secs(30)));
        assert!(started.elapsed() < Duration::from_secs(5));
        handle.join().unwrap();
    }

    #[test]
    fn wait_times_out_when_untriggered() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.wait(Duration::from_millis(20)));
        assert!(!shutdown.wait(Duration::ZERO));
    }
}
