use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

/// Keeps successive inference requests at least `min_interval` apart.
pub struct Throttle {
    min_interval: Duration,
    last_request: Option<Instant>,
}

impl Throttle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: None,
        }
    }

    pub fn wait(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                let remaining = self.min_interval - elapsed;
                debug!(wait_ms = remaining.as_millis() as u64, "throttling inference request");
                thread::sleep(remaining);
            }
        }
        self.last_request = Some(Instant::now());
    }
}

/// Cooperative cancellation checked between chunks and documents.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    stop_file: Option<PathBuf>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// The token trips once `path` exists on disk.
    pub fn with_stop_file(path: PathBuf) -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            stop_file: Some(path),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        if self.cancelled.load(Ordering::SeqCst) {
            return true;
        }
        if self.stop_file.as_ref().is_some_and(|path| path.exists()) {
            self.cancel();
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_request_is_not_delayed() {
        let mut throttle = Throttle::new(Duration::from_secs(30));
        let started = Instant::now();
        throttle.wait();
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn second_request_waits_for_interval() {
        let mut throttle = Throttle::new(Duration::from_millis(40));
        throttle.wait();
        let started = Instant::now();
        throttle.wait();
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn cancel_is_shared_between_clones() {
        let token = CancelToken::new();
        let observer = token.clone();
        assert!(!observer.is_cancelled());
        token.cancel();
        assert!(observer.is_cancelled());
    }

    #[test]
    fn stop_file_trips_token() {
        let path = std::env::temp_dir().join(format!("memjobs_stop_{}", std::process::id()));
        let _ = std::fs::remove_file(&path);
        let token = CancelToken::with_stop_file(path.clone());
        assert!(!token.is_cancelled());

        std::fs::write(&path, b"stop").expect("write stop file");
        assert!(token.is_cancelled());
        let _ = std::fs::remove_file(&path);
        assert!(token.is_cancelled());
    }
}
