//! One-shot shutdown latch

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Records that a shutdown has been requested
///
/// Clones share the same latch. Once initiated it stays initiated.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag {
    initiated: Arc<AtomicBool>,
}

impl ShutdownFlag {
    /// Create an unset flag
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag
    ///
    /// Returns `true` only for the call that actually set it, so concurrent
    /// requesters can tell which one owns the shutdown.
    pub fn initiate(&self) -> bool {
        !self.initiated.swap(true, Ordering::AcqRel)
    }

    /// Whether the flag has been set
    pub fn is_initiated(&self) -> bool {
        self.initiated.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initiate_is_one_shot() {
        let flag = ShutdownFlag::new();
        assert!(!flag.is_initiated());

        assert!(flag.initiate());
        assert!(flag.is_initiated());

        assert!(!flag.initiate());
        assert!(flag.is_initiated());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_initiate_has_single_winner() {
        let flag = ShutdownFlag::new();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let flag = flag.clone();
                tokio::spawn(async move { flag.initiate() })
            })
            .collect();

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap() {
                winners += 1;
            }
        }

        assert_eq!(winners, 1);
        assert!(flag.is_initiated());
    }
}
