use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Serializes calls to a rate-limited external service by enforcing a
/// minimum interval between consecutive acquisitions. Callers await `pause`
/// before each request; the first call proceeds immediately.
#[derive(Debug)]
pub struct Pacer {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl Pacer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    pub async fn pause(&self) {
        let mut last = self.last_call.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_call_does_not_wait() {
        let pacer = Pacer::new(Duration::from_secs(60));
        let start = Instant::now();
        pacer.pause().await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn second_call_waits_out_the_interval() {
        let pacer = Pacer::new(Duration::from_secs(1));
        pacer.pause().await;

        let start = Instant::now();
        pacer.pause().await;
        assert!(start.elapsed() >= Duration::from_secs(1));
    }
}
