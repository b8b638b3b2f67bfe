//! Background ticker for the exam clock.

use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::debug;

use super::controller::SessionEvent;

/// Sends one `SessionEvent::Tick` per period until stopped or dropped.
/// The first tick fires one full period after `start`.
#[derive(Debug)]
pub(crate) struct Countdown {
    task: JoinHandle<()>,
}

impl Countdown {
    pub(crate) fn start(period: Duration, events: UnboundedSender<SessionEvent>) -> Self {
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                if events.send(SessionEvent::Tick).is_err() {
                    debug!("Countdown receiver gone, stopping");
                    break;
                }
            }
        });
        Self { task }
    }

    pub(crate) fn stop(&mut self) {
        self.task.abort();
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;
    use tokio::time::sleep;

    fn drain(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> usize {
        let mut ticks = 0;
        while let Ok(event) = rx.try_recv() {
            assert!(matches!(event, SessionEvent::Tick));
            ticks += 1;
        }
        ticks
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_once_per_period() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _countdown = Countdown::start(Duration::from_secs(1), tx);

        sleep(Duration::from_millis(500)).await;
        assert_eq!(drain(&mut rx), 0);

        sleep(Duration::from_millis(3000)).await;
        assert_eq!(drain(&mut rx), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_halts_ticks() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut countdown = Countdown::start(Duration::from_secs(1), tx);

        sleep(Duration::from_millis(2500)).await;
        assert_eq!(drain(&mut rx), 2);

        countdown.stop();
        sleep(Duration::from_secs(10)).await;
        assert_eq!(drain(&mut rx), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_halts_ticks() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let countdown = Countdown::start(Duration::from_secs(1), tx);
        drop(countdown);

        sleep(Duration::from_secs(5)).await;
        assert_eq!(drain(&mut rx), 0);
    }
}
