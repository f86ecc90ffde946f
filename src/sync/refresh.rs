/// 새로고침 표시기
/// 응답이 네트워크 지연보다 빨라도 깜빡이지 않도록 최소 표시 시간을 보장한다
// region:    --- Imports
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

// endregion: --- Imports

struct IndicatorInner {
    in_flight: Mutex<usize>,
    tx: watch::Sender<bool>,
    min_visible: Duration,
}

impl IndicatorInner {
    fn finish(&self) {
        let mut in_flight = self.in_flight.lock();
        *in_flight = in_flight.saturating_sub(1);
        if *in_flight == 0 {
            self.tx.send_replace(false);
        }
    }
}

#[derive(Clone)]
pub struct RefreshIndicator {
    inner: Arc<IndicatorInner>,
}

impl RefreshIndicator {
    pub fn new(min_visible: Duration) -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(IndicatorInner {
                in_flight: Mutex::new(0),
                tx,
                min_visible,
            }),
        }
    }

    /// 조회 시작. 가드가 drop 되면 최소 표시 시간 후 해제된다
    pub fn begin(&self) -> RefreshGuard {
        {
            let mut in_flight = self.inner.in_flight.lock();
            *in_flight += 1;
            if *in_flight == 1 {
                self.inner.tx.send_replace(true);
            }
        }
        RefreshGuard {
            inner: Arc::clone(&self.inner),
            started: Instant::now(),
        }
    }

    pub fn is_refreshing(&self) -> bool {
        *self.inner.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.inner.tx.subscribe()
    }
}

pub struct RefreshGuard {
    inner: Arc<IndicatorInner>,
    started: Instant,
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        let remaining = self.inner.min_visible.saturating_sub(self.started.elapsed());
        let inner = Arc::clone(&self.inner);
        if remaining.is_zero() {
            inner.finish();
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(remaining).await;
                    inner.finish();
                });
            }
            Err(_) => inner.finish(),
        }
    }
}
