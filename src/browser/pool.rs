use crate::browser::session::with_timeout;
use crate::browser::{BrowserError, BrowserLauncher, BrowserProcess, SessionHandle};
use crate::config::BrowserSettings;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Snapshot of pool lifecycle counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    pub launched: u64,
    pub reused: u64,
    pub retired_by_budget: u64,
    pub recycled_after_error: u64,
    pub health_failures: u64,
}

#[derive(Default)]
struct PoolCounters {
    launched: AtomicU64,
    reused: AtomicU64,
    retired_by_budget: AtomicU64,
    recycled_after_error: AtomicU64,
    health_failures: AtomicU64,
}

struct IdleProcess {
    id: u64,
    uses: u32,
    process: Box<dyn BrowserProcess>,
}

/// Owns the lifecycle of headless browser processes
///
/// At most `worker-count` handles are lent out at any time. Released healthy
/// processes are kept idle and handed to the next caller. A process is retired
/// once its usage budget is spent or it stops answering.
pub struct BrowserSessionPool {
    launcher: Arc<dyn BrowserLauncher>,
    settings: BrowserSettings,
    step_timeout: Duration,
    permits: Arc<Semaphore>,
    idle: Mutex<Vec<IdleProcess>>,
    next_id: AtomicU64,
    counters: PoolCounters,
}

impl BrowserSessionPool {
    /// Creates a new pool
    ///
    /// # Arguments
    ///
    /// * `launcher` - Starts new browser processes
    /// * `settings` - Usage budget, health-check timeout and recycle cooldown
    /// * `size` - Maximum number of handles lent out concurrently
    /// * `step_timeout` - Deadline for every operation issued through a handle
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        settings: BrowserSettings,
        size: usize,
        step_timeout: Duration,
    ) -> Self {
        Self {
            launcher,
            settings,
            step_timeout,
            permits: Arc::new(Semaphore::new(size.max(1))),
            idle: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
            counters: PoolCounters::default(),
        }
    }

    /// Waits for a free slot and returns a ready session
    ///
    /// An idle process is reused when it passes the health probe, otherwise a
    /// new one is launched. Launch failure is fatal for the run.
    pub async fn acquire(&self) -> Result<SessionHandle, BrowserError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| BrowserError::PoolClosed)?;

        let reused = self.idle.lock().ok().and_then(|mut idle| idle.pop());
        let Some(idle) = reused else {
            return self.launch(permit).await;
        };

        let mut handle =
            SessionHandle::new(idle.id, idle.uses, self.step_timeout, idle.process, permit);
        if self.is_healthy(&mut handle).await {
            self.counters.reused.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("Reusing browser session {} ({} uses)", handle.id(), handle.uses());
            return Ok(handle);
        }

        // Dead idle process: replace it without the cooldown
        let (_, _, mut process, permit) = handle.into_parts();
        process.shutdown().await;
        self.launch(permit).await
    }

    /// Returns a session to the pool
    ///
    /// Healthy sessions with budget left go to the idle list; others are shut down.
    pub async fn release(&self, handle: SessionHandle) {
        let keep = handle.is_marked_healthy()
            && handle.uses() < self.settings.max_uses_per_session;
        let (id, uses, mut process, permit) = handle.into_parts();

        if keep {
            if let Ok(mut idle) = self.idle.lock() {
                idle.push(IdleProcess { id, uses, process });
                drop(permit);
                return;
            }
        }

        tracing::debug!("Retiring browser session {} after {} uses", id, uses);
        process.shutdown().await;
        drop(permit);
    }

    /// Replaces the session if its budget is spent or it was marked unhealthy
    pub async fn recycle_if_needed(
        &self,
        handle: SessionHandle,
    ) -> Result<SessionHandle, BrowserError> {
        if !handle.is_marked_healthy() {
            return self.recycle(handle).await;
        }

        if handle.uses() >= self.settings.max_uses_per_session {
            tracing::info!(
                "Browser session {} reached {} uses, restarting",
                handle.id(),
                handle.uses()
            );
            self.counters
                .retired_by_budget
                .fetch_add(1, Ordering::Relaxed);
            return self.replace(handle).await;
        }

        Ok(handle)
    }

    /// Probes the session with a blank-page navigation
    ///
    /// A failed or slow probe marks the handle unhealthy.
    pub async fn is_healthy(&self, handle: &mut SessionHandle) -> bool {
        if !handle.is_marked_healthy() {
            return false;
        }

        let timeout = self.settings.health_check_timeout();
        let result = with_timeout(
            "health check",
            timeout,
            handle.process_mut().navigate("about:blank"),
        )
        .await;

        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Browser session {} failed health check: {}", handle.id(), e);
                self.counters
                    .health_failures
                    .fetch_add(1, Ordering::Relaxed);
                handle.mark_unhealthy();
                false
            }
        }
    }

    /// Tears the session down and launches a replacement after the cooldown
    ///
    /// Used after transport errors. The returned handle has a new id.
    pub async fn recycle(&self, handle: SessionHandle) -> Result<SessionHandle, BrowserError> {
        tracing::warn!("Recycling browser session {}", handle.id());
        self.counters
            .recycled_after_error
            .fetch_add(1, Ordering::Relaxed);
        self.replace(handle).await
    }

    /// Shuts down every idle process and refuses further acquisitions
    pub async fn shutdown(&self) {
        self.permits.close();
        let idle: Vec<IdleProcess> = match self.idle.lock() {
            Ok(mut idle) => idle.drain(..).collect(),
            Err(_) => Vec::new(),
        };
        for mut entry in idle {
            entry.process.shutdown().await;
        }
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            launched: self.counters.launched.load(Ordering::Relaxed),
            reused: self.counters.reused.load(Ordering::Relaxed),
            retired_by_budget: self.counters.retired_by_budget.load(Ordering::Relaxed),
            recycled_after_error: self.counters.recycled_after_error.load(Ordering::Relaxed),
            health_failures: self.counters.health_failures.load(Ordering::Relaxed),
        }
    }

    async fn replace(&self, handle: SessionHandle) -> Result<SessionHandle, BrowserError> {
        let (_, _, mut process, permit) = handle.into_parts();
        process.shutdown().await;

        let cooldown = self.settings.recycle_cooldown();
        if !cooldown.is_zero() {
            tokio::time::sleep(cooldown).await;
        }

        self.launch(permit).await
    }

    async fn launch(&self, permit: OwnedSemaphorePermit) -> Result<SessionHandle, BrowserError> {
        let timeout = self.settings.launch_timeout();
        let process = match tokio::time::timeout(timeout, self.launcher.launch()).await {
            Ok(Ok(process)) => process,
            Ok(Err(e)) => return Err(BrowserError::Launch(e.to_string())),
            Err(_) => {
                return Err(BrowserError::Launch(format!(
                    "browser did not start within {}ms",
                    timeout.as_millis()
                )))
            }
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.counters.launched.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("Launched browser session {}", id);

        Ok(SessionHandle::new(id, 0, self.step_timeout, process, permit))
    }
}
