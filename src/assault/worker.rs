use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

use bytes::Bytes;
use tokio::time::Instant;
use tower::{BoxError, Service};

use crate::{
    error::{AssaultError, LoadResult},
    interface::options::Options,
};

use super::{
    measure::recorder::Recorder,
    outcome::Outcome,
    script::Dashboard,
    shutdown::{ShutdownHandle, ShutdownListener},
};

/// Runs the configured load profile: spawns the virtual users and merges what they measured.
#[derive(Debug, Clone)]
pub struct Control<S> {
    client: S,
    quantile: Vec<f64>,
    shutdown: ShutdownHandle,
}

impl<S> Control<S>
where
    S: Service<http::Request<Bytes>, Response = http::Response<Bytes>> + Clone + Send + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send + 'static,
{
    pub fn new(client: S) -> Self {
        Self { client, quantile: Vec::new(), shutdown: ShutdownHandle::new() }
    }

    pub fn with_quantile<I: IntoIterator<Item = f64>>(self, quantile: I) -> Self {
        Self { quantile: quantile.into_iter().collect(), ..self }
    }

    pub fn shutdown_handle(&self) -> &ShutdownHandle {
        &self.shutdown
    }

    pub async fn assault(&self, options: Options) -> LoadResult<Outcome> {
        let execution = options.execution();
        let vus = execution.vus();
        if let Some(requested) = execution.vus.filter(|&requested| requested > vus) {
            tracing::warn!("vus {} is more than iterations {}, only {} vus will run", requested, vus, vus);
        }
        let budget = execution.iterations_budget().map(|b| Arc::new(IterationBudget::new(b)));

        let start = Instant::now();
        let deadline = execution.duration.map(|d| start + d);
        let graceful_deadline = deadline.map(|d| d + execution.graceful_stop());
        tracing::info!(
            "start {} vus, duration {:?}, iterations {:?}",
            vus,
            execution.duration,
            execution.iterations_budget()
        );

        let mut handles = Vec::new();
        for id in 0..vus {
            let vu = VirtualUser {
                id,
                dashboard: Dashboard::new(self.client.clone()),
                recorder: Recorder::new(self.quantile.iter().copied()).map_err(AssaultError::from)?,
                budget: budget.clone(),
                deadline,
                graceful_deadline,
                shutdown: self.shutdown.new_listener(),
            };
            handles.push(tokio::spawn(vu.run()));
        }

        let recorders = futures::future::try_join_all(handles).await.map_err(AssaultError::from)?;
        let mut recorder = Recorder::new(self.quantile.iter().copied()).map_err(AssaultError::from)?;
        for vu in &recorders {
            recorder.merge(vu);
        }
        let elapsed = start.elapsed();
        tracing::info!("finished in {:?}", elapsed);

        Ok(Outcome::new(options, recorder, vus, elapsed))
    }
}

/// Iterations left to share among all virtual users.
#[derive(Debug)]
pub struct IterationBudget {
    remaining: AtomicU64,
}
impl IterationBudget {
    pub fn new(total: u64) -> Self {
        Self { remaining: AtomicU64::new(total) }
    }

    pub fn acquire(&self) -> bool {
        self.remaining.fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1)).is_ok()
    }
}

struct VirtualUser<S> {
    id: u64,
    dashboard: Dashboard<S>,
    recorder: Recorder,
    budget: Option<Arc<IterationBudget>>,
    deadline: Option<Instant>,
    graceful_deadline: Option<Instant>,
    shutdown: ShutdownListener,
}

impl<S> VirtualUser<S>
where
    S: Service<http::Request<Bytes>, Response = http::Response<Bytes>>,
    S::Error: Into<BoxError>,
    S::Future: Send + 'static,
{
    async fn run(mut self) -> Recorder {
        tracing::debug!("vu {} started", self.id);
        loop {
            if self.shutdown.should_shutdown() || self.deadline.is_some_and(|d| Instant::now() >= d) {
                break;
            }
            if let Some(budget) = &self.budget {
                if !budget.acquire() {
                    break;
                }
            }

            let start = Instant::now();
            let completed = tokio::select! {
                () = self.dashboard.iterate(&mut self.recorder) => true,
                () = until(self.graceful_deadline) => false,
                () = self.shutdown.wait_for_shutdown() => false,
            };
            if completed {
                self.recorder.iteration(start.elapsed());
            } else {
                tracing::warn!("vu {} interrupted an iteration in flight", self.id);
                self.recorder.interrupted();
                break;
            }
        }
        tracing::debug!("vu {} stopped", self.id);
        self.recorder
    }
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::{
        convert::Infallible,
        sync::atomic::AtomicUsize,
        time::Duration,
    };

    use tower::{service_fn, util::BoxCloneService};

    use crate::assault::{
        measure::aggregate::Aggregator,
        script::{CHECK_NAME, TARGET_URL},
    };

    use super::*;

    fn counting(status: u16, latency: Duration, calls: Arc<AtomicUsize>) -> BoxCloneService<http::Request<Bytes>, http::Response<Bytes>, Infallible> {
        BoxCloneService::new(service_fn(move |req: http::Request<Bytes>| {
            let calls = calls.clone();
            async move {
                assert_eq!(req.uri(), TARGET_URL);
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(latency).await;
                Ok(http::Response::builder().status(status).body(Bytes::new()).unwrap())
            }
        }))
    }

    #[test]
    fn test_iteration_budget() {
        let budget = IterationBudget::new(2);
        assert!(budget.acquire());
        assert!(budget.acquire());
        assert!(!budget.acquire());
        assert!(!budget.acquire());
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_runs_single_iteration() {
        let calls = Arc::new(AtomicUsize::new(0));
        let control = Control::new(counting(200, Duration::ZERO, calls.clone()));
        let outcome = control.assault("{}".parse().unwrap()).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.vus, 1);
        assert_eq!(outcome.recorder.iterations.aggregate(), 1);
        assert_eq!(outcome.elapsed, Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shared_iterations() {
        let calls = Arc::new(AtomicUsize::new(0));
        let control = Control::new(counting(200, Duration::ZERO, calls.clone()));
        let outcome = control.assault(r#"{"vus": 3, "iterations": 7}"#.parse().unwrap()).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 7);
        assert_eq!(outcome.recorder.iterations.aggregate(), 7);
        assert_eq!(outcome.recorder.checks()[CHECK_NAME].passed(), 7);
        // 3 vus share 7 iterations of 1s each
        assert_eq!(outcome.elapsed, Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_vus_for_duration() {
        let calls = Arc::new(AtomicUsize::new(0));
        let control = Control::new(counting(200, Duration::from_millis(100), calls.clone()));
        let outcome = control.assault(r#"{"vus": 5, "duration": "10s"}"#.parse().unwrap()).await.unwrap();

        // every vu iterates each 1.1s: 0.0, 1.1, ..., 9.9 -> 10 iterations
        assert_eq!(calls.load(Ordering::SeqCst), 50);
        assert_eq!(outcome.recorder.iterations.aggregate(), 50);
        assert_eq!(outcome.recorder.interrupted.aggregate(), 0);
        assert_eq!(outcome.vus, 5);
        assert_eq!(outcome.elapsed, Duration::from_millis(11000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unavailable_endpoint_keeps_iterating() {
        let calls = Arc::new(AtomicUsize::new(0));
        let control = Control::new(counting(503, Duration::ZERO, calls.clone()));
        let outcome = control.assault(r#"{"vus": 1, "duration": "3s"}"#.parse().unwrap()).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let check = &outcome.recorder.checks()[CHECK_NAME];
        assert_eq!((check.passed(), check.count()), (0, 3));
        assert_eq!(outcome.recorder.iterations.aggregate(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_graceful_stop_interrupts_slow_iteration() {
        let calls = Arc::new(AtomicUsize::new(0));
        let control = Control::new(counting(200, Duration::from_secs(50), calls.clone()));
        let outcome =
            control.assault(r#"{"vus": 1, "duration": "1s", "gracefulStop": "5s"}"#.parse().unwrap()).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.recorder.iterations.aggregate(), 0);
        assert_eq!(outcome.recorder.interrupted.aggregate(), 1);
        assert_eq!(outcome.elapsed, Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_interrupts_vus() {
        let calls = Arc::new(AtomicUsize::new(0));
        let control = Control::new(counting(200, Duration::ZERO, calls.clone()));
        let handle = control.shutdown_handle().clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            handle.shutdown();
        });
        let outcome = control.assault(r#"{"vus": 2, "duration": "1h"}"#.parse().unwrap()).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 6);
        assert_eq!(outcome.recorder.iterations.aggregate(), 4);
        assert_eq!(outcome.recorder.interrupted.aggregate(), 2);
        assert_eq!(outcome.elapsed, Duration::from_millis(2500));
    }
}
