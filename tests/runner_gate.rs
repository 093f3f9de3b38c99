// tests/runner_gate.rs
//
// At most one run in flight; busy triggers are rejected, not queued.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ainews::analyze::Capabilities;
use ainews::config::AppConfig;
use ainews::ingest::types::{Article, SourceAdapter, SourceDescriptor, SourceError, SourceKind};
use ainews::pipeline::Pipeline;
use ainews::runner::{RunController, RunError, RunState, TriggerOutcome};
use ainews::store::MemoryStore;
use async_trait::async_trait;

struct Slow {
    desc: SourceDescriptor,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl SourceAdapter for Slow {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.desc
    }
    async fn fetch_latest(&self) -> Result<Vec<Article>, SourceError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        Ok(vec![Article::new(
            &self.desc.name,
            &format!("Slow story number {n}"),
            &format!("https://slow.test/{n}"),
        )])
    }
}

/// Blows up on the first fetch, behaves afterwards.
struct Flaky {
    desc: SourceDescriptor,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl SourceAdapter for Flaky {
    fn descriptor(&self) -> &SourceDescriptor {
        &self.desc
    }
    async fn fetch_latest(&self) -> Result<Vec<Article>, SourceError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("adapter exploded");
        }
        Ok(vec![Article::new(
            &self.desc.name,
            "Flaky source recovered",
            "https://flaky.test/1",
        )])
    }
}

fn desc(name: &str) -> SourceDescriptor {
    SourceDescriptor {
        name: name.into(),
        url: format!("https://{}.test/rss", name.to_lowercase()),
        kind: SourceKind::Rss,
        weight: 0.2,
    }
}

fn controller(delay: Duration, calls: Arc<AtomicUsize>) -> Arc<RunController> {
    let slow = Slow {
        desc: desc("Slow"),
        delay,
        calls,
    };
    controller_with(Box::new(slow))
}

fn controller_with(source: Box<dyn SourceAdapter>) -> Arc<RunController> {
    let mut cfg = AppConfig::default();
    cfg.processing.summarization.translate_to_chinese = false;
    let sources: Vec<Box<dyn SourceAdapter>> = vec![source];
    let p = Pipeline::from_config(
        &cfg,
        Arc::new(MemoryStore::new()),
        &Capabilities::none(),
        Some(sources),
    );
    RunController::new(Arc::new(p))
}

async fn wait_until_done(c: &RunController) {
    for _ in 0..200 {
        if !c.is_running() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("run did not finish in time");
}

#[tokio::test]
async fn concurrent_triggers_start_one_run() {
    let calls = Arc::new(AtomicUsize::new(0));
    let c = controller(Duration::from_millis(200), calls.clone());
    assert_eq!(c.status().status, RunState::Idle);

    assert_eq!(c.trigger_run(), TriggerOutcome::Accepted);
    for _ in 0..5 {
        assert_eq!(c.trigger_run(), TriggerOutcome::Busy);
    }
    assert!(matches!(c.run_now().await, Err(RunError::Busy)));

    let s = c.status();
    assert_eq!(s.status, RunState::Running);
    assert!(s.last_run.is_some());

    wait_until_done(&c).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let s = c.status();
    assert_eq!(s.status, RunState::Completed);
    assert_eq!(s.saved_count, 1);
    assert!(s.error.is_none());
}

#[tokio::test]
async fn gate_reopens_after_completion() {
    let calls = Arc::new(AtomicUsize::new(0));
    let c = controller(Duration::from_millis(1), calls.clone());

    let first = c.run_now().await.expect("first run");
    assert_eq!(first.saved, 1);
    assert_eq!(c.trigger_run(), TriggerOutcome::Accepted);
    wait_until_done(&c).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(c.status().status, RunState::Completed);
}

#[tokio::test]
async fn panicking_run_is_recorded_as_failed_and_releases_the_gate() {
    let calls = Arc::new(AtomicUsize::new(0));
    let c = controller_with(Box::new(Flaky {
        desc: desc("Flaky"),
        calls: calls.clone(),
    }));

    assert_eq!(c.trigger_run(), TriggerOutcome::Accepted);
    wait_until_done(&c).await;
    let s = c.status();
    assert_eq!(s.status, RunState::Failed);
    assert!(s.error.as_deref().unwrap_or("").contains("adapter exploded"));

    let report = c.run_now().await.expect("gate reopened");
    assert_eq!(report.saved, 1);
    assert_eq!(c.status().status, RunState::Completed);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}
