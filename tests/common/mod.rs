//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Command, Output};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use testday::artifacts::{ArtifactGenerator, BusinessArtifacts, GenerationRequest};
use testday::error::GenerationError;
use testday::session::{Action, DemoEngine, LaunchContext, Phase, SessionMachine};

pub const PROMPT: &str = "Launch a cleaning business in Berlin";

/// Scripted generator standing in for the hosted service.
#[derive(Debug)]
pub struct MockGenerator {
    name: String,
    delay: Duration,
    fail: bool,
    calls: AtomicU64,
}

impl MockGenerator {
    pub fn succeeding(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            delay: Duration::from_millis(250),
            fail: false,
            calls: AtomicU64::new(0),
        })
    }

    pub fn slow(name: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            delay,
            fail: false,
            calls: AtomicU64::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            name: String::new(),
            delay: Duration::from_millis(50),
            fail: true,
            calls: AtomicU64::new(0),
        })
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArtifactGenerator for MockGenerator {
    async fn generate(
        &self,
        _request: &GenerationRequest,
    ) -> Result<BusinessArtifacts, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if self.fail {
            return Err(GenerationError::Rejected("service unavailable".to_string()));
        }
        Ok(BusinessArtifacts {
            name: self.name.clone(),
            ..BusinessArtifacts::default()
        })
    }
}

/// Engine around a fresh session, already started.
pub fn engine(generator: Arc<MockGenerator>) -> Arc<DemoEngine> {
    let engine = Arc::new(DemoEngine::new(SessionMachine::default(), generator));
    engine.start();
    engine
}

/// Types the standard prompt, launches, and waits for ARTIFACTS.
pub async fn launch(engine: &Arc<DemoEngine>) {
    engine
        .dispatch(Action::EditPrompt(PROMPT.to_string()))
        .unwrap();
    engine
        .dispatch(Action::Launch(LaunchContext::default()))
        .unwrap();
    engine.wait_for_phase(|p| p == Phase::Artifacts).await;
}

/// Runs a launched session to REPLAY with `decision`.
pub async fn run_to_replay(engine: &Arc<DemoEngine>, decision: testday::session::DecisionOutcome) {
    engine.dispatch(Action::RunTestDay).unwrap();
    engine.wait_for_phase(|p| p == Phase::Decision).await;
    engine.dispatch(Action::ChooseDecision(decision)).unwrap();
    engine.wait_for_phase(|p| p == Phase::Replay).await;
}

/// Path of a file under `tests/fixtures`.
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Runs the `testday` binary to completion.
pub fn spawn_command(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_testday"))
        .args(args)
        .env_remove("TESTDAY_CONFIG")
        .env_remove("TESTDAY_LOG_LEVEL")
        .env_remove("TESTDAY_SNAPSHOT")
        .env_remove("TESTDAY_STEP")
        .env_remove("TESTDAY_TICK_INTERVAL")
        .output()
        .expect("failed to run testday binary")
}
