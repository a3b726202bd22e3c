mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{MockGenerator, PROMPT, engine, launch, run_to_replay};
use testday::observability::{EventEmitter, StopReason};
use testday::session::{
    Action, DecisionOutcome, DemoEngine, LaunchContext, Phase, SessionMachine, SessionUpdate,
};
use testday::timeline::EvidenceSet;

#[tokio::test(start_paused = true)]
async fn prompt_launch_reaches_artifacts() {
    let generator = MockGenerator::succeeding("CleanCo");
    let engine = engine(generator.clone());

    engine
        .dispatch(Action::EditPrompt(PROMPT.to_string()))
        .unwrap();
    assert_eq!(engine.phase(), Phase::Typed);

    engine
        .dispatch(Action::Launch(LaunchContext::default()))
        .unwrap();
    assert_eq!(engine.phase(), Phase::Launching);

    engine.wait_for_phase(|p| p == Phase::Artifacts).await;
    let session = engine.session();
    assert_eq!(session.business_data().unwrap().name, "CleanCo");
    assert_eq!(generator.calls(), 1);
    engine.shutdown(StopReason::Completed);
}

#[tokio::test(start_paused = true)]
async fn run_pauses_at_decision_and_resumes_from_it() {
    let engine = engine(MockGenerator::succeeding("CleanCo"));
    launch(&engine).await;

    engine.dispatch(Action::RunTestDay).unwrap();
    engine.wait_for_phase(|p| p == Phase::Decision).await;
    let paused = engine.session();
    assert!((paused.timeline_progress() - 81.25).abs() < f64::EPSILON);
    assert!(paused.decision_outcome().is_none());

    // No ticks while waiting for the decision.
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(engine.phase(), Phase::Decision);
    assert!((engine.session().timeline_progress() - 81.25).abs() < f64::EPSILON);

    engine
        .dispatch(Action::ChooseDecision(DecisionOutcome::Deny))
        .unwrap();
    engine.wait_for_phase(|p| p == Phase::Running).await;
    let resumed = engine.session();
    assert_eq!(resumed.decision_outcome(), Some(DecisionOutcome::Deny));
    assert!(resumed.timeline_progress() >= 81.25);
    assert!(resumed.timeline_progress() < 87.5);
    engine.shutdown(StopReason::Completed);
}

#[tokio::test(start_paused = true)]
async fn run_completes_into_replay_with_all_evidence() {
    let engine = engine(MockGenerator::succeeding("CleanCo"));
    launch(&engine).await;
    engine.dispatch(Action::RunTestDay).unwrap();
    engine.wait_for_phase(|p| p == Phase::Decision).await;
    engine
        .dispatch(Action::ChooseDecision(DecisionOutcome::Approve))
        .unwrap();

    engine.wait_for_phase(|p| p == Phase::Evidence).await;
    assert!((engine.session().timeline_progress() - 100.0).abs() < f64::EPSILON);

    engine.wait_for_phase(|p| p == Phase::Replay).await;
    let session = engine.session();
    assert_eq!(session.evidence_revealed(), EvidenceSet::all());
    assert_eq!(session.decision_outcome(), Some(DecisionOutcome::Approve));
    assert_eq!(engine.summary().runs_completed, 1);
    engine.shutdown(StopReason::Completed);
}

#[tokio::test(start_paused = true)]
async fn scrubbing_recomputes_evidence() {
    let engine = engine(MockGenerator::succeeding("CleanCo"));
    launch(&engine).await;
    run_to_replay(&engine, DecisionOutcome::Deny).await;

    engine.dispatch(Action::Scrub(90.0)).unwrap();
    let at_90 = engine.session().evidence_revealed();
    assert!(at_90.contains(0));
    assert!(!at_90.contains(2));

    engine.dispatch(Action::Scrub(40.0)).unwrap();
    assert!(engine.session().evidence_revealed().is_empty());

    engine.dispatch(Action::Scrub(95.0)).unwrap();
    let first = engine.session().evidence_revealed();
    engine.dispatch(Action::Scrub(50.0)).unwrap();
    engine.dispatch(Action::Scrub(95.0)).unwrap();
    assert_eq!(engine.session().evidence_revealed(), first);
    engine.shutdown(StopReason::Completed);
}

#[tokio::test(start_paused = true)]
async fn playback_advances_to_the_end_and_stops() {
    let engine = engine(MockGenerator::succeeding("CleanCo"));
    launch(&engine).await;
    run_to_replay(&engine, DecisionOutcome::Photo).await;

    engine.dispatch(Action::Scrub(90.0)).unwrap();
    engine.dispatch(Action::Play).unwrap();
    assert!(engine.session().replay().playing);

    tokio::time::sleep(Duration::from_secs(10)).await;
    let session = engine.session();
    assert!((session.timeline_progress() - 100.0).abs() < f64::EPSILON);
    assert!(!session.replay().playing);
    assert_eq!(session.phase(), Phase::Replay);
    engine.shutdown(StopReason::Completed);
}

#[tokio::test(start_paused = true)]
async fn run_again_starts_a_fresh_run() {
    let engine = engine(MockGenerator::succeeding("CleanCo"));
    launch(&engine).await;
    run_to_replay(&engine, DecisionOutcome::Deny).await;
    let first_run = engine.session().run_id();

    engine.dispatch(Action::RunAgain).unwrap();
    let session = engine.session();
    assert_eq!(session.phase(), Phase::Running);
    assert!(session.run_id() > first_run);
    assert!(session.timeline_progress().abs() < f64::EPSILON);
    assert!(session.decision_outcome().is_none());
    assert!(session.evidence_revealed().is_empty());
    assert_eq!(session.business_data().unwrap().name, "CleanCo");

    engine.wait_for_phase(|p| p == Phase::Decision).await;
    engine.shutdown(StopReason::Completed);
}

#[tokio::test(start_paused = true)]
async fn concurrent_launches_call_the_generator_once() {
    let generator = MockGenerator::succeeding("CleanCo");
    let engine = engine(generator.clone());
    engine
        .dispatch(Action::EditPrompt(PROMPT.to_string()))
        .unwrap();

    let a = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.dispatch(Action::Launch(LaunchContext::default())) })
    };
    let b = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move { engine.dispatch(Action::Launch(LaunchContext::default())) })
    };
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    engine.wait_for_phase(|p| p == Phase::Artifacts).await;
    assert_eq!(generator.calls(), 1);
    engine.shutdown(StopReason::Completed);
}

#[tokio::test(start_paused = true)]
async fn start_over_discards_pending_generation() {
    let generator = MockGenerator::slow("CleanCo", Duration::from_secs(5));
    let engine = engine(generator.clone());
    engine
        .dispatch(Action::EditPrompt(PROMPT.to_string()))
        .unwrap();
    engine
        .dispatch(Action::Launch(LaunchContext::default()))
        .unwrap();
    let old_session = engine.session().session_id();

    engine.dispatch(Action::StartOver).unwrap();
    let fresh = engine.session();
    assert_eq!(fresh.phase(), Phase::Empty);
    assert_ne!(fresh.session_id(), old_session);

    tokio::time::sleep(Duration::from_secs(10)).await;
    let session = engine.session();
    assert_eq!(session.phase(), Phase::Empty);
    assert!(session.business_data().is_none());
    assert_eq!(generator.calls(), 1);
    engine.shutdown(StopReason::Completed);
}

#[tokio::test(start_paused = true)]
async fn failed_generation_returns_to_typed_with_error() {
    let engine = engine(MockGenerator::failing());
    engine
        .dispatch(Action::EditPrompt(PROMPT.to_string()))
        .unwrap();
    engine
        .dispatch(Action::Launch(LaunchContext {
            locale: "de".to_string(),
            ..LaunchContext::default()
        }))
        .unwrap();

    engine
        .wait_for_phase(|p| p == Phase::Typed)
        .await
        .unwrap();
    let session = engine.session();
    assert!(session.last_error().is_some());
    assert_eq!(session.prompt(), PROMPT);
    assert!(!session.generation_in_flight());
    engine.shutdown(StopReason::Completed);
}

#[tokio::test(start_paused = true)]
async fn start_over_mid_run_stops_the_ticker() {
    let engine = engine(MockGenerator::succeeding("CleanCo"));
    launch(&engine).await;
    engine.dispatch(Action::RunTestDay).unwrap();
    tokio::time::sleep(Duration::from_secs(3)).await;
    assert!(engine.session().timeline_progress() > 0.0);

    engine.dispatch(Action::StartOver).unwrap();
    tokio::time::sleep(Duration::from_secs(30)).await;
    let session = engine.session();
    assert_eq!(session.phase(), Phase::Empty);
    assert!(session.timeline_progress().abs() < f64::EPSILON);
    engine.shutdown(StopReason::Completed);
}

#[tokio::test(start_paused = true)]
async fn updates_report_live_events_in_order() {
    let engine = engine(MockGenerator::succeeding("CleanCo"));
    launch(&engine).await;
    engine.dispatch(Action::RunTestDay).unwrap();
    engine.wait_for_phase(|p| p == Phase::Decision).await;

    let mut entered = Vec::new();
    while let Ok(Some(update)) =
        tokio::time::timeout(Duration::from_millis(1), engine.recv_update()).await
    {
        if let SessionUpdate::EventEntered { index } = update {
            entered.push(index);
        }
    }
    assert_eq!(entered, vec![1, 2, 3, 4, 5, 6, 7]);
    engine.shutdown(StopReason::Completed);
}

#[tokio::test(start_paused = true)]
async fn event_stream_records_the_session() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("events.jsonl");
    let emitter = Arc::new(EventEmitter::from_file(&path).unwrap());
    let engine = Arc::new(
        DemoEngine::new(
            SessionMachine::default(),
            MockGenerator::succeeding("CleanCo"),
        )
        .with_events(emitter),
    );
    engine.start();
    launch(&engine).await;
    run_to_replay(&engine, DecisionOutcome::Approve).await;
    engine.shutdown(StopReason::Completed);

    let content = std::fs::read_to_string(&path).unwrap();
    let events: Vec<serde_json::Value> = content
        .lines()
        .map(|l| serde_json::from_str(l).expect("invalid JSONL line"))
        .collect();
    let types: Vec<&str> = events
        .iter()
        .filter_map(|e| e.get("type").and_then(serde_json::Value::as_str))
        .collect();

    assert_eq!(types.first(), Some(&"SessionStarted"));
    assert_eq!(types.last(), Some(&"SessionStopped"));
    assert!(types.contains(&"GenerationRequested"));
    assert!(types.contains(&"DecisionMade"));
    assert!(types.contains(&"RunCompleted"));
    for (i, event) in events.iter().enumerate() {
        assert_eq!(event["sequence"], i as u64);
    }
}
