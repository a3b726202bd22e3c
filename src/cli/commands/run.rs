//! `run` command handler.
//!
//! Drives one session from prompt to replay: launch, test day, decision,
//! evidence reveal, then the requested scrub positions.

use std::path::Path;
use std::sync::Arc;

use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::artifacts::{ArtifactGenerator, HttpArtifactGenerator, OfflineGenerator};
use crate::cli::args::{OutputFormat, RunArgs};
use crate::config::{DemoConfig, load_config};
use crate::error::{GenerationError, SessionError, TestDayError};
use crate::lookup::{
    HttpLookupProvider, LookupKind, LookupProvider, LookupRequest, OfflineLookupProvider,
    RealityCheck,
};
use crate::observability::{EventEmitter, StopReason};
use crate::session::{
    Action, DemoEngine, DemoSession, LaunchContext, MIN_PROMPT_CHARS, Phase, SessionMachine,
    SessionUpdate, prompt_length,
};
use crate::snapshot::SnapshotStore;
use crate::timeline::Schedule;
use crate::voice::{HttpVoiceSynthesizer, VoiceBriefer};

/// Run a complete demo session.
///
/// # Errors
///
/// Returns a config error for unusable configuration, a session error for
/// a prompt that cannot be launched, or a generation error when the
/// generator rejects the launch.
pub async fn run(args: &RunArgs, cancel: CancellationToken) -> Result<(), TestDayError> {
    if let Some(port) = args.metrics_port {
        crate::observability::init_metrics(Some(port))?;
        info!(port, "Prometheus metrics endpoint started");
    }

    let load_result = load_config(args.config.as_deref())?;
    for warning in &load_result.warnings {
        warn!(
            location = warning.location.as_deref().unwrap_or("<unknown>"),
            "{}",
            warning.message
        );
    }
    let config = load_result.config;

    let machine = SessionMachine::new(Schedule::standard(), config.driver()?, config.timing()?)
        .with_region_currencies(config.region_currencies())
        .with_industries(&config.industries)
        .with_replay_speeds(config.replay_speeds()?);
    let emitter = match args.events {
        Some(ref path) => EventEmitter::from_file(path)?,
        None => EventEmitter::noop(),
    };
    let mut engine = DemoEngine::new(machine, build_generator(&config, args.offline)?)
        .with_events(Arc::new(emitter));
    if let Some(path) = args.snapshot.as_ref().or(config.snapshot.path.as_ref()) {
        engine = engine.with_snapshots(SnapshotStore::new(path));
    }
    let engine = Arc::new(engine);
    engine.start();

    let result = match drive(&engine, args, &config, &cancel).await {
        Ok(true) => scrub_and_report(&engine, args).map(|()| true),
        other => other,
    };
    let reason = match &result {
        Ok(true) => StopReason::Completed,
        Ok(false) => StopReason::Interrupted,
        Err(_) => StopReason::Error,
    };
    engine.shutdown(reason);
    result.map(|_| ())
}

fn scrub_and_report(engine: &Arc<DemoEngine>, args: &RunArgs) -> Result<(), TestDayError> {
    for &target in &args.scrub {
        engine.dispatch(Action::Scrub(target))?;
        print_position(&engine.session(), args.format);
    }
    if args.format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&engine.session())?);
    } else {
        println!("{}", engine.summary());
    }
    Ok(())
}

/// Feeds the session until it reaches REPLAY. Returns `false` if cancelled.
async fn drive(
    engine: &Arc<DemoEngine>,
    args: &RunArgs,
    config: &DemoConfig,
    cancel: &CancellationToken,
) -> Result<bool, TestDayError> {
    let schedule = Schedule::standard();
    let length = prompt_length(&args.prompt);
    if length < MIN_PROMPT_CHARS {
        return Err(SessionError::PromptTooShort {
            length,
            minimum: MIN_PROMPT_CHARS,
        }
        .into());
    }
    engine.dispatch(Action::EditPrompt(args.prompt.clone()))?;
    engine.dispatch(Action::Launch(LaunchContext {
        locale: args
            .locale
            .clone()
            .unwrap_or_else(|| config.locale.default.clone()),
        mode: args.mode.into(),
        region_code: args.region.clone(),
        currency: None,
        industry_key: args.industry.clone(),
    }))?;

    loop {
        let update = tokio::select! {
            () = cancel.cancelled() => return Ok(false),
            update = engine.recv_update() => update,
        };
        let Some(update) = update else {
            return Ok(false);
        };
        match update {
            SessionUpdate::PhaseChanged {
                from: Phase::Launching,
                to: Phase::Typed,
            } => {
                let message = engine
                    .session()
                    .last_error()
                    .unwrap_or("generation failed")
                    .to_string();
                return Err(GenerationError::Rejected(message).into());
            }
            SessionUpdate::PhaseChanged {
                to: Phase::Artifacts,
                ..
            } => {
                let session = engine.session();
                if let Some(business) = session.business_data() {
                    report(args.format, &format!("launched {}", business.name));
                }
                if args.reality_check {
                    reality_check(config, args, session.session_id(), cancel).await?;
                }
                if let Some(ref path) = args.voice {
                    voice_briefing(config, &session, path).await?;
                }
                engine.dispatch(Action::RunTestDay)?;
            }
            SessionUpdate::PhaseChanged {
                to: Phase::Decision,
                ..
            } => {
                report(args.format, "decision point reached");
                engine.dispatch(Action::ChooseDecision(args.decision.into()))?;
            }
            SessionUpdate::PhaseChanged {
                to: Phase::Replay, ..
            } => {
                let outcome = engine
                    .session()
                    .decision_outcome()
                    .map_or("none", |o| o.as_str());
                report(args.format, &format!("run complete (decision: {outcome})"));
                return Ok(true);
            }
            SessionUpdate::EventEntered { index } => {
                if let Some(event) = schedule.get(index) {
                    report(args.format, &format!("{} checkpoint {index}", event.time));
                }
            }
            SessionUpdate::PhaseChanged { .. } | SessionUpdate::Scrubbed { .. } => {}
        }
    }
}

fn build_generator(
    config: &DemoConfig,
    offline: bool,
) -> Result<Arc<dyn ArtifactGenerator>, TestDayError> {
    if offline {
        return Ok(OfflineGenerator::new().shared());
    }
    match config.generator.endpoint("generator")? {
        Some(endpoint) => Ok(Arc::new(HttpArtifactGenerator::new(endpoint))),
        None => {
            warn!("no generator URL configured; using the offline generator");
            Ok(OfflineGenerator::new().shared())
        }
    }
}

async fn reality_check(
    config: &DemoConfig,
    args: &RunArgs,
    session_id: Uuid,
    cancel: &CancellationToken,
) -> Result<(), TestDayError> {
    let provider: Arc<dyn LookupProvider> = match config.lookup.service.endpoint("lookup")? {
        Some(endpoint) if !args.offline => Arc::new(HttpLookupProvider::new(endpoint)),
        _ => Arc::new(OfflineLookupProvider),
    };
    let service = RealityCheck::new(
        provider,
        config.lookup.limit_per_session,
        config.lookup.cache_ttl()?,
    );
    let request = LookupRequest {
        kind: LookupKind::Market,
        query: args.prompt.clone(),
        locale: args
            .locale
            .clone()
            .unwrap_or_else(|| config.locale.default.clone()),
        mode: args.mode.into(),
        sub_key: args.industry.clone(),
    };
    let outcome = tokio::select! {
        () = cancel.cancelled() => return Ok(()),
        outcome = service.check(session_id, &request) => outcome?,
    };
    match args.format {
        OutputFormat::Human => match outcome.report() {
            Some(report) => println!(
                "reality check: {} ({} left)",
                report.summary,
                outcome.remaining()
            ),
            None => println!("reality check: no checks left"),
        },
        OutputFormat::Json => println!("{}", json!({ "reality_check": outcome })),
    }
    Ok(())
}

async fn voice_briefing(
    config: &DemoConfig,
    session: &DemoSession,
    path: &Path,
) -> Result<(), TestDayError> {
    let Some(endpoint) = config.voice.endpoint("voice")? else {
        return Err(TestDayError::Usage(
            "--voice requires voice.url in the configuration".to_string(),
        ));
    };
    let Some(business) = session.business_data() else {
        return Ok(());
    };
    let locale = session
        .launch()
        .map_or(config.locale.default.as_str(), |l| l.locale.as_str());
    let briefer = VoiceBriefer::new(Arc::new(HttpVoiceSynthesizer::new(endpoint)));
    let briefing = briefer.brief(business, locale).await?;
    std::fs::write(path, &briefing.audio)?;
    info!(path = %path.display(), bytes = briefing.audio.len(), "voice briefing written");
    Ok(())
}

fn report(format: OutputFormat, line: &str) {
    match format {
        OutputFormat::Human => println!("{line}"),
        OutputFormat::Json => println!("{}", json!({ "message": line })),
    }
}

fn print_position(session: &DemoSession, format: OutputFormat) {
    let evidence: Vec<usize> = session.evidence_revealed().iter().collect();
    match format {
        OutputFormat::Human => println!(
            "at {:.2}%: event {} evidence {:?}",
            session.timeline_progress(),
            session.current_event_index(),
            evidence
        ),
        OutputFormat::Json => println!(
            "{}",
            json!({
                "progress": session.timeline_progress(),
                "event_index": session.current_event_index(),
                "evidence": evidence,
            })
        ),
    }
}
