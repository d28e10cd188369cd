use chrono::{Duration, TimeZone, Utc};
use log::{info, warn};
use tokio::runtime::Builder;

use crate::config::Config;
use crate::filtration::FiltrationEngine;
use crate::filtration::events::{EventSink, LogEventSink};
use crate::filtration::handle::EngineHandle;
use crate::io::commands::EngineCommand;
use crate::io::dummy::DummyIO;
use crate::io::dummy_io_bundle::new_dummy_io;
use crate::io::recommendation::dummy::{Dummy, ModifyState};
use crate::io::recommendation::{ModeHint, Recommendation, RecommendationSource};
use crate::time_util::mytime::{DummyTimeProvider, TimeProvider};

const SIMULATION_CONFIG: &str = r#"
[pool]
id = "simulated"
title = "Simulated Pool"

[filtration]
switch_reference = "switch.simulated_pump"

[filtration.summer]
enabled = true
min_duration = 120
max_duration = 720
catch_up_last_slot = true
slot1 = { name = "Morning", start_time = "06:00:00", duration_percent = 50 }
slot2 = { name = "Evening", start_time = "18:00:00", duration_percent = 50 }
"#;

/// Run one summer day against dummy IO in five minute steps, logging everything the engine does.
pub fn simulate() {
    let config = Config::parse(SIMULATION_CONFIG).expect("Simulation config should be valid");
    let (mut io_bundle, io_handle) = new_dummy_io();
    let (recommendations, recommendation_handle) = Dummy::create(&());

    let engine = FiltrationEngine::new(Utc, config.get_pool().clone(), config.get_filtration().clone(), Duration::hours(12))
        .expect("Simulation config should be valid");
    let handle = EngineHandle::new(engine);

    let rt = Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("Expected to be able to make runtime");

    let start = Utc
        .with_ymd_and_hms(2024, 6, 1, 0, 0, 0)
        .single()
        .expect("Start of simulation should be a valid time");
    let mut time_provider = DummyTimeProvider::new(start);
    let mut log_sink = LogEventSink::default();

    recommendation_handle
        .send(ModifyState::Set(Recommendation::new(300, ModeHint::Standard, start, true)))
        .expect("Recommendation source should be listening");

    let step = Duration::minutes(5);
    while time_provider.get_utc_time() < start + Duration::days(1) {
        let now = time_provider.get_utc_time();
        let since_start = now - start;

        if since_start == Duration::hours(7) {
            info!("Pump goes unreachable for a while");
            io_handle.pump().set_failing(true);
        }
        if since_start == Duration::minutes(7 * 60 + 20) {
            io_handle.pump().set_failing(false);
        }
        if since_start == Duration::hours(12) {
            recommendation_handle
                .send(ModifyState::Set(Recommendation::new(420, ModeHint::Standard, now, true)))
                .expect("Recommendation source should be listening");
        }
        if since_start == Duration::hours(13) {
            let command = EngineCommand::ActivateBoost { duration: "2H".to_owned() };
            match handle.apply(&command, now) {
                Ok(outcome) => info!("{}", outcome),
                Err(e) => warn!("Boost rejected: {}", e),
            }
        }

        match rt.block_on(recommendations.latest()) {
            Ok(recommendation) => handle.accept_recommendation(recommendation),
            Err(e) => warn!("{}", e),
        }
        let state = handle.tick(now, &mut io_bundle);
        for event in io_handle.take_events() {
            log_sink.publish(event);
        }
        if !state.is_actuation_healthy() {
            warn!("Pump not following the engine at {}", now);
        }

        time_provider.advance(step);
    }

    let state = handle.snapshot();
    info!(
        "Simulated day done: {} of {} minutes ({}%), {} pump commands",
        state.get_elapsed_minutes_today(),
        state.get_objective_minutes_today(),
        state.get_elapsed_percent(),
        io_handle.pump_state().get_applied().len()
    );
}
