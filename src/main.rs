use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Local;
use log::{debug, error, info, warn};
use tokio::runtime::Builder;
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tracing::Subscriber;
use tracing_subscriber::EnvFilter;

use crate::config::{Config, FiltrationConfig};
use crate::filtration::FiltrationEngine;
use crate::filtration::checkpoint;
use crate::filtration::events::LogEventSink;
use crate::filtration::handle::EngineHandle;
use crate::io::IOBundle;
use crate::io::commands::CommandSource;
use crate::io::commands::file::FileCommandSource;
use crate::io::controls::file_switch::FileSwitch;
use crate::io::recommendation::RecommendationSource;
use crate::io::recommendation::file::FileRecommendationSource;
use crate::logging::LoggingHandle;
use crate::time_util::mytime::{RealTimeProvider, TimeProvider};

mod config;
mod filtration;
mod io;
mod logging;
mod simulate;
mod time_util;

const CONFIG_FILE: &str = "pool_filtration.toml";

fn main() {
    let logging_handle = logging::init_logging().expect("Failed to initialise logging");

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|arg| arg == "--simulate") {
        simulate::simulate();
        return;
    }

    let config_path = args
        .get(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE));
    info!("Reading configuration from {:?}", config_path);
    let config = Config::read_from(&config_path)
        .unwrap_or_else(|e| panic!("Unable to load configuration from {:?}: {}", config_path, e));

    let rt = Builder::new_multi_thread()
        .worker_threads(2)
        .enable_time()
        .enable_io()
        .build()
        .expect("Expected to be able to make runtime");

    let engine = FiltrationEngine::new(
        Local,
        config.get_pool().clone(),
        config.get_filtration().clone(),
        config.get_daemon().get_max_recommendation_age(),
    )
    .expect("Configuration was validated when loaded");
    let handle = EngineHandle::new(engine);
    let time_provider = RealTimeProvider::default();

    if let Some(path) = config.get_daemon().get_checkpoint_file() {
        match rt.block_on(checkpoint::load(path)) {
            Ok(Some(checkpoint)) => handle.restore(checkpoint, time_provider.get_utc_time()),
            Ok(None) => {}
            Err(e) => warn!("Ignoring unreadable checkpoint {:?}: {}", path, e),
        }
    }

    let io_bundle = IOBundle::new(file_switch(&config, config.get_filtration()), LogEventSink::default());

    let stop = Arc::new(StopSignal::default());
    {
        let stop = stop.clone();
        ctrlc::set_handler(move || {
            println!("Received termination signal.");
            stop.trigger();
        })
        .expect("Failed to attach kill handler.");
    }

    rt.block_on(main_loop(handle, io_bundle, config, &config_path, &time_provider, &logging_handle, &stop));
    info!("Stopped safely.");
}

#[derive(Default)]
struct StopSignal {
    should_exit: AtomicBool,
    notify: Notify,
}

impl StopSignal {
    fn trigger(&self) {
        self.should_exit.store(true, Ordering::Relaxed);
        self.notify.notify_one();
    }

    fn is_triggered(&self) -> bool {
        self.should_exit.load(Ordering::Relaxed)
    }
}

async fn main_loop(
    handle: EngineHandle<Local>,
    mut io_bundle: IOBundle,
    config: Config,
    config_path: &Path,
    time_provider: &impl TimeProvider,
    logging_handle: &LoggingHandle<EnvFilter, impl Subscriber>,
    stop: &StopSignal,
) {
    let daemon = config.get_daemon();
    let recommendations =
        FileRecommendationSource::new(daemon.get_recommendation_file().clone(), config.get_pool().get_id().to_owned());
    let commands = FileCommandSource::new(daemon.get_command_file().clone());

    let mut interval = tokio::time::interval(*daemon.get_tick_interval());
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut hangups = Hangups::new();

    let mut switch_reference = config.get_filtration().get_switch_reference().map(str::to_owned);

    info!("Beginning main loop, ticking every {:?}.", daemon.get_tick_interval());
    loop {
        tokio::select! {
            _ = interval.tick() => {},
            _ = hangups.recv() => {
                if let Some(filtration) = reload(&handle, config_path, logging_handle) {
                    let new_reference = filtration.get_switch_reference().map(str::to_owned);
                    if new_reference != switch_reference {
                        info!("Switch reference changed from {:?} to {:?}", switch_reference, new_reference);
                        handle.replace_pump(&mut io_bundle, file_switch(&config, &filtration));
                        switch_reference = new_reference;
                    }
                }
            },
            _ = stop.notify.notified() => {},
        }

        if stop.is_triggered() {
            info!("Stopping safely...");
            handle.shutdown(&mut io_bundle);
            save_checkpoint(&handle, daemon.get_checkpoint_file(), time_provider).await;
            return;
        }

        let now = time_provider.get_utc_time();
        match recommendations.latest().await {
            Ok(recommendation) => handle.accept_recommendation(recommendation),
            Err(e) => warn!("No recommendation available: {}", e),
        }

        for command in commands.take_commands().await {
            match handle.apply(&command, now) {
                Ok(outcome) => info!("Applied {:?}: {}", command, outcome),
                Err(e) => warn!("Rejected {:?}: {}", command, e),
            }
        }

        let state = handle.tick(now, &mut io_bundle);
        debug!(
            "{} {} / {}: pump {}, {} of {} minutes",
            time_provider.get_local_time(&Local).format("%H:%M"),
            state.get_mode(),
            state.get_phase(),
            if state.is_desired_pump_on() { "on" } else { "off" },
            state.get_elapsed_minutes_today(),
            state.get_objective_minutes_today()
        );

        if let Some(path) = daemon.get_state_file() {
            if let Err(e) = checkpoint::save_state(path, &state).await {
                error!("Failed to publish state to {:?}: {}", path, e);
            }
        }
        save_checkpoint(&handle, daemon.get_checkpoint_file(), time_provider).await;
    }
}

async fn save_checkpoint(handle: &EngineHandle<Local>, path: Option<&PathBuf>, time_provider: &impl TimeProvider) {
    if let Some(path) = path {
        if let Err(e) = checkpoint::save(path, &handle.checkpoint(time_provider.get_utc_time())).await {
            error!("Failed to write checkpoint {:?}: {}", path, e);
        }
    }
}

/// The pump actuator for the configured switch reference. The switch file itself is a daemon setting.
fn file_switch(config: &Config, filtration: &FiltrationConfig) -> FileSwitch {
    FileSwitch::new(
        config.get_daemon().get_switch_file().clone(),
        filtration.get_switch_reference().unwrap_or_default().to_owned(),
    )
}

/// Re-read the filtration settings and the log filter, returning the settings now in force
/// if they were accepted. Daemon settings need a restart.
fn reload(
    handle: &EngineHandle<Local>,
    config_path: &Path,
    logging_handle: &LoggingHandle<EnvFilter, impl Subscriber>,
) -> Option<FiltrationConfig> {
    info!("Reloading configuration from {:?}", config_path);
    let accepted = match Config::read_from(config_path) {
        Ok(config) => match handle.reconfigure(config.get_filtration().clone()) {
            Ok(()) => {
                info!("Configuration reloaded");
                Some(config.get_filtration().clone())
            }
            Err(e) => {
                error!("Keeping the previous configuration: {}", e);
                None
            }
        },
        Err(e) => {
            error!("Keeping the previous configuration: {}", e);
            None
        }
    };
    match logging::reload_log_level(logging_handle) {
        Ok(filter) => info!("Log filter is now {}", filter),
        Err(e) => warn!("Keeping the previous log filter: {}", e),
    }
    accepted
}

#[cfg(unix)]
struct Hangups {
    signal: Option<tokio::signal::unix::Signal>,
}

#[cfg(unix)]
impl Hangups {
    fn new() -> Self {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::hangup()) {
            Ok(signal) => Self { signal: Some(signal) },
            Err(e) => {
                warn!("Cannot listen for SIGHUP, reloading disabled: {}", e);
                Self { signal: None }
            }
        }
    }

    async fn recv(&mut self) {
        match &mut self.signal {
            Some(signal) => {
                if signal.recv().await.is_none() {
                    self.signal = None;
                    std::future::pending::<()>().await;
                }
            }
            None => std::future::pending::<()>().await,
        }
    }
}

#[cfg(not(unix))]
struct Hangups {}

#[cfg(not(unix))]
impl Hangups {
    fn new() -> Self {
        Self {}
    }

    async fn recv(&mut self) {
        std::future::pending::<()>().await
    }
}
