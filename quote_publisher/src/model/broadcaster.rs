//! Periodic quote broadcast to every known destination.
//!
//! The `QuoteBroadcaster` runs a background thread that, once per cycle,
//! delivers a fresh `Quote` snapshot to each destination in its
//! [`HealthTracker`]. New destinations enter the tracker when the engine
//! reports them reachable.
//!
//! Cycle:
//! - every reachable destination has its failure count forced to 0;
//! - the full tracker (reachable and stale entries) is scanned; destinations at
//!   or over the failure threshold are skipped, the rest get one delivery attempt;
//! - a failed delivery adds one to the count, a successful one leaves it.
//!
//! Each message is addressed with the destination's own comp ids and the
//! configured begin string, and failures are handled per destination. The
//! thread waits a warm-up delay before the first cycle, then a fixed interval
//! between cycles, and exits as soon as the shutdown signal fires.

use crate::model::health::HealthTracker;
use crate::model::ids::{IdKind, SharedIds};
use crate::model::snapshot::MarketSnapshot;
use crossbeam_channel::{Receiver, select};
use log::{debug, info, warn};
use quote_common::message::{Body, Header, Message};
use quote_common::settings::Settings;
use quote_common::{Result, SessionEngine, SessionError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// QuoteReqID stamped on unsolicited snapshots.
pub const BROADCAST_QUOTE_REQ_ID: &str = "test";

/// Broadcast loop tuning.
#[derive(Debug, Clone)]
pub struct BroadcastConfig {
    /// Begin string put on every outbound header.
    pub begin_string: String,
    /// Symbol of the broadcast snapshot.
    pub symbol: String,
    /// Delay before the first cycle, giving sessions time to log on.
    pub warmup: Duration,
    /// Time between cycles.
    pub interval: Duration,
    /// Consecutive failures after which a destination is skipped.
    pub failure_threshold: u32,
}

impl BroadcastConfig {
    /// Reference tuning: 5 s warm-up, 20 s period, skip after 3 failures.
    pub fn new(begin_string: &str) -> Self {
        BroadcastConfig {
            begin_string: String::from(begin_string),
            symbol: String::from("BTC/JPY"),
            warmup: Duration::from_secs(5),
            interval: Duration::from_secs(20),
            failure_threshold: 3,
        }
    }

    /// Read `BeginString` and the optional `Broadcast*` keys.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let global = settings.global_settings();
        let mut config = BroadcastConfig::new(global.setting("BeginString")?);
        if global.has_setting("BroadcastSymbol") {
            config.symbol = String::from(global.setting("BroadcastSymbol")?);
        }
        if global.has_setting("BroadcastWarmupSecs") {
            config.warmup = Duration::from_secs(non_negative(global.int_setting("BroadcastWarmupSecs")?, "BroadcastWarmupSecs")?);
        }
        if global.has_setting("BroadcastIntervalSecs") {
            config.interval = Duration::from_secs(non_negative(global.int_setting("BroadcastIntervalSecs")?, "BroadcastIntervalSecs")?);
        }
        if global.has_setting("BroadcastFailureThreshold") {
            let threshold = non_negative(global.int_setting("BroadcastFailureThreshold")?, "BroadcastFailureThreshold")?;
            config.failure_threshold = u32::try_from(threshold)
                .map_err(|_| SessionError::Config(format!("BroadcastFailureThreshold too large: {}", threshold)))?;
        }
        Ok(config)
    }
}

fn non_negative(value: i64, key: &str) -> Result<u64> {
    u64::try_from(value).map_err(|_| SessionError::Config(format!("{} must not be negative: {}", key, value)))
}

/// Outcome of one broadcast cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Deliveries attempted.
    pub attempted: usize,
    /// Deliveries the engine accepted.
    pub delivered: usize,
    /// Deliveries that failed.
    pub failed: usize,
    /// Destinations skipped for reaching the failure threshold.
    pub skipped: usize,
}

/// Owner of the health tracker and the quote id sequence.
pub struct QuoteBroadcaster {
    engine: Arc<dyn SessionEngine>,
    config: BroadcastConfig,
    health: HealthTracker,
    ids: SharedIds,
}

impl QuoteBroadcaster {
    /// Create a broadcaster over `engine`. Quote ids come from `ids`.
    pub fn new(engine: Arc<dyn SessionEngine>, config: BroadcastConfig, ids: SharedIds) -> Self {
        let health = HealthTracker::new(config.failure_threshold);
        QuoteBroadcaster {
            engine,
            config,
            health,
            ids,
        }
    }

    /// Per-destination failure counts.
    pub fn health(&self) -> &HealthTracker {
        &self.health
    }

    /// Run one broadcast cycle.
    pub fn run_cycle(&mut self) -> CycleReport {
        let mut report = CycleReport::default();
        for session_id in self.engine.alive_session_ids() {
            self.health.reset(&session_id);
        }

        for session_id in self.health.destinations() {
            if self.health.should_skip(&session_id) {
                debug!("Skipping {}: too many consecutive failures", session_id);
                report.skipped += 1;
                continue;
            }

            let quote = MarketSnapshot::new(
                &self.ids.next(IdKind::Quote),
                BROADCAST_QUOTE_REQ_ID,
                &self.config.symbol,
            )
            .build();
            let msg = Message {
                header: Header {
                    begin_string: self.config.begin_string.clone(),
                    sender_comp_id: session_id.sender_comp_id.clone(),
                    target_comp_id: session_id.target_comp_id.clone(),
                    ..Header::default()
                },
                body: Body::Quote(quote),
            };

            report.attempted += 1;
            match self.engine.send_to_session(msg, &session_id) {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    let count = self.health.record_failure(&session_id);
                    warn!(
                        "Error({},{}) SendToSession, {}",
                        session_id.target_comp_id, count, e
                    );
                }
            }
        }
        report
    }

    /// Spawn the broadcast thread. It stops when `shutdown` fires.
    pub fn start(self, shutdown: Receiver<()>) -> JoinHandle<()> {
        let mut broadcaster = self;
        thread::spawn(move || {
            info!(
                "Quote broadcaster started: warm-up {:?}, interval {:?}",
                broadcaster.config.warmup, broadcaster.config.interval
            );
            select! {
                recv(shutdown) -> _ => {
                    info!("Quote broadcaster stopped before the first cycle");
                    return;
                },
                default(broadcaster.config.warmup) => {},
            }

            loop {
                let report = broadcaster.run_cycle();
                debug!("Broadcast cycle finished: {:?}", report);
                select! {
                    recv(shutdown) -> _ => break,
                    default(broadcaster.config.interval) => {},
                }
            }
            info!("Quote broadcaster stopping...");
        })
    }
}
