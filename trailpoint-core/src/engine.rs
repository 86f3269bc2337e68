//! Location Engine Orchestration
//!
//! ## Overview
//!
//! [`LocationEngine`] ties the pure pieces together: once per tick it samples
//! the fix provider, classifies the GNSS state, runs the publish-time
//! evaluator and decision table, and when a publish is due composes the
//! payload and hands it to the cloud transport. Everything it touches sits
//! behind the [`crate::traits`] seams, so the whole engine runs unmodified
//! against scripted doubles in tests.
//!
//! ## Tick pipeline
//!
//! ```text
//! rate limit -> capture config -> reconcile radios -> drain outcomes
//!   -> drain retry -> sample fix -> classify -> evaluate -> decide
//!   -> [compose -> send]
//! ```
//!
//! The tick never blocks. Sends use the `nb` convention: a busy transport
//! parks the payload in a single-slot retry buffer that is drained at the top
//! of a later tick, before a fresh payload can be composed over it.
//!
//! ## Outcome delivery
//!
//! Terminal publish outcomes arrive asynchronously from the transport's
//! completion context through an mpsc channel ([`LocationEngine::outcome_sender`])
//! and are folded into engine state at the start of the next tick. One-shot
//! publish callbacks are captured per publish and drained exactly once per
//! outcome.

use std::sync::mpsc::{self, Receiver, Sender};

use crate::commands::parse_enhanced;
use crate::config::{ConfigStore, LocationConfig, LocationConfigUpdate};
use crate::constants::{
    EARLY_SLEEP_SEC, LOOP_SAMPLE_PERIOD_MS, MAX_NEIGHBOR_COLLECT, MAX_WPS_COLLECT,
};
use crate::errors::{PublishStatus, TrackerError, TrackerResult};
use crate::evaluate::{decide, evaluate, EvalInput, PublishReason};
use crate::fix::LocationPoint;
use crate::gnss::{classify, GnssState, LockMonitor};
use crate::payload::{
    write_fix_fields, write_tower_info, write_trigger_array, write_wps_info, JsonWriter,
    PublishBuffer, PublishWriter,
};
use crate::radio::{
    parse_neighbor_cell, parse_serving_cell, CellularNeighbor, CellularServing, WifiAccessPoint,
    NEIGHBOR_CELL_QUERY, SERVING_CELL_QUERY,
};
use crate::sleep::{plan_wake, SleepState, WakePlanInput};
use crate::time::{to_seconds, Seconds, TimeSource, Timestamp};
use crate::traits::{CellularRadio, CloudTransport, FixProvider, SleepControl, WifiRadio};
use crate::triggers::{PublishCallback, TriggerHandle, TriggerKind};

/// Callback appending custom fields inside the `loc` object of each publish
pub type LocationCallback = Box<dyn FnMut(&mut PublishWriter<'_>, &LocationPoint) + Send>;

/// Callback receiving each enhanced location pushed back by the cloud
pub type EnhancedCallback = Box<dyn FnMut(&LocationPoint) + Send>;

/// Everything the engine drives, behind trait objects
pub struct Collaborators {
    /// Position fix source
    pub provider: Box<dyn FixProvider + Send>,
    /// Cloud-bound message transport
    pub transport: Box<dyn CloudTransport + Send>,
    /// Power and sleep scheduling system
    pub sleep: Box<dyn SleepControl + Send>,
    /// Wi-Fi radio for access point scans
    pub wifi: Box<dyn WifiRadio + Send>,
    /// Cellular modem command channel
    pub cellular: Box<dyn CellularRadio + Send>,
    /// Clock the scheduler runs against
    pub clock: Box<dyn TimeSource + Send>,
}

/// Location-publish scheduling and delivery engine
pub struct LocationEngine {
    collab: Collaborators,
    store: ConfigStore,
    /// Per-tick snapshot so one tick observes one config
    loop_safe: LocationConfig,
    shared: TriggerHandle,

    loc_gen_callbacks: Vec<LocationCallback>,
    enhanced_callbacks: Vec<EnhancedCallback>,
    /// Callbacks captured for the in-flight publish
    pending_pub_callbacks: Vec<PublishCallback>,

    out_buf: PublishBuffer,
    /// Single-slot park for a payload the transport could not take yet
    retry: Option<PublishBuffer>,
    /// Most recently accepted payload, kept for failure-driven retry
    last_sent: PublishBuffer,
    outcome_tx: Sender<PublishStatus>,
    outcome_rx: Receiver<PublishStatus>,

    last_publish: Seconds,
    /// Monotonic schedule anchor; advances by `interval_max` per timer
    /// publish so drift stays visible
    monotonic: Seconds,
    new_monotonic: bool,
    first_publish: bool,
    pending_first_publish: bool,

    lock_monitor: LockMonitor,
    network_started: Seconds,
    /// Early-wake margin carried into the current cycle's scheduling
    next_early_wake: Seconds,
    first_tick: bool,
    last_tick_ms: Timestamp,
    last_wake_ms: Timestamp,
    applied_radius: Option<f32>,

    serving: Option<CellularServing>,
    neighbors: heapless::Vec<CellularNeighbor, MAX_NEIGHBOR_COLLECT>,
    wps: heapless::Vec<WifiAccessPoint, MAX_WPS_COLLECT>,
}

impl LocationEngine {
    /// Create an engine over the given collaborators and initial config
    pub fn new(collab: Collaborators, config: LocationConfig) -> TrackerResult<Self> {
        let store = ConfigStore::new(config)?;
        let (outcome_tx, outcome_rx) = mpsc::channel();

        Ok(Self {
            collab,
            loop_safe: store.get(),
            store,
            shared: TriggerHandle::new(),
            loc_gen_callbacks: Vec::new(),
            enhanced_callbacks: Vec::new(),
            pending_pub_callbacks: Vec::new(),
            out_buf: PublishBuffer::new(),
            retry: None,
            last_sent: PublishBuffer::new(),
            outcome_tx,
            outcome_rx,
            last_publish: 0,
            monotonic: 0,
            new_monotonic: false,
            first_publish: true,
            pending_first_publish: false,
            lock_monitor: LockMonitor::new(),
            network_started: 0,
            next_early_wake: 0,
            first_tick: true,
            last_tick_ms: 0,
            last_wake_ms: 0,
            applied_radius: None,
            serving: None,
            neighbors: heapless::Vec::new(),
            wps: heapless::Vec::new(),
        })
    }

    /// Anchor the schedule at boot
    ///
    /// The last-publish time is backdated by `interval_min` so a trigger
    /// raised right after boot is not held for a full minimum interval.
    pub fn init(&mut self) {
        let now = to_seconds(self.collab.clock.now());
        let config = self.store.get();

        self.last_publish = now.saturating_sub(config.interval_min_seconds);
        self.monotonic = self.last_publish;
        self.network_started = now;
        self.last_wake_ms = self.collab.clock.now();

        log::info!(
            "location engine started, interval {}..{}s",
            config.interval_min_seconds,
            config.interval_max_seconds
        );
    }

    /// Cloneable handle for raising triggers and registering publish
    /// callbacks from any context
    pub fn handle(&self) -> TriggerHandle {
        self.shared.clone()
    }

    /// Sender the transport uses to report terminal publish outcomes
    pub fn outcome_sender(&self) -> Sender<PublishStatus> {
        self.outcome_tx.clone()
    }

    /// Copy of the committed config
    pub fn config(&self) -> LocationConfig {
        self.store.get()
    }

    /// Apply a partial config update through the shadow-copy commit path
    pub fn commit_config(&mut self, update: &LocationConfigUpdate) -> TrackerResult<()> {
        self.store.commit_update(update)
    }

    /// Register a callback that appends custom fields to each publish
    pub fn register_location_callback(&mut self, callback: LocationCallback) {
        self.loc_gen_callbacks.push(callback);
    }

    /// Register a callback for enhanced locations pushed back by the cloud
    pub fn register_enhanced_callback(&mut self, callback: EnhancedCallback) {
        self.enhanced_callbacks.push(callback);
    }

    /// Dispatch a cloud command document
    ///
    /// `get_loc` raises an immediate publish; a document carrying a
    /// `loc-enhanced` answer fans it out to the registered callbacks.
    pub fn handle_cloud_command(&mut self, doc: &serde_json::Value) -> TrackerResult<()> {
        if doc.get("cmd").and_then(serde_json::Value::as_str) == Some("get_loc") {
            log::debug!("immediate publish requested by cloud");
            self.shared.trigger(TriggerKind::Immediate, "imm");
            return Ok(());
        }

        if let Some(point) = parse_enhanced(doc)? {
            log::debug!("enhanced location received");
            for callback in &mut self.enhanced_callbacks {
                callback(&point);
            }
            return Ok(());
        }

        Err(TrackerError::NotSupported {
            what: "cloud command",
        })
    }

    /// Run one scheduler tick; rate limited to [`LOOP_SAMPLE_PERIOD_MS`]
    pub fn tick(&mut self) -> TrackerResult<()> {
        let now_ms = self.collab.clock.now();
        if self.last_tick_ms != 0 && now_ms.saturating_sub(self.last_tick_ms) < LOOP_SAMPLE_PERIOD_MS
        {
            return Ok(());
        }
        self.last_tick_ms = now_ms;
        let now = to_seconds(now_ms);

        let config = self.store.get();
        self.reconcile_radios(&config);
        self.loop_safe = config;

        self.process_outcomes();

        // Drain a parked payload before composing anything new over it
        if self.retry.is_some() && self.collab.transport.connected() {
            self.location_publish();
        }

        let (fix, gnss) = self.sample_location(&config, now);

        let results = evaluate(&EvalInput {
            now,
            last_publish: self.last_publish,
            monotonic_anchor: self.monotonic,
            interval_min: config.interval_min_seconds,
            interval_max: config.interval_max_seconds,
            triggers_pending: self.shared.triggers_pending(),
            immediate: self.shared.immediate(),
            first_publish: self.first_publish,
            pending_first_publish: self.pending_first_publish,
            early_wake: self.next_early_wake,
            connecting_time: self.collab.sleep.connecting_time(),
            network_started: self.network_started,
        });

        if results.network_needed && !self.collab.sleep.is_full_wake_cycle() {
            self.enable_network(&config, now);
        }

        let decision = decide(results.reason, gnss, results.lock_wait);
        log::trace!(
            "tick: reason={} gnss={} lock_wait={} publish={}",
            results.reason.name(),
            gnss.name(),
            results.lock_wait,
            decision.publish
        );

        if let Some(name) = decision.raise_trigger {
            self.shared.trigger(TriggerKind::Normal, name);
        }
        if results.reason == PublishReason::Immediate {
            self.shared.with_state(|state| state.triggers.clear_immediate());
        }
        self.new_monotonic |= decision.new_monotonic;

        if !decision.publish {
            return Ok(());
        }
        if !self.collab.transport.connected() {
            // The publish stands; new_monotonic stays latched until it goes out
            log::debug!("publish due but transport disconnected");
            return Ok(());
        }

        // A payload still parked now is from a previous cycle; give it up
        if self.retry.take().is_some() {
            log::warn!("discarding stale queued payload");
            self.issue_callbacks(PublishStatus::Timeout);
        }

        self.pending_pub_callbacks
            .extend(self.shared.with_state(|state| {
                core::mem::take(&mut state.publish_callbacks)
            }));

        if let Err(e) = self.compose_publish(fix.as_ref(), &config) {
            log::error!("payload composition failed: {}", e);
            self.issue_callbacks(PublishStatus::Failure);
            return Err(e);
        }

        self.last_publish = now;
        if (self.first_publish && !self.pending_first_publish) || self.new_monotonic {
            self.monotonic = now;
            self.new_monotonic = false;
        } else {
            self.monotonic = self.monotonic.saturating_add(config.interval_max_seconds);
        }
        if !config.process_ack {
            self.first_publish = false;
        }

        self.location_publish();

        if self.first_publish && !self.pending_first_publish {
            self.pending_first_publish = true;
        }

        Ok(())
    }

    /// Keep radio power and geofence settings in line with the config
    ///
    /// Wi-Fi follows the `enhance_loc && wps` predicate: powered on the first
    /// tick when it holds, then toggled whenever it changes between the
    /// previous tick's snapshot and the fresh config.
    fn reconcile_radios(&mut self, config: &LocationConfig) {
        let powered = self.collab.provider.status().powered;
        if config.gnss && !powered {
            self.collab.provider.start();
        } else if !config.gnss && powered {
            self.collab.provider.stop();
        }

        let wps_wanted = config.enhance_loc && config.wps;
        if self.first_tick {
            self.first_tick = false;
            if wps_wanted {
                self.collab.wifi.on();
            }
        } else {
            let was_wanted = self.loop_safe.enhance_loc && self.loop_safe.wps;
            if wps_wanted && !was_wanted {
                self.collab.wifi.on();
            } else if !wps_wanted && was_wanted {
                self.collab.wifi.off();
            }
        }

        if self.applied_radius != Some(config.radius) {
            self.collab.provider.set_radius_threshold(config.radius);
            self.applied_radius = Some(config.radius);
        }
    }

    /// Sample the fix provider and raise geofence/lock triggers
    fn sample_location(
        &mut self,
        config: &LocationConfig,
        now: Seconds,
    ) -> (Option<LocationPoint>, GnssState) {
        let powered = self.collab.provider.status().powered;
        let fix = if powered {
            self.collab.provider.location().ok()
        } else {
            None
        };
        let gnss = classify(config.gnss, powered, fix.as_ref());

        if let Some(point) = fix.as_ref() {
            if gnss == GnssState::OnLockedStable
                && config.radius > 0.0
                && matches!(self.collab.provider.is_outside_radius(point), Ok(true))
            {
                log::debug!("geofence radius exceeded");
                self.shared.trigger(TriggerKind::Normal, "radius");
            }
        }

        if let Some(name) = self.lock_monitor.observe(
            gnss,
            now,
            self.collab.sleep.is_sleep_disabled(),
            config.lock_trigger,
        ) {
            self.shared.trigger(TriggerKind::Normal, name);
        }

        (fix, gnss)
    }

    /// Bring the network side up mid-cycle: radios on, full wake forced
    fn enable_network(&mut self, config: &LocationConfig, now: Seconds) {
        log::debug!("network needed, forcing full wake cycle");
        self.collab.sleep.force_full_wake_cycle();
        self.network_started = now;
        if config.gnss {
            self.collab.provider.start();
        }
        if config.enhance_loc && config.wps {
            self.collab.wifi.on();
        }
    }

    /// Compose the publish payload into the output buffer
    fn compose_publish(
        &mut self,
        fix: Option<&LocationPoint>,
        config: &LocationConfig,
    ) -> TrackerResult<()> {
        let locked = config.gnss && fix.is_some_and(|f| f.locked);

        if locked {
            // The published position becomes the geofence way point
            if let Some(point) = fix {
                self.collab.provider.set_way_point(point.latitude, point.longitude);
            }
        }

        if config.tower {
            self.gather_towers();
        }
        if config.wps {
            self.gather_wps();
        }

        let default_point = LocationPoint::default();
        let point = fix.unwrap_or(&default_point);
        let names = self.shared.with_state(|state| state.triggers.drain());

        self.out_buf.clear();
        let mut writer = JsonWriter::new(&mut self.out_buf);
        writer.begin_object()?;
        writer.name("cmd")?;
        writer.value_str("loc")?;

        writer.name("loc")?;
        writer.begin_object()?;
        write_fix_fields(&mut writer, point, locked, config.min_publish)?;
        for callback in &mut self.loc_gen_callbacks {
            callback(&mut writer, point);
        }
        writer.end_object()?;

        write_trigger_array(&mut writer, &names)?;

        if config.enhance_loc && config.loc_cb {
            writer.name("loc_cb")?;
            writer.value_bool(true)?;
        }
        if config.tower {
            write_tower_info(&mut writer, self.serving.as_ref(), &self.neighbors)?;
        }
        if config.wps {
            write_wps_info(&mut writer, &self.wps)?;
        }

        writer.end_object()
    }

    /// Query the modem for serving and neighbor cell records
    ///
    /// Parse failures drop the record; a publish tolerates missing tower
    /// data on any given attempt.
    fn gather_towers(&mut self) {
        self.serving = None;
        self.neighbors.clear();

        let serving = &mut self.serving;
        if let Err(e) = self.collab.cellular.query(SERVING_CELL_QUERY, &mut |line| {
            if serving.is_none() {
                if let Ok(record) = parse_serving_cell(line) {
                    *serving = Some(record);
                }
            }
        }) {
            log::debug!("serving cell query failed: {}", e);
        }

        let neighbors = &mut self.neighbors;
        if let Err(e) = self.collab.cellular.query(NEIGHBOR_CELL_QUERY, &mut |line| {
            if let Ok(record) = parse_neighbor_cell(line) {
                let _ = neighbors.push(record);
            }
        }) {
            log::debug!("neighbor cell query failed: {}", e);
        }
    }

    /// Run a Wi-Fi scan for the `wps` enrichment
    fn gather_wps(&mut self) {
        self.wps.clear();
        let wps = &mut self.wps;
        if let Err(e) = self.collab.wifi.scan(wps) {
            log::debug!("wifi scan failed: {}", e);
        }
    }

    /// Hand the current payload (parked retry first) to the transport
    fn location_publish(&mut self) {
        let sending_retry = self.retry.is_some();
        let result = {
            let payload: &str = match &self.retry {
                Some(parked) => parked,
                None => &self.out_buf,
            };
            self.collab.transport.send(payload, self.loop_safe.process_ack)
        };

        match result {
            Ok(()) => {
                if let Some(parked) = self.retry.take() {
                    self.last_sent = parked;
                } else {
                    self.last_sent = self.out_buf.clone();
                }
                log::info!("publish sent, {} bytes{}", self.last_sent.len(),
                    if sending_retry { " (retried)" } else { "" });
            }
            Err(nb::Error::WouldBlock) => {
                log::debug!("transport busy, parking payload");
                if self.retry.is_none() {
                    self.retry = Some(self.out_buf.clone());
                }
            }
            Err(nb::Error::Other(e)) => {
                log::warn!("publish rejected: {}", e);
                self.retry = None;
                self.issue_callbacks(PublishStatus::Failure);
            }
        }
    }

    /// Fold queued transport outcomes into engine state
    fn process_outcomes(&mut self) {
        while let Ok(status) = self.outcome_rx.try_recv() {
            match status {
                PublishStatus::Success => {
                    self.first_publish = false;
                    self.pending_first_publish = false;
                    self.retry = None;
                    self.issue_callbacks(PublishStatus::Success);
                }
                PublishStatus::Failure => {
                    self.pending_first_publish = false;
                    if self.retry.is_none() {
                        // Retry the exact payload; callbacks ride along and
                        // fire on the retry's own outcome
                        log::debug!("publish failed, queueing for retry");
                        self.retry = Some(self.last_sent.clone());
                    } else {
                        self.issue_callbacks(PublishStatus::Failure);
                    }
                }
                PublishStatus::Timeout => {
                    self.pending_first_publish = false;
                    self.issue_callbacks(PublishStatus::Timeout);
                }
                PublishStatus::Unexpected(code) => {
                    log::warn!("unexpected publish status {}", code);
                    self.issue_callbacks(status);
                }
            }
        }
    }

    /// Drain the in-flight publish's one-shot callbacks with an outcome
    fn issue_callbacks(&mut self, status: PublishStatus) {
        for mut callback in self.pending_pub_callbacks.drain(..) {
            callback(status);
        }
    }

    /// Plan the next wake and hand it to the sleep system
    pub fn on_sleep_prepare(&mut self) {
        let config = self.store.get();
        let plan = plan_wake(&WakePlanInput {
            last_publish: self.last_publish,
            interval_min: config.interval_min_seconds,
            interval_max: config.interval_max_seconds,
            triggers_pending: self.shared.triggers_pending(),
            full_wake_cycle: self.collab.sleep.is_full_wake_cycle(),
            last_wake_ms: self.last_wake_ms,
            first_lock: self.lock_monitor.first_lock(),
            monotonic_anchor: self.monotonic,
            connecting_time: self.collab.sleep.connecting_time(),
            prev_early_wake: self.next_early_wake,
        });

        self.next_early_wake = plan.next_early_wake;

        log::debug!("next wake at {}s (early margin {}s)", plan.wake_at, plan.early_wake);
        if let Err(e) = self.collab.sleep.wake_at(plan.wake_at) {
            // The next publish is already due; stay awake this cycle
            log::warn!("wake request refused: {}", e);
            let _ = self.collab.sleep.wake_at(0);
        }
    }

    /// Sleep was cancelled; resume ticking immediately
    pub fn on_sleep_cancel(&mut self) {
        self.last_tick_ms = 0;
    }

    /// The device is going down; power the location radios off
    pub fn on_sleep(&mut self) {
        self.collab.provider.stop();
        self.collab.wifi.off();
    }

    /// Network interface state changed during the sleep/wake transition
    pub fn on_sleep_state(&mut self, state: SleepState) {
        match state {
            SleepState::Connecting => {
                if self.store.get().gnss {
                    self.collab.provider.start();
                }
            }
            SleepState::Shutdown => self.collab.provider.stop(),
        }
    }

    /// The device woke up; decide whether this cycle needs the network
    ///
    /// When the evaluator says no publish is near, the engine votes for an
    /// early shutdown instead of powering radios, so a wake that exists only
    /// to service other subsystems stays cheap.
    pub fn on_wake(&mut self) {
        self.last_wake_ms = self.collab.clock.now();
        let now = to_seconds(self.last_wake_ms);
        self.lock_monitor.reset_first_lock();

        let config = self.store.get();
        let results = evaluate(&EvalInput {
            now,
            last_publish: self.last_publish,
            monotonic_anchor: self.monotonic,
            interval_min: config.interval_min_seconds,
            interval_max: config.interval_max_seconds,
            triggers_pending: self.shared.triggers_pending(),
            immediate: self.shared.immediate(),
            first_publish: self.first_publish,
            pending_first_publish: self.pending_first_publish,
            early_wake: self.next_early_wake,
            connecting_time: self.collab.sleep.connecting_time(),
            network_started: self.network_started,
        });

        if results.network_needed {
            self.enable_network(&config, now);
        } else {
            self.collab.sleep.extend_execution(EARLY_SLEEP_SEC, true);
        }

        self.last_tick_ms = 0;
    }
}
