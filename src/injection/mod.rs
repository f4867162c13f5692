pub mod clock;
pub mod corruptor;
pub mod event_log;
pub mod faults;
pub mod permanent;
pub mod record;
pub mod stats;
pub mod target;

use crate::config::{ConfigError, FaultConfig};
use clock::ClockWindow;
use event_log::EventLog;
use faults::ModelSelector;
use log::{debug, warn};
use permanent::PermanentFaultTracker;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use record::{InjectionEvent, PermanentFaultRecord};
use stats::InjectionStats;
use std::sync::{Arc, Mutex};
use target::{AccessKind, FaultTarget};

/// The per-access fault gate: one instance per injection site (register
/// file, cache controller, main memory).
///
/// Every injector owns a private seeded PRNG stream, so a fixed seed
/// reproduces the identical fault sequence and separate injectors in the
/// same run stay statistically independent. All entry points are
/// synchronous and return within the simulated step; nothing on the runtime
/// path can fail the host simulation.
pub struct FaultInjector {
    config: FaultConfig,
    window: ClockWindow,
    selector: ModelSelector,
    rng: ChaCha8Rng,
    tracker: PermanentFaultTracker,
    stats: InjectionStats,
    event_log: Option<Arc<Mutex<EventLog>>>,
    last_permanent_check: Option<u64>,
}

impl FaultInjector {
    /// Create an injector from a validated configuration.
    ///
    /// # Arguments
    ///
    /// * `config` - The injector configuration; validated here, once.
    /// * `event_log` - Shared log sink for this run, or `None` to keep the
    ///   injector silent regardless of `writeLog`.
    ///
    /// # Returns
    ///
    /// * `Ok(Self)` - Ready injector.
    /// * `Err(ConfigError)` - The configuration is rejected; nothing was
    ///   injected and the host should abort before simulation starts.
    pub fn new(
        config: FaultConfig,
        event_log: Option<Arc<Mutex<EventLog>>>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let window = ClockWindow::from_config(&config);
        let selector = ModelSelector::from_config(&config);
        let rng = ChaCha8Rng::seed_from_u64(config.seed);

        Ok(Self {
            config,
            window,
            selector,
            rng,
            tracker: PermanentFaultTracker::new(),
            stats: InjectionStats::default(),
            event_log,
            last_permanent_check: None,
        })
    }

    /// Hook called by the host model on every read or write of a fault
    /// target. Decides whether a fault fires on this access and, if so,
    /// corrupts the value in place through the adapter.
    ///
    /// Filtered-out accesses return before any use of the PRNG stream, so
    /// the configured probability is independent of non-matching traffic.
    pub fn notify_access(
        &mut self,
        target: &mut dyn FaultTarget,
        tick: u64,
        direction: AccessKind,
    ) -> Option<InjectionEvent> {
        if !target.matches_filters(&self.config) {
            return None;
        }
        match direction {
            AccessKind::Read if !self.config.inject_on_read => return None,
            AccessKind::Write if !self.config.inject_on_write => return None,
            _ => {}
        }

        let cycle = self.window.to_cycle(tick);
        if !self.window.is_active(cycle) {
            return None;
        }

        self.stats.rng_draws += 1;
        let draw: f64 = self.rng.gen();
        if draw >= self.config.probability {
            return None;
        }

        let size = self.config.corruption_size;
        let mut buffer = [0u8; 8];
        let buffer = &mut buffer[..size];
        target.read_into(buffer);
        let original = buffer.to_vec();

        if self.selector.is_random() {
            self.stats.rng_draws += 1;
        }
        let model = self.selector.select(&mut self.rng);

        let mask = if self.config.bit_mask != 0 {
            self.config.bit_mask
        } else {
            self.stats.rng_draws += 1;
            corruptor::random_mask(
                &mut self.rng,
                self.config.corruption_bits(),
                self.config.num_bits_to_change,
            )
        };

        let outcome = corruptor::apply_mask(buffer, mask, model);
        target.write(buffer);

        let permanent = model.is_permanent();
        let event = InjectionEvent {
            cycle,
            target: target.identity(),
            model,
            original,
            corrupted: buffer.to_vec(),
            selected_bits: outcome.selected,
            changed_bits: outcome.changed,
            permanent,
        };

        self.stats.record(model, permanent);
        if permanent && mask != 0 {
            self.tracker.install(PermanentFaultRecord {
                target: event.target.clone(),
                mask,
                model,
                installed_cycle: cycle,
                active: true,
            });
        }
        if self.config.write_log {
            self.append_log(&event);
        }
        debug!("injected fault: {}", event.log_line());

        Some(event)
    }

    /// True when the periodic permanent-fault check is due at this tick.
    /// Each matching cycle boundary reports due exactly once.
    pub fn permanent_check_due(&mut self, tick: u64) -> bool {
        let cycle = self.window.to_cycle(tick);
        if cycle % self.config.cycles_permanent_fault_check != 0 {
            return false;
        }
        if self.last_permanent_check == Some(cycle) {
            return false;
        }
        self.last_permanent_check = Some(cycle);
        true
    }

    /// Reapply standing faults to one target, independent of the per-access
    /// probability. The host calls this for each candidate target after
    /// `permanent_check_due` reports a boundary.
    pub fn reapply_permanent(&mut self, target: &mut dyn FaultTarget) {
        self.tracker
            .reapply_to(target, self.config.corruption_size);
    }

    /// Periodic cadence driver: on a due cycle boundary, reapply every
    /// standing fault to the matching targets.
    pub fn on_tick(&mut self, tick: u64, targets: &mut [&mut dyn FaultTarget]) {
        if self.tracker.records().is_empty() {
            // Still consume the boundary so a later install does not see a
            // stale cadence.
            self.permanent_check_due(tick);
            return;
        }
        if !self.permanent_check_due(tick) {
            return;
        }
        for target in targets.iter_mut() {
            self.tracker
                .reapply_to(&mut **target, self.config.corruption_size);
        }
    }

    /// Explicit end-of-run reset: drops all permanent faults, zeroes the
    /// counters and reseeds the PRNG so a rerun reproduces the same
    /// sequence.
    pub fn reset(&mut self) {
        self.tracker.clear();
        self.stats = InjectionStats::default();
        self.rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        self.last_permanent_check = None;
    }

    pub fn config(&self) -> &FaultConfig {
        &self.config
    }

    pub fn stats(&self) -> &InjectionStats {
        &self.stats
    }

    pub fn permanent_records(&self) -> &[PermanentFaultRecord] {
        self.tracker.records()
    }

    fn append_log(&self, event: &InjectionEvent) {
        let Some(event_log) = &self.event_log else {
            return;
        };
        match event_log.lock() {
            Ok(mut event_log) => {
                if let Err(error) = event_log.append(event) {
                    warn!("event log append failed: {}", error);
                }
            }
            Err(_) => warn!("event log lock poisoned, record dropped"),
        }
    }
}
