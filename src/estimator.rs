//! Estimation state publisher
//!
//! [`Estimator`] runs the dynamics model once per cycle against a single bus
//! snapshot and hands the result to [`EstimationsState`], which swaps the
//! published `Arc<Estimations>` under its lock. Readers clone the `Arc` under
//! the same lock, so they hold either the whole previous snapshot or the whole
//! new one.

use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use std::sync::{Arc, Mutex};

use crate::error::{lock_poisoned, EResult, EstimatorError};
use crate::params::VehicleParams;
use crate::physics;
use crate::signals::{SignalBus, Signals};
use crate::types::{Dynamics, Estimations, LoadQuality, Mass};

/// Published estimation snapshot, single writer / many readers
///
/// Only the owning [`Estimator`] publishes; the shared handle is read-only.
///
/// ```compile_fail
/// use vehicle_dynamics_rs::{Estimator, VehicleParams};
///
/// let estimator = Estimator::new(VehicleParams::default()).unwrap();
/// let baseline = *estimator.baseline();
/// estimator.state().swap(baseline).unwrap();
/// ```
pub struct EstimationsState {
    current: Mutex<Arc<Estimations>>,
    subscribers: Mutex<Vec<Sender<Arc<Estimations>>>>,
}

impl EstimationsState {
    pub(crate) fn new(initial: Estimations) -> Self {
        EstimationsState {
            current: Mutex::new(Arc::new(initial)),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Replace the published snapshot
    fn swap(&self, estimations: Estimations) -> EResult<Arc<Estimations>> {
        let next = Arc::new(estimations);
        let mut current = self.current.lock().map_err(lock_poisoned("estimations"))?;
        *current = Arc::clone(&next);
        Ok(next)
    }

    /// Queue a published snapshot for every live subscriber
    fn notify(&self, next: &Arc<Estimations>) -> EResult<()> {
        let mut subscribers = self
            .subscribers
            .lock()
            .map_err(lock_poisoned("subscriber list"))?;
        subscribers.retain(|tx| match tx.try_send(Arc::clone(next)) {
            Ok(_) => true,
            // Slow consumer, drop this snapshot for it
            Err(TrySendError::Full(_)) => true,
            Err(TrySendError::Disconnected(_)) => false,
        });
        Ok(())
    }

    /// Latest published snapshot
    pub fn latest(&self) -> EResult<Arc<Estimations>> {
        let current = self.current.lock().map_err(lock_poisoned("estimations"))?;
        Ok(Arc::clone(&current))
    }

    /// Receive every snapshot published from now on, up to `capacity` queued
    pub fn subscribe(&self, capacity: usize) -> EResult<Receiver<Arc<Estimations>>> {
        if capacity == 0 {
            return Err(EstimatorError::InvalidParameters(
                "subscriber capacity must be at least 1".to_string(),
            ));
        }
        let (tx, rx) = bounded(capacity);
        self.subscribers
            .lock()
            .map_err(lock_poisoned("subscriber list"))?
            .push(tx);
        Ok(rx)
    }

    pub fn subscriber_count(&self) -> EResult<usize> {
        Ok(self
            .subscribers
            .lock()
            .map_err(lock_poisoned("subscriber list"))?
            .len())
    }
}

/// Per-cycle dynamics estimator and sole writer of an [`EstimationsState`]
pub struct Estimator {
    params: VehicleParams,
    baseline: Estimations,
    state: Arc<EstimationsState>,
    cycle: u64,
}

impl Estimator {
    /// Validate parameters, compute the static baseline once and publish it
    pub fn new(params: VehicleParams) -> EResult<Self> {
        params.validate()?;
        let baseline = Estimations::initial(&params);

        Ok(Estimator {
            params,
            baseline,
            state: Arc::new(EstimationsState::new(baseline)),
            cycle: 0,
        })
    }

    /// Handle for display/logging readers
    pub fn state(&self) -> Arc<EstimationsState> {
        Arc::clone(&self.state)
    }

    pub fn params(&self) -> &VehicleParams {
        &self.params
    }

    pub fn baseline(&self) -> &Estimations {
        &self.baseline
    }

    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Build the estimations for one signal snapshot
    ///
    /// Static weight and the ratio table come from the baseline; only load
    /// transfer, gear and brake state are recomputed.
    pub fn estimate(&self, signals: &Signals, cycle: u64) -> Estimations {
        let static_weight = self.baseline.dynamics.mass.static_weight;
        let load_transfer =
            physics::calculate_load_transfer(&signals.imu, &static_weight, &self.params);
        let load_quality = physics::load_quality(&load_transfer, &static_weight);

        Estimations {
            cycle,
            gearing: physics::estimate_gearing(signals, &self.params),
            dynamics: Dynamics {
                grade_estimation: 0,
                mass: Mass {
                    static_weight,
                    load_transfer,
                },
            },
            brakes_applied: signals.brakes.applied,
            load_quality,
        }
    }

    /// One update cycle: snapshot the bus, estimate, publish
    ///
    /// Nothing is published while the bus is not `Ready`.
    pub fn update(&mut self, bus: &SignalBus) -> EResult<Arc<Estimations>> {
        let signals = bus.snapshot()?;
        if !signals.is_ready() {
            return Err(EstimatorError::SignalsNotReady(signals.curr_state));
        }

        let estimations = self.estimate(&signals, self.cycle + 1);
        if estimations.load_quality == LoadQuality::Implausible {
            let load = estimations.load_transfer();
            log::warn!(
                "Implausible load transfer at cycle {}: FL {:.0} FR {:.0} RL {:.0} RR {:.0} (ax {:.2}, ay {:.2})",
                estimations.cycle,
                load.front_left,
                load.front_right,
                load.rear_left,
                load.rear_right,
                signals.imu.accel_x,
                signals.imu.accel_y
            );
        }

        // Readers can see it now; the cycle number is spent
        let published = self.state.swap(estimations)?;
        self.cycle = published.cycle;
        self.state.notify(&published)?;
        Ok(published)
    }
}
