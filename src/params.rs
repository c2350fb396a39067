//! Fixed vehicle parameters
//!
//! All values are compile-time constants for the car the controller is
//! installed in. `VehicleParams` bundles them into a plain value so the
//! dynamics model can be exercised with other tables in tests.

use serde::{Deserialize, Serialize};

use crate::error::{EResult, EstimatorError};

pub const VEHICLE_MASS: f64 = 1300.0; // kg
pub const CG_HEIGHT: f64 = 0.5; // m
pub const TRACK_WIDTH: f64 = 1.413; // m
pub const WHEELBASE: f64 = 2.7; // m
pub const GRAVITY: f64 = 9.81; // m/s²
pub const W_FRONT: f64 = 0.55; // fraction of weight over front axle
pub const W_REAR: f64 = 0.45; // fraction of weight over rear axle
pub const MAX_RPM: f64 = 7300.0;
pub const FINAL_DRIVE: f64 = 3.15;
pub const GEAR_COUNT: usize = 5;
pub const GEAR_RATIOS: [f64; GEAR_COUNT] = [4.21, 2.49, 1.67, 1.24, 1.0];
pub const TIRE_DIAMETER: f64 = 0.6518; // m
pub const RPM_BUFFER: f64 = 0.10; // fraction the engine speed may differ and still match a gear

/// How engine speed is rebuilt from the two CAN data bytes that carry it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RpmDecoding {
    /// `data[1] + data[2]`, as the controller firmware has always done it
    #[default]
    Additive,
    /// `data[1] << 8 | data[2]`, the layout the engine ECU transmits
    BigEndian,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VehicleParams {
    pub mass: f64,
    pub cg_height: f64,
    pub track_width: f64,
    pub wheelbase: f64,
    pub gravity: f64,
    pub front_fraction: f64,
    pub rear_fraction: f64,
    pub max_rpm: f64,
    pub final_drive: f64,
    pub gear_ratios: [f64; GEAR_COUNT],
    pub tire_diameter: f64,
    pub rpm_tolerance: f64,
    pub rpm_decoding: RpmDecoding,
}

impl VehicleParams {
    pub const DEFAULT: VehicleParams = VehicleParams {
        mass: VEHICLE_MASS,
        cg_height: CG_HEIGHT,
        track_width: TRACK_WIDTH,
        wheelbase: WHEELBASE,
        gravity: GRAVITY,
        front_fraction: W_FRONT,
        rear_fraction: W_REAR,
        max_rpm: MAX_RPM,
        final_drive: FINAL_DRIVE,
        gear_ratios: GEAR_RATIOS,
        tire_diameter: TIRE_DIAMETER,
        rpm_tolerance: RPM_BUFFER,
        rpm_decoding: RpmDecoding::Additive,
    };

    /// Same vehicle, different engine-speed decoding
    pub fn with_rpm_decoding(mut self, decoding: RpmDecoding) -> Self {
        self.rpm_decoding = decoding;
        self
    }

    /// Reject parameter sets the dynamics model cannot use
    pub fn validate(&self) -> EResult<()> {
        let positive = [
            ("mass", self.mass),
            ("cg_height", self.cg_height),
            ("track_width", self.track_width),
            ("wheelbase", self.wheelbase),
            ("gravity", self.gravity),
            ("final_drive", self.final_drive),
            ("tire_diameter", self.tire_diameter),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(EstimatorError::InvalidParameters(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }

        let fraction_sum = self.front_fraction + self.rear_fraction;
        if self.front_fraction < 0.0 || self.rear_fraction < 0.0 || (fraction_sum - 1.0).abs() > 1e-6
        {
            return Err(EstimatorError::InvalidParameters(format!(
                "weight fractions must be non-negative and sum to 1, got {} + {}",
                self.front_fraction, self.rear_fraction
            )));
        }

        if !(self.rpm_tolerance > 0.0 && self.rpm_tolerance < 1.0) {
            return Err(EstimatorError::InvalidParameters(format!(
                "rpm_tolerance must be within (0, 1), got {}",
                self.rpm_tolerance
            )));
        }

        if let Some(ratio) = self.gear_ratios.iter().find(|r| !(r.is_finite() && **r > 0.0)) {
            return Err(EstimatorError::InvalidParameters(format!(
                "gear ratios must be positive, got {}",
                ratio
            )));
        }

        Ok(())
    }
}

impl Default for VehicleParams {
    fn default() -> Self {
        Self::DEFAULT
    }
}
