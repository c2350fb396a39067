//! Published estimation types
//!
//! Everything in here is plain data: built fresh each update cycle, published
//! behind an `Arc`, and never mutated afterwards.

use serde::{Deserialize, Serialize};

use crate::params::{VehicleParams, GEAR_COUNT};

/// Transmission gear
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Gear {
    #[default]
    Neutral,
    First,
    Second,
    Third,
    Fourth,
    Fifth,
    Sixth,
    Reverse,
}

impl Gear {
    /// Gear selected by ratio-table index `i` (index 0 is first gear)
    pub fn from_ratio_index(index: usize) -> Option<Gear> {
        match index {
            0 => Some(Gear::First),
            1 => Some(Gear::Second),
            2 => Some(Gear::Third),
            3 => Some(Gear::Fourth),
            4 => Some(Gear::Fifth),
            5 => Some(Gear::Sixth),
            _ => None,
        }
    }

    /// Short label for dashboards: "N", "1".."6", "R"
    pub fn label(&self) -> &'static str {
        match self {
            Gear::Neutral => "N",
            Gear::First => "1",
            Gear::Second => "2",
            Gear::Third => "3",
            Gear::Fourth => "4",
            Gear::Fifth => "5",
            Gear::Sixth => "6",
            Gear::Reverse => "R",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gearing {
    pub current_gear: Gear,
    pub gear_ratios: [f64; GEAR_COUNT],
    pub final_drive: f64,
    /// Engine speed the estimate was made against (RPM, as decoded)
    pub engine_speed_rpm: f64,
    /// Driving wheel rotational speed derived from wheel speed and tire size
    pub wheel_rotational_speed: f64,
}

/// At-rest axle loads (N)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StaticWeight {
    pub vehicle_weight: f64,
    pub front: f64,
    pub rear: f64,
}

/// Per-corner normal load (N). Not clamped: negative corners mean the inputs
/// were implausible, see [`LoadQuality`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoadTransfer {
    pub front_left: f64,
    pub front_right: f64,
    pub rear_left: f64,
    pub rear_right: f64,
}

impl LoadTransfer {
    /// Even left/right split of each axle
    pub fn even_split(static_weight: &StaticWeight) -> Self {
        Self {
            front_left: static_weight.front / 2.0,
            front_right: static_weight.front / 2.0,
            rear_left: static_weight.rear / 2.0,
            rear_right: static_weight.rear / 2.0,
        }
    }

    pub fn total(&self) -> f64 {
        self.front_left + self.front_right + self.rear_left + self.rear_right
    }

    pub fn corners(&self) -> [f64; 4] {
        [
            self.front_left,
            self.front_right,
            self.rear_left,
            self.rear_right,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mass {
    pub static_weight: StaticWeight,
    pub load_transfer: LoadTransfer,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dynamics {
    /// Reserved; always zero until grade estimation exists
    pub grade_estimation: i8,
    pub mass: Mass,
}

/// Data-quality flag for the per-corner loads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LoadQuality {
    #[default]
    Plausible,
    /// At least one corner fell below zero or above the vehicle weight
    Implausible,
}

/// One complete estimation snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Estimations {
    /// Publish sequence number; 0 is the startup baseline
    pub cycle: u64,
    pub gearing: Gearing,
    pub dynamics: Dynamics,
    pub brakes_applied: bool,
    pub load_quality: LoadQuality,
}

impl Estimations {
    /// Startup baseline: static weights, even load split, neutral gear,
    /// brakes released
    pub fn initial(params: &VehicleParams) -> Self {
        let static_weight = crate::physics::static_weight(params);

        Self {
            cycle: 0,
            gearing: Gearing {
                current_gear: Gear::Neutral,
                gear_ratios: params.gear_ratios,
                final_drive: params.final_drive,
                engine_speed_rpm: 0.0,
                wheel_rotational_speed: 0.0,
            },
            dynamics: Dynamics {
                grade_estimation: 0,
                mass: Mass {
                    static_weight,
                    load_transfer: LoadTransfer::even_split(&static_weight),
                },
            },
            brakes_applied: false,
            load_quality: LoadQuality::Plausible,
        }
    }

    pub fn load_transfer(&self) -> &LoadTransfer {
        &self.dynamics.mass.load_transfer
    }

    pub fn static_weight(&self) -> &StaticWeight {
        &self.dynamics.mass.static_weight
    }
}
