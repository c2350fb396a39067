//! Vehicle Dynamics Model
//! Static weight distribution, per-corner load transfer and gear estimation
//! from a signal snapshot and the fixed vehicle parameters.
//!
//! Everything here is a pure function: no state survives between calls, so the
//! same inputs always give bit-identical outputs.

use std::f64::consts::PI;

use crate::params::VehicleParams;
use crate::signals::{Inertial, Signals};
use crate::types::{Gear, Gearing, LoadQuality, LoadTransfer, StaticWeight};

/// Axle loads at rest
///
/// vehicle_weight = m × g, split by the front/rear weight fractions.
pub fn static_weight(params: &VehicleParams) -> StaticWeight {
    let vehicle_weight = params.mass * params.gravity;

    StaticWeight {
        vehicle_weight,
        front: params.front_fraction * vehicle_weight,
        rear: params.rear_fraction * vehicle_weight,
    }
}

/// Per-corner loads under the current accelerations
///
/// Physics:
///   long_load = m × ax × h_cg / track
///   lat_load  = m × ay × h_cg / track
///
/// Each corner starts from its share of the axle load (half the axle) and the
/// transfer terms are added with the signs below, so they cancel pairwise and
/// the four corners always sum to the vehicle weight.
///
/// Sign convention: positive ax ADDS load to the front corners. This is the
/// controller's established convention and is kept as is even though forward
/// acceleration physically unloads the front axle. Track width is used for the
/// longitudinal term as well.
///
/// Results are not clamped; see [`load_quality`].
pub fn calculate_load_transfer(
    imu: &Inertial,
    static_weight: &StaticWeight,
    params: &VehicleParams,
) -> LoadTransfer {
    let long_load = params.mass * imu.accel_x * params.cg_height / params.track_width;
    let lat_load = params.mass * imu.accel_y * params.cg_height / params.track_width;

    let corner_front = static_weight.front / 2.0;
    let corner_rear = static_weight.rear / 2.0;

    LoadTransfer {
        front_left: corner_front + long_load - lat_load,
        front_right: corner_front + long_load + lat_load,
        rear_left: corner_rear - long_load - lat_load,
        rear_right: corner_rear - long_load + lat_load,
    }
}

/// Flag corners outside `[0, vehicle_weight]`
pub fn load_quality(load: &LoadTransfer, static_weight: &StaticWeight) -> LoadQuality {
    let plausible = load
        .corners()
        .iter()
        .all(|corner| *corner >= 0.0 && *corner <= static_weight.vehicle_weight);

    if plausible {
        LoadQuality::Plausible
    } else {
        LoadQuality::Implausible
    }
}

/// Wheel rotational speed from road speed
///
/// rot = kph × 1000 / (3.6 × π × d)
pub fn wheel_rotational_speed(wheel_speed_kph: f64, tire_diameter: f64) -> f64 {
    (wheel_speed_kph * 1000.0) / (3.6 * PI * tire_diameter)
}

/// Pick the gear whose predicted engine speed matches the actual one
///
/// predicted = wheel_speed × ratio × final_drive, and a gear matches when
/// |actual − predicted| < tolerance × actual.
///
/// Every gear is tested in table order and each match overwrites the result,
/// so when two ratios match the higher-indexed one wins. No match is Neutral.
pub fn calculate_gear(
    gear_ratios: &[f64],
    final_drive: f64,
    tolerance: f64,
    actual_engine_speed: f64,
    wheel_speed_kph: f64,
) -> Gear {
    let mut current_gear = Gear::Neutral;

    for (index, ratio) in gear_ratios.iter().enumerate() {
        let predicted = wheel_speed_kph * ratio * final_drive;
        let in_range = (actual_engine_speed - predicted).abs() < tolerance * actual_engine_speed;
        if in_range {
            if let Some(gear) = Gear::from_ratio_index(index) {
                current_gear = gear;
            }
        }
    }

    current_gear
}

/// Full gearing estimate from a signal snapshot
///
/// Engine speed comes from CAN frame 1 using the configured decoding; the
/// reference wheel speed is the rear (driving) axle average.
pub fn estimate_gearing(signals: &Signals, params: &VehicleParams) -> Gearing {
    let engine_speed = signals.frame1.engine_speed(params.rpm_decoding) as f64;
    let wheel_speed = signals.speeds.driving_wheel_speed();

    Gearing {
        current_gear: calculate_gear(
            &params.gear_ratios,
            params.final_drive,
            params.rpm_tolerance,
            engine_speed,
            wheel_speed,
        ),
        gear_ratios: params.gear_ratios,
        final_drive: params.final_drive,
        engine_speed_rpm: engine_speed,
        wheel_rotational_speed: wheel_rotational_speed(wheel_speed, params.tire_diameter),
    }
}
