//! Engine ECU broadcast frames
//!
//! The ECU sends two 8-byte frames. Byte 0 of each repeats the frame id.
//!
//! ```text
//! id 0x01  [id][rpm hi][rpm lo][lambda][oil][manifold][fuel][ethanol]
//! id 0x02  [id][throttle][coolant][intake][battery][runtime hi][runtime lo][-]
//! ```

use serde::{Deserialize, Serialize};

use crate::error::{EResult, EstimatorError};
use crate::params::RpmDecoding;
use crate::signals::CanFrame;

pub const ENGINE_FRAME_ID: u32 = 0x01;
pub const AUX_FRAME_ID: u32 = 0x02;

impl CanFrame {
    /// Rebuild engine speed from data bytes 1 and 2.
    ///
    /// `Additive` sums the two bytes, which is what the firmware has always
    /// shipped and caps the result at 510. `BigEndian` matches what the ECU
    /// actually puts on the wire.
    pub fn engine_speed(&self, decoding: RpmDecoding) -> u16 {
        match decoding {
            RpmDecoding::Additive => self.data[1] as u16 + self.data[2] as u16,
            RpmDecoding::BigEndian => u16::from_be_bytes([self.data[1], self.data[2]]),
        }
    }
}

fn expect_id(frame: &CanFrame, expected: u32) -> EResult<()> {
    if frame.id != expected {
        return Err(EstimatorError::UnexpectedFrame {
            expected,
            actual: frame.id,
        });
    }
    Ok(())
}

/// Frame 0x01 contents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EngineFrame {
    pub engine_speed: u16,
    pub lambda: u8,
    pub oil_pressure: u8,
    pub manifold_pressure: u8,
    pub fuel_pressure: u8,
    pub ethanol_content: u8,
}

impl EngineFrame {
    pub fn to_frame(&self) -> CanFrame {
        let [rpm_hi, rpm_lo] = self.engine_speed.to_be_bytes();
        CanFrame {
            id: ENGINE_FRAME_ID,
            data: [
                ENGINE_FRAME_ID as u8,
                rpm_hi,
                rpm_lo,
                self.lambda,
                self.oil_pressure,
                self.manifold_pressure,
                self.fuel_pressure,
                self.ethanol_content,
            ],
        }
    }

    pub fn from_frame(frame: &CanFrame, decoding: RpmDecoding) -> EResult<Self> {
        expect_id(frame, ENGINE_FRAME_ID)?;
        Ok(Self {
            engine_speed: frame.engine_speed(decoding),
            lambda: frame.data[3],
            oil_pressure: frame.data[4],
            manifold_pressure: frame.data[5],
            fuel_pressure: frame.data[6],
            ethanol_content: frame.data[7],
        })
    }
}

/// Frame 0x02 contents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AuxFrame {
    pub throttle_position: u8,
    pub coolant_temp: u8,
    pub intake_temp: u8,
    pub battery_voltage: u8,
    pub engine_run_time: u16,
}

impl AuxFrame {
    pub fn to_frame(&self) -> CanFrame {
        let [run_hi, run_lo] = self.engine_run_time.to_be_bytes();
        CanFrame {
            id: AUX_FRAME_ID,
            data: [
                AUX_FRAME_ID as u8,
                self.throttle_position,
                self.coolant_temp,
                self.intake_temp,
                self.battery_voltage,
                run_hi,
                run_lo,
                0,
            ],
        }
    }

    pub fn from_frame(frame: &CanFrame) -> EResult<Self> {
        expect_id(frame, AUX_FRAME_ID)?;
        Ok(Self {
            throttle_position: frame.data[1],
            coolant_temp: frame.data[2],
            intake_temp: frame.data[3],
            battery_voltage: frame.data[4],
            engine_run_time: u16::from_be_bytes([frame.data[5], frame.data[6]]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emulator_engine_frame() -> EngineFrame {
        EngineFrame {
            engine_speed: 3000,
            lambda: 98,
            oil_pressure: 75,
            manifold_pressure: 100,
            fuel_pressure: 50,
            ethanol_content: 20,
        }
    }

    #[test]
    fn test_engine_frame_layout() {
        let frame = emulator_engine_frame().to_frame();
        // 3000 = 0x0BB8
        assert_eq!(frame.id, 0x01);
        assert_eq!(frame.data, [0x01, 0x0B, 0xB8, 98, 75, 100, 50, 20]);
    }

    #[test]
    fn test_additive_engine_speed() {
        let frame = emulator_engine_frame().to_frame();
        // 0x0B + 0xB8 = 11 + 184
        assert_eq!(frame.engine_speed(RpmDecoding::Additive), 195);
        assert_eq!(frame.engine_speed(RpmDecoding::BigEndian), 3000);
    }

    #[test]
    fn test_additive_engine_speed_saturates_at_two_bytes() {
        let frame = CanFrame {
            id: ENGINE_FRAME_ID,
            data: [1, 0xFF, 0xFF, 0, 0, 0, 0, 0],
        };
        assert_eq!(frame.engine_speed(RpmDecoding::Additive), 510);
        assert_eq!(frame.engine_speed(RpmDecoding::BigEndian), 0xFFFF);
    }

    #[test]
    fn test_engine_frame_decode() {
        let frame = emulator_engine_frame().to_frame();
        let decoded = EngineFrame::from_frame(&frame, RpmDecoding::BigEndian).unwrap();
        assert_eq!(decoded, emulator_engine_frame());
    }

    #[test]
    fn test_aux_frame_layout() {
        let aux = AuxFrame {
            throttle_position: 40,
            coolant_temp: 85,
            intake_temp: 30,
            battery_voltage: 12,
            engine_run_time: 12345,
        };
        let frame = aux.to_frame();
        // 12345 = 0x3039
        assert_eq!(frame.data, [0x02, 40, 85, 30, 12, 0x30, 0x39, 0]);
        assert_eq!(AuxFrame::from_frame(&frame).unwrap(), aux);
    }

    #[test]
    fn test_wrong_frame_id() {
        let frame = AuxFrame::default().to_frame();
        let err = EngineFrame::from_frame(&frame, RpmDecoding::Additive).unwrap_err();
        assert_eq!(
            err,
            EstimatorError::UnexpectedFrame {
                expected: ENGINE_FRAME_ID,
                actual: AUX_FRAME_ID
            }
        );
        assert!(AuxFrame::from_frame(&CanFrame::default()).is_err());
    }
}
