//! Line protocol spoken with the wrist sensor.
//!
//! Device to host: `<vertical>,<horizontal>[,...]` angle samples and the
//! `CALIBRATED` acknowledgment. Host to device: the `CAL`, `VIB_ON`,
//! `VIB_OFF` and `VIB_PULSE` command tokens, one per line.

use crate::AngleSample;

/// Acknowledgment sent by the device once calibration finishes
pub const CALIBRATED_TOKEN: &str = "CALIBRATED";

/// Raw angles as reported by the device
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SensorSample {
    pub vertical: f64,
    pub horizontal: f64,
}

impl SensorSample {
    /// Convert to engine orientation
    ///
    /// The sensor is mounted so that device-positive horizontal is ulnar
    /// deviation, hence the sign flip.
    pub fn to_angles(&self) -> AngleSample {
        AngleSample::new(self.vertical, -self.horizontal)
    }
}

/// Outcome of decoding one line
#[derive(Clone, Debug, PartialEq)]
pub enum Telemetry {
    Sample(SensorSample),
    CalibrationAck,
    Malformed(String),
}

/// Decode one newline-stripped line of device output
///
/// Never fails: anything unrecognised comes back as `Telemetry::Malformed`
/// carrying the raw line.
pub fn decode_line(line: &str) -> Telemetry {
    let trimmed = line.trim();

    if trimmed == CALIBRATED_TOKEN {
        return Telemetry::CalibrationAck;
    }

    let mut tokens = trimmed.split(',');
    let vertical = tokens.next().and_then(parse_angle);
    let horizontal = tokens.next().and_then(parse_angle);

    match (vertical, horizontal) {
        (Some(vertical), Some(horizontal)) => Telemetry::Sample(SensorSample {
            vertical,
            horizontal,
        }),
        _ => Telemetry::Malformed(line.to_string()),
    }
}

fn parse_angle(token: &str) -> Option<f64> {
    token.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Command written to the device
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeviceCommand {
    /// Request calibration; answered with `CALIBRATED`
    Calibrate,
    /// Start continuous vibration
    VibrationOn,
    /// Stop continuous vibration
    VibrationOff,
    /// Single short vibration pulse
    VibrationPulse,
}

impl DeviceCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceCommand::Calibrate => "CAL",
            DeviceCommand::VibrationOn => "VIB_ON",
            DeviceCommand::VibrationOff => "VIB_OFF",
            DeviceCommand::VibrationPulse => "VIB_PULSE",
        }
    }

    /// Wire form, newline terminated
    pub fn encode(&self) -> String {
        format!("{}\n", self.as_str())
    }
}

impl std::fmt::Display for DeviceCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_sample() {
        assert_eq!(
            decode_line("1.5,-2.0"),
            Telemetry::Sample(SensorSample {
                vertical: 1.5,
                horizontal: -2.0
            })
        );
    }

    #[test]
    fn test_decode_ignores_extra_fields_and_whitespace() {
        assert_eq!(
            decode_line(" 10.25 , 3 ,1,junk\r"),
            Telemetry::Sample(SensorSample {
                vertical: 10.25,
                horizontal: 3.0
            })
        );
    }

    #[test]
    fn test_decode_calibration_ack() {
        assert_eq!(decode_line("CALIBRATED"), Telemetry::CalibrationAck);
        assert_eq!(decode_line("CALIBRATED\r"), Telemetry::CalibrationAck);
        assert!(matches!(decode_line("calibrated"), Telemetry::Malformed(_)));
    }

    #[test]
    fn test_decode_malformed() {
        assert_eq!(
            decode_line("garbage"),
            Telemetry::Malformed("garbage".into())
        );
        for line in ["", "   ", "1.0", "1.0,", ",2.0", "a,b", "1.0;2.0"] {
            assert!(
                matches!(decode_line(line), Telemetry::Malformed(_)),
                "expected malformed for {:?}",
                line
            );
        }
    }

    #[test]
    fn test_decode_rejects_non_finite() {
        for line in ["NaN,1.0", "1.0,inf", "-infinity,0"] {
            assert!(matches!(decode_line(line), Telemetry::Malformed(_)));
        }
    }

    #[test]
    fn test_horizontal_sign_flip() {
        let sample = SensorSample {
            vertical: 12.0,
            horizontal: 8.0,
        };
        let angles = sample.to_angles();
        assert_eq!(angles.flexion_extension, 12.0);
        assert_eq!(angles.radial_ulnar, -8.0);
    }

    #[test]
    fn test_command_tokens() {
        assert_eq!(DeviceCommand::Calibrate.encode(), "CAL\n");
        assert_eq!(DeviceCommand::VibrationOn.to_string(), "VIB_ON");
        assert_eq!(DeviceCommand::VibrationOff.as_str(), "VIB_OFF");
        assert_eq!(DeviceCommand::VibrationPulse.as_str(), "VIB_PULSE");
    }
}
