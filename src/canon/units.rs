// src/canon/units.rs - program, internal and external unit conversions
//
// Internally every length is millimetres and every angle is degrees.
// Program units are whatever the part program selected (G20/G21 style);
// external units are whatever the motion controller was configured with.
use canon_shared::Pose;
use serde::{Deserialize, Serialize};

/// Length unit selected by the part program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthUnits {
    Inches,
    #[default]
    Millimeters,
    Centimeters,
}

impl LengthUnits {
    pub fn mm_per_unit(self) -> f64 {
        match self {
            LengthUnits::Inches => 25.4,
            LengthUnits::Millimeters => 1.0,
            LengthUnits::Centimeters => 10.0,
        }
    }

    pub fn from_prog_len(self, value: f64) -> f64 {
        value * self.mm_per_unit()
    }

    pub fn to_prog_len(self, value: f64) -> f64 {
        value / self.mm_per_unit()
    }
}

/// Program pose to internal units. Angles pass through unchanged.
pub fn to_internal(pose: &Pose, units: LengthUnits) -> Pose {
    pose.map_axes(|v| units.from_prog_len(v), |v| v)
}

/// Internal pose back to program units.
pub fn to_program(pose: &Pose, units: LengthUnits) -> Pose {
    pose.map_axes(|v| units.to_prog_len(v), |v| v)
}

/// Scale factors between internal units and the controller's units:
/// `external = internal * scale`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExternalUnits {
    linear: f64,
    angular: f64,
}

impl Default for ExternalUnits {
    fn default() -> Self {
        Self { linear: 1.0, angular: 1.0 }
    }
}

impl ExternalUnits {
    /// Builds the scale pair, replacing a zero factor with 1.0. Every
    /// substitution is reported back as an operator-facing fault text.
    pub fn sanitized(linear: f64, angular: f64) -> (Self, Vec<String>) {
        let mut faults = Vec::new();
        let linear = if linear == 0.0 {
            faults.push("external length units are zero".to_string());
            1.0
        } else {
            linear
        };
        let angular = if angular == 0.0 {
            faults.push("external angle units are zero".to_string());
            1.0
        } else {
            angular
        };
        (Self { linear, angular }, faults)
    }

    pub fn linear(&self) -> f64 {
        self.linear
    }

    pub fn angular(&self) -> f64 {
        self.angular
    }

    pub fn to_ext_len(&self, mm: f64) -> f64 {
        mm * self.linear
    }

    pub fn from_ext_len(&self, ext: f64) -> f64 {
        ext / self.linear
    }

    pub fn to_ext_ang(&self, degrees: f64) -> f64 {
        degrees * self.angular
    }

    pub fn from_ext_ang(&self, ext: f64) -> f64 {
        ext / self.angular
    }

    pub fn to_external(&self, pose: &Pose) -> Pose {
        pose.map_axes(|v| self.to_ext_len(v), |v| self.to_ext_ang(v))
    }

    pub fn from_external(&self, pose: &Pose) -> Pose {
        pose.map_axes(|v| self.from_ext_len(v), |v| self.from_ext_ang(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_lengths_scale_angles_do_not() {
        let pose = Pose::new(1.0, 2.0, 0.5, 90.0, 0.0, 0.0, 1.0, 0.0, 0.0);
        let internal = to_internal(&pose, LengthUnits::Inches);
        assert_eq!(internal.x, 25.4);
        assert_eq!(internal.z, 12.7);
        assert_eq!(internal.a, 90.0);
        assert_eq!(internal.u, 25.4);
        let back = to_program(&internal, LengthUnits::Inches);
        assert!(back.approx_eq(&pose, 1e-12));
        assert_eq!(LengthUnits::Centimeters.from_prog_len(1.5), 15.0);
    }

    #[test]
    fn test_zero_external_units_fall_back_to_one() {
        let (units, faults) = ExternalUnits::sanitized(0.0, 2.0);
        assert_eq!(units.linear(), 1.0);
        assert_eq!(units.angular(), 2.0);
        assert_eq!(faults.len(), 1);

        let (_, faults) = ExternalUnits::sanitized(0.0, 0.0);
        assert_eq!(faults.len(), 2);
    }

    #[test]
    fn test_external_conversion() {
        let (units, faults) = ExternalUnits::sanitized(1.0 / 25.4, 1.0);
        assert!(faults.is_empty());
        let ext = units.to_external(&Pose::xyz(25.4, 0.0, 50.8));
        assert!((ext.x - 1.0).abs() < 1e-12);
        assert!((ext.z - 2.0).abs() < 1e-12);
        assert!((units.from_ext_len(1.0) - 25.4).abs() < 1e-12);
    }
}
