//! `Duration` value unit and canonicalization (§3, §4.A).

use strum::{Display, EnumString};

/// Unit a `Duration` value is tagged with. Equality between two durations
/// normalizes both to nanoseconds before comparing (§4.A).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, serde::Serialize, serde::Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum DurationUnit {
    #[strum(serialize = "ns")]
    Nanos,
    #[strum(serialize = "us", serialize = "\u{b5}s")]
    Micros,
    #[strum(serialize = "ms")]
    Millis,
    #[strum(serialize = "s")]
    Seconds,
    #[strum(serialize = "min")]
    Minutes,
    #[strum(serialize = "h")]
    Hours,
    #[strum(serialize = "d")]
    Days,
}

impl DurationUnit {
    #[must_use]
    pub fn nanos_per_unit(self) -> f64 {
        match self {
            Self::Nanos => 1.0,
            Self::Micros => 1_000.0,
            Self::Millis => 1_000_000.0,
            Self::Seconds => 1_000_000_000.0,
            Self::Minutes => 60.0 * 1_000_000_000.0,
            Self::Hours => 3_600.0 * 1_000_000_000.0,
            Self::Days => 86_400.0 * 1_000_000_000.0,
        }
    }

    #[must_use]
    pub fn short_name(self) -> &'static str {
        match self {
            Self::Nanos => "ns",
            Self::Micros => "us",
            Self::Millis => "ms",
            Self::Seconds => "s",
            Self::Minutes => "min",
            Self::Hours => "h",
            Self::Days => "d",
        }
    }
}

/// Normalizes a `(value, unit)` pair to a nanosecond count for equality and
/// ordering, per §4.A ("Duration/DataSize equality normalizes to canonical
/// units before comparing").
#[must_use]
pub fn duration_to_nanos(value: f64, unit: DurationUnit) -> f64 {
    value * unit.nanos_per_unit()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cross_unit_equality_normalizes() {
        let a = duration_to_nanos(1.0, DurationUnit::Minutes);
        let b = duration_to_nanos(60.0, DurationUnit::Seconds);
        assert!((a - b).abs() < f64::EPSILON);
    }
}
