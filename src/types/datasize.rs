//! `DataSize` value unit and canonicalization (§3, §4.A).

use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, serde::Serialize, serde::Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum DataSizeUnit {
    B,
    Kb,
    Mb,
    Gb,
    Tb,
    Pb,
    Kib,
    Mib,
    Gib,
    Tib,
    Pib,
}

impl DataSizeUnit {
    #[must_use]
    pub fn bytes_per_unit(self) -> f64 {
        const KB: f64 = 1_000.0;
        const KIB: f64 = 1_024.0;
        match self {
            Self::B => 1.0,
            Self::Kb => KB,
            Self::Mb => KB * KB,
            Self::Gb => KB * KB * KB,
            Self::Tb => KB * KB * KB * KB,
            Self::Pb => KB * KB * KB * KB * KB,
            Self::Kib => KIB,
            Self::Mib => KIB * KIB,
            Self::Gib => KIB * KIB * KIB,
            Self::Tib => KIB * KIB * KIB * KIB,
            Self::Pib => KIB * KIB * KIB * KIB * KIB,
        }
    }

    #[must_use]
    pub fn short_name(self) -> &'static str {
        match self {
            Self::B => "b",
            Self::Kb => "kb",
            Self::Mb => "mb",
            Self::Gb => "gb",
            Self::Tb => "tb",
            Self::Pb => "pb",
            Self::Kib => "kib",
            Self::Mib => "mib",
            Self::Gib => "gib",
            Self::Tib => "tib",
            Self::Pib => "pib",
        }
    }
}

#[must_use]
pub fn data_size_to_bytes(value: f64, unit: DataSizeUnit) -> f64 {
    value * unit.bytes_per_unit()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_and_decimal_units_differ() {
        let kb = data_size_to_bytes(1.0, DataSizeUnit::Kb);
        let kib = data_size_to_bytes(1.0, DataSizeUnit::Kib);
        assert!(kib > kb);
    }
}
