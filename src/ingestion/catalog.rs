//! Canonical field catalog
//!
//! Each canonical field lists the raw column spellings it accepts (in priority
//! order), whether a table without it is rejected, how its values are coerced,
//! and the unit it is reported in.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    Date,
    EnergyExport,
    AvailabilityPct,
    PerformanceRatioPct,
    CapacityUtilizationPct,
    IrradianceGhi,
    IrradiancePoa,
    AmbientTemp,
    ModuleTemp,
    WindSpeedAvg,
    WindSpeedMax,
    CapacityMw,
    NetExport,
    ImportKwh,
}

/// How raw cells are coerced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldDomain {
    Datetime,
    Numeric,
    /// Numeric, rescaled ×100 when the whole column looks fractional
    Percentage,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub field: CanonicalField,
    pub patterns: &'static [&'static str],
    pub required: bool,
    pub domain: FieldDomain,
    pub unit: &'static str,
}

impl CanonicalField {
    /// Every field in catalog order
    pub const ALL: [CanonicalField; 14] = [
        CanonicalField::Date,
        CanonicalField::EnergyExport,
        CanonicalField::AvailabilityPct,
        CanonicalField::PerformanceRatioPct,
        CanonicalField::CapacityUtilizationPct,
        CanonicalField::IrradianceGhi,
        CanonicalField::IrradiancePoa,
        CanonicalField::AmbientTemp,
        CanonicalField::ModuleTemp,
        CanonicalField::WindSpeedAvg,
        CanonicalField::WindSpeedMax,
        CanonicalField::CapacityMw,
        CanonicalField::NetExport,
        CanonicalField::ImportKwh,
    ];

    /// Every value-carrying field (everything but the date)
    pub fn value_fields() -> impl Iterator<Item = CanonicalField> {
        Self::ALL.into_iter().filter(|f| *f != CanonicalField::Date)
    }

    pub fn name(&self) -> &'static str {
        match self {
            CanonicalField::Date => "date",
            CanonicalField::EnergyExport => "energy_export",
            CanonicalField::AvailabilityPct => "availability_pct",
            CanonicalField::PerformanceRatioPct => "performance_ratio_pct",
            CanonicalField::CapacityUtilizationPct => "capacity_utilization_pct",
            CanonicalField::IrradianceGhi => "irradiance_ghi",
            CanonicalField::IrradiancePoa => "irradiance_poa",
            CanonicalField::AmbientTemp => "ambient_temp",
            CanonicalField::ModuleTemp => "module_temp",
            CanonicalField::WindSpeedAvg => "wind_speed_avg",
            CanonicalField::WindSpeedMax => "wind_speed_max",
            CanonicalField::CapacityMw => "capacity_mw",
            CanonicalField::NetExport => "net_export",
            CanonicalField::ImportKwh => "import_kwh",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    pub fn spec(&self) -> FieldSpec {
        use CanonicalField::*;
        use FieldDomain::*;

        let (patterns, required, domain, unit): (&'static [&'static str], bool, FieldDomain, &'static str) =
            match self {
                Date => (&["date", "Date", "DATE"], true, Datetime, ""),
                EnergyExport => (
                    &["Mtr_Export (kWh)", "Mtr_Export(kWh)", "Export", "Energy Export"],
                    true,
                    Numeric,
                    "kWh",
                ),
                AvailabilityPct => (
                    &["PA(%)", "PA (%)", "Plant Availability", "Availability", "PA"],
                    true,
                    Percentage,
                    "%",
                ),
                PerformanceRatioPct => (
                    &["PR(%)", "PR (%)", "Performance Ratio", "PR"],
                    false,
                    Percentage,
                    "%",
                ),
                CapacityUtilizationPct => (
                    &["CUF(%)", "CUF (%)", "Capacity Utilization", "CUF"],
                    false,
                    Percentage,
                    "%",
                ),
                IrradianceGhi => (
                    &["GHI-UP (KWh/m2)", "GHI-UP(KWh/m2)", "GHI UP", "GHI"],
                    false,
                    Numeric,
                    "kWh/m2",
                ),
                IrradiancePoa => (
                    &["POA-UP(KWh/m2)", "POA-UP (KWh/m2)", "POA UP", "POA"],
                    false,
                    Numeric,
                    "kWh/m2",
                ),
                AmbientTemp => (
                    &["Amb_Temp(°C)", "Amb_Temp (°C)", "Ambient Temperature", "Temp"],
                    false,
                    Numeric,
                    "°C",
                ),
                ModuleTemp => (
                    &["Mod_Temp(°C)", "Mod_Temp (°C)", "Module Temperature"],
                    false,
                    Numeric,
                    "°C",
                ),
                WindSpeedAvg => (
                    &["WS_Avg(m/s)", "WS_Avg (m/s)", "Wind Speed Avg", "Wind Speed"],
                    false,
                    Numeric,
                    "m/s",
                ),
                WindSpeedMax => (
                    &["WS_Max(m/s)", "WS_Max (m/s)", "Wind Speed Max"],
                    false,
                    Numeric,
                    "m/s",
                ),
                CapacityMw => (
                    &["Operational Capacity (MW)", "Operational Capacity(MW)", "Capacity"],
                    false,
                    Numeric,
                    "MW",
                ),
                NetExport => (
                    &["Mtr_Net_Exp (KWh)", "Mtr_Net_Exp(KWh)", "Net Export"],
                    false,
                    Numeric,
                    "kWh",
                ),
                ImportKwh => (
                    &["Mtr_Import (kWh)", "Mtr_Import(kWh)", "Import"],
                    false,
                    Numeric,
                    "kWh",
                ),
            };

        FieldSpec {
            field: *self,
            patterns,
            required,
            domain,
            unit,
        }
    }

    pub fn is_required(&self) -> bool {
        self.spec().required
    }

    pub fn unit(&self) -> &'static str {
        self.spec().unit
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The full catalog in iteration order
pub fn field_catalog() -> Vec<FieldSpec> {
    CanonicalField::ALL.iter().map(|f| f.spec()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_fields() {
        let required: Vec<CanonicalField> = field_catalog()
            .into_iter()
            .filter(|s| s.required)
            .map(|s| s.field)
            .collect();
        assert_eq!(
            required,
            vec![
                CanonicalField::Date,
                CanonicalField::EnergyExport,
                CanonicalField::AvailabilityPct
            ]
        );
    }

    #[test]
    fn test_name_round_trip() {
        for field in CanonicalField::ALL {
            assert_eq!(CanonicalField::from_name(field.name()), Some(field));
        }
        assert_eq!(CanonicalField::from_name("voltage"), None);
    }

    #[test]
    fn test_percentage_domain() {
        assert_eq!(CanonicalField::AvailabilityPct.spec().domain, FieldDomain::Percentage);
        assert_eq!(CanonicalField::EnergyExport.spec().domain, FieldDomain::Numeric);
        assert_eq!(CanonicalField::Date.spec().domain, FieldDomain::Datetime);
    }
}
