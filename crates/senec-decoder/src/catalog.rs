use crate::{ReadingSpec, SelectionPolicy};

const fn reading(
    id: &'static str,
    path: &'static str,
    display_name: &'static str,
    unit: Option<&'static str>,
    icon: &'static str,
    policy: SelectionPolicy,
) -> ReadingSpec {
    ReadingSpec {
        id,
        path,
        display_name,
        unit,
        icon,
        policy,
    }
}

static READINGS: [ReadingSpec; 19] = [
    reading(
        "stat_state",
        "STATISTIC.CURRENT_STATE",
        "System State",
        None,
        "mdi:solar-power",
        SelectionPolicy::EnumeratedState,
    ),
    reading(
        "solar_power",
        "ENERGY.GUI_INVERTER_POWER",
        "Solar Generated Power",
        Some("W"),
        "mdi:solar-power",
        SelectionPolicy::Magnitude,
    ),
    reading(
        "house_power",
        "ENERGY.GUI_HOUSE_POW",
        "House Power",
        Some("W"),
        "mdi:home-import-outline",
        SelectionPolicy::Raw,
    ),
    reading(
        "battery_state_power",
        "ENERGY.GUI_BAT_DATA_POWER",
        "Battery State Power",
        Some("W"),
        "mdi:home-battery",
        SelectionPolicy::Raw,
    ),
    reading(
        "battery_charge",
        "ENERGY.GUI_BAT_DATA_POWER",
        "Battery Charge Power",
        Some("W"),
        "mdi:home-battery",
        SelectionPolicy::PositiveOnly,
    ),
    reading(
        "battery_discharge",
        "ENERGY.GUI_BAT_DATA_POWER",
        "Battery Discharge Power",
        Some("W"),
        "mdi:home-battery-outline",
        SelectionPolicy::NegativeMagnitude,
    ),
    reading(
        "battery_level",
        "ENERGY.GUI_BAT_DATA_FUEL_CHARGE",
        "Battery Charge Percent",
        Some("%"),
        "mdi:battery",
        SelectionPolicy::BatteryLevel,
    ),
    reading(
        "grid_power",
        "ENERGY.GUI_GRID_POW",
        "Grid Power",
        Some("W"),
        "mdi:transmission-tower",
        SelectionPolicy::Raw,
    ),
    reading(
        "grid_import",
        "ENERGY.GUI_GRID_POW",
        "Grid Imported Power",
        Some("W"),
        "mdi:transmission-tower-export",
        SelectionPolicy::PositiveOnly,
    ),
    reading(
        "grid_export",
        "ENERGY.GUI_GRID_POW",
        "Grid Exported Power",
        Some("W"),
        "mdi:transmission-tower-import",
        SelectionPolicy::NegativeMagnitude,
    ),
    reading(
        "battery_voltage",
        "ENERGY.GUI_BAT_DATA_VOLTAGE",
        "Battery Voltage",
        Some("V"),
        "mdi:current-dc",
        SelectionPolicy::Raw,
    ),
    reading(
        "battery_current",
        "ENERGY.GUI_BAT_DATA_CURRENT",
        "Battery Current",
        Some("A"),
        "mdi:current-dc",
        SelectionPolicy::Raw,
    ),
    reading(
        "live_grid_import",
        "STATISTIC.LIVE_GRID_IMPORT",
        "Grid Imported Energy",
        Some("kWh"),
        "mdi:transmission-tower-export",
        SelectionPolicy::Raw,
    ),
    reading(
        "live_grid_export",
        "STATISTIC.LIVE_GRID_EXPORT",
        "Grid Exported Energy",
        Some("kWh"),
        "mdi:transmission-tower-import",
        SelectionPolicy::Raw,
    ),
    reading(
        "live_house_cons",
        "STATISTIC.LIVE_HOUSE_CONS",
        "House Consumed Energy",
        Some("kWh"),
        "mdi:home-import-outline",
        SelectionPolicy::Raw,
    ),
    reading(
        "live_pv_gen",
        "STATISTIC.LIVE_PV_GEN",
        "Solar Generated Energy",
        Some("kWh"),
        "mdi:solar-power",
        SelectionPolicy::Raw,
    ),
    reading(
        "live_bat_charge",
        "STATISTIC.LIVE_BAT_CHARGE",
        "Battery Charged Energy",
        Some("kWh"),
        "mdi:home-battery",
        SelectionPolicy::Raw,
    ),
    reading(
        "live_bat_discharge",
        "STATISTIC.LIVE_BAT_DISCHARGE",
        "Battery Discharged Energy",
        Some("kWh"),
        "mdi:home-battery-outline",
        SelectionPolicy::Raw,
    ),
    reading(
        "bms_module_count",
        "BMS.MODULE_COUNT",
        "Battery Module Count",
        None,
        "mdi:battery-unknown",
        SelectionPolicy::Raw,
    ),
];

/// Device state labels, indexed by `STATISTIC.CURRENT_STATE`.
pub const SYSTEM_STATES: &[&str] = &[
    "INITIAL STATE",
    "ERROR INVERTER COMMUNICATION",
    "ERROR ELECTRICY METER",
    "RIPPLE CONTROL RECEIVER",
    "INITIAL CHARGE",
    "MAINTENANCE CHARGE",
    "MAINTENANCE READY",
    "MAINTENANCE REQUIRED",
    "MAN. SAFETY CHARGE",
    "SAFETY CHARGE READY",
    "FULL CHARGE",
    "EQUALIZATION: CHARGE",
    "DESULFATATION: CHARGE",
    "BATTERY FULL",
    "CHARGE",
    "BATTERY EMPTY",
    "DISCHARGE",
    "PV + DISCHARGE",
    "GRID + DISCHARGE",
    "PASSIVE",
    "OFF",
    "OWN CONSUMPTION",
    "RESTART",
    "MAN. EQUALIZATION: CHARGE",
    "MAN. DESULFATATION: CHARGE",
    "SAFETY SHUTDOWN",
    "BATTERY PROTECTION MODE",
    "EG ERROR",
    "EG CHARGE",
    "EG DISCHARGE",
    "EG PASSIVE",
    "EG PROHIBIT CHARGE",
    "EG PROHIBIT DISCHARGE",
    "EMERGANCY CHARGE",
    "SOFTWARE UPDATE",
    "NSP ERROR",
    "NSP ERROR: GRID",
    "NSP ERROR: HARDWRE",
    "NO SERVER CONNECTION",
    "BMS ERROR",
    "MAINTENANCE: FILTER",
    "SLEEPING MODE",
    "WAITING EXCESS",
    "CAPACITY TEST: CHARGE",
    "CAPACITY TEST: DISCHARGE",
    "MAN. DESULFATATION: WAIT",
    "MAN. DESULFATATION: READY",
    "MAN. DESULFATATION: ERROR",
    "EQUALIZATION: WAIT",
    "EMERGANCY CHARGE: ERROR",
    "MAN. EQUALIZATION: WAIT",
    "MAN. EQUALIZATION: ERROR",
    "MAN: EQUALIZATION: READY",
    "AUTO. DESULFATATION: WAIT",
    "ABSORPTION PHASE",
    "DC-SWITCH OFF",
    "PEAK-SHAVING: WAIT",
    "ERROR BATTERY INVERTER",
    "NPU-ERROR",
    "BMS-OFFLINE",
    "MAINTENANCE CHARGE ERROR",
    "MAN. SAFETY CHARGE ERROR",
    "SAFETY CHARGE ERROR",
    "NO CONNECTION TO MASTER",
    "LITHIUM SAFE MODE ACTIVE",
    "LITHIUM SAFE MODE DONE",
    "BATTERY VOLTAGE ERROR",
    "BMS DC SWITCHED OFF",
    "GRID INITIALIZATION",
    "GRID STABILIZATION",
    "REMOTE SHUTDOWN",
    "OFFPEAK-CHARGE",
    "ERROR HALFBRIDGE",
    "BMS: ERROR OPERATING TEMPERATURE",
    "FACOTRY SETTINGS NOT FOUND",
    "BACKUP POWER MODE - ACTIVE",
    "BACKUP POWER MODE - BATTERY EMPTY",
    "BACKUP POWER MODE ERROR",
    "INITIALISING",
    "INSTALLATION MODE",
    "GRID OFFLINE",
    "BMS UPDATE NEEDED",
    "BMS CONFIGURATION NEEDED",
    "INSULATION TEST",
    "SELFTEST",
    "EXTERNAL CONTROL",
    "ERROR: TEMPERATURESENSOR",
    "GRID OPERATOR: CHARGE PROHIBITED",
    "GRID OPERATOR: DISCHARGE PROHIBITED",
    "SPARE CAPACITY",
    "SELFTEST ERROR",
    "EARTH FAULT",
];

pub fn reading_specs() -> &'static [ReadingSpec] {
    &READINGS
}

pub fn find_spec(id: &str) -> Option<&'static ReadingSpec> {
    READINGS.iter().find(|spec| spec.id == id)
}

pub fn known_reading_ids() -> impl Iterator<Item = &'static str> {
    READINGS.iter().map(|spec| spec.id)
}

pub fn system_state_label(index: usize) -> Option<&'static str> {
    SYSTEM_STATES.get(index).copied()
}
