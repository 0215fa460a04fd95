// Dashboard domain model - the snapshot the sync loop holds and renderers consume
use chrono::Local;
use serde::{Deserialize, Serialize};
use serde_json::Number;

/// Site name shown until the first successful poll lands.
pub const LOADING_SITE_NAME: &str = "Loading...";

/// Format of `SiteInfo::last_data`, second precision.
pub const LAST_DATA_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Declares a string-backed enum that keeps unknown wire values verbatim.
macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $($variant,)+
            Other(String),
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                match self {
                    $(Self::$variant => $text,)+
                    Self::Other(raw) => raw.as_str(),
                }
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                match raw.as_str() {
                    $($text => Self::$variant,)+
                    _ => Self::Other(raw),
                }
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                match value {
                    $name::Other(raw) => raw,
                    known => known.as_str().to_string(),
                }
            }
        }
    };
}

wire_enum!(
    /// Realtime and ladder status of a site.
    SiteStatus {
        Normal => "Normal",
        Warning => "Warning",
        Alarm => "Alarm",
        Over => "Over",
        Under => "Under",
    }
);

wire_enum!(
    /// Binary contact sensor (cabinet door, battery compartment).
    SensorState {
        Open => "Open",
        Close => "Close",
    }
);

wire_enum!(
    ModuleHealth {
        Normal => "Normal",
        Fault => "Fault",
        Protect => "Protect",
        AcOff => "AC Off",
    }
);

wire_enum!(
    BatteryState {
        Standby => "Standby",
        Charging => "Charging",
        Discharging => "Discharging",
    }
);

impl SiteStatus {
    pub fn is_alarm(&self) -> bool {
        matches!(self, Self::Alarm)
    }
}

/// Kept as raw JSON numbers: the backend sends integer `0` for a site
/// without coordinates and that must re-encode as `0`, not `0.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: Number,
    pub lng: Number,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteInfo {
    pub site_name: String,
    pub project_id: String,
    pub ladder: String,
    pub sla: String,
    pub status_realtime: SiteStatus,
    pub status_ladder: SiteStatus,
    pub last_data: String,
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    pub door_cabinet: SensorState,
    pub battery_stolen: SensorState,
    pub temperature: f64,
    pub humidity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleStatus {
    pub id: u32,
    pub status: ModuleHealth,
    pub value: String,
}

impl ModuleStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self.status, ModuleHealth::Normal)
    }
}

/// Rectifier electrical readings. `None` marks a phase the site's
/// topology does not have, never a failed measurement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RectifierStatus {
    pub vac_input_l1: f64,
    pub vac_input_l2: f64,
    pub vac_input_l3: Option<f64>,
    pub vdc_output: f64,
    pub battery_current: f64,
    pub iac_input_l1: Option<f64>,
    pub iac_input_l2: Option<f64>,
    pub iac_input_l3: Option<f64>,
    pub load_current: f64,
    pub load_power: f64,
    pub pac_load_l1: f64,
    pub pac_load_l2: f64,
    pub pac_load_l3: f64,
    pub rectifier_current: f64,
    pub total_power: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryBank {
    pub id: u32,
    pub voltage: f64,
    pub current: f64,
    pub soc: f64,
    pub soh: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatteryStatus {
    pub banks: Vec<BatteryBank>,
    /// Minutes; `None` while AC is present.
    pub backup_duration: Option<i64>,
    pub time_remaining: Option<i64>,
    pub status: BatteryState,
    pub start_backup: String,
    pub soc_avg: f64,
}

/// One complete set of readings for a site. Always replaced as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub site_info: SiteInfo,
    pub environment: Environment,
    pub modules: Vec<ModuleStatus>,
    pub rectifier: RectifierStatus,
    pub battery: BatteryStatus,
}

impl DashboardSnapshot {
    /// Well-formed idle snapshot shown before the first successful poll.
    pub fn placeholder() -> Self {
        Self {
            site_info: SiteInfo {
                site_name: LOADING_SITE_NAME.to_string(),
                project_id: String::new(),
                ladder: String::new(),
                sla: String::new(),
                status_realtime: SiteStatus::Normal,
                status_ladder: SiteStatus::Normal,
                last_data: Local::now().format(LAST_DATA_FORMAT).to_string(),
                location: Location {
                    lat: Number::from(0),
                    lng: Number::from(0),
                },
            },
            environment: Environment {
                door_cabinet: SensorState::Close,
                battery_stolen: SensorState::Close,
                temperature: 0.0,
                humidity: 0.0,
            },
            modules: Vec::new(),
            rectifier: RectifierStatus {
                vac_input_l1: 0.0,
                vac_input_l2: 0.0,
                vac_input_l3: None,
                vdc_output: 0.0,
                battery_current: 0.0,
                iac_input_l1: None,
                iac_input_l2: None,
                iac_input_l3: None,
                load_current: 0.0,
                load_power: 0.0,
                pac_load_l1: 0.0,
                pac_load_l2: 0.0,
                pac_load_l3: 0.0,
                rectifier_current: 0.0,
                total_power: 0.0,
            },
            battery: BatteryStatus {
                banks: Vec::new(),
                backup_duration: None,
                time_remaining: None,
                status: BatteryState::Standby,
                start_backup: "No data".to_string(),
                soc_avg: 0.0,
            },
        }
    }

    pub fn healthy_module_count(&self) -> usize {
        self.modules.iter().filter(|m| m.is_healthy()).count()
    }
}
