// Raw telemetry resources served next to the dashboard snapshot
use serde::{Deserialize, Serialize};

use super::dashboard::ModuleStatus;

/// One stored rectifier row, as the backend's record endpoints return it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RectifierRecord {
    pub id: i64,
    /// Epoch milliseconds reported by the site.
    pub timestamp: i64,

    pub site_name: String,
    pub project_id: String,
    pub ladder: String,
    pub sla: String,
    pub status_realtime: String,
    pub status_ladder: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,

    pub door_cabinet: String,
    pub battery_stolen: String,
    pub temperature: f64,
    pub humidity: f64,

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

    pub battery_bank_1_voltage: f64,
    pub battery_bank_1_current: f64,
    pub battery_bank_1_soc: f64,
    pub battery_bank_1_soh: f64,
    pub battery_bank_2_voltage: f64,
    pub battery_bank_2_current: f64,
    pub battery_bank_2_soc: f64,
    pub battery_bank_2_soh: f64,
    pub battery_bank_3_voltage: f64,
    pub battery_bank_3_current: f64,
    pub battery_bank_3_soc: f64,
    pub battery_bank_3_soh: f64,

    pub backup_duration: Option<i64>,
    pub time_remaining: Option<i64>,
    pub battery_status: String,
    pub start_backup: String,
    pub soc_avg: f64,

    #[serde(default)]
    pub modules_status: Vec<ModuleStatus>,
    pub created_at: String,
}

/// Aggregates over every stored record. All `None` when the store is empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RectifierStats {
    pub avg_vdc_output: Option<f64>,
    pub max_vdc_output: Option<f64>,
    pub min_vdc_output: Option<f64>,
    pub avg_load_current: Option<f64>,
    pub max_load_current: Option<f64>,
    pub avg_temperature: Option<f64>,
    pub avg_humidity: Option<f64>,
}

/// Parallel columns, oldest sample first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub timestamps: Vec<i64>,
    pub vdc_output: Vec<f64>,
    pub load_current: Vec<f64>,
    pub temperature: Vec<f64>,
    pub humidity: Vec<f64>,
}
