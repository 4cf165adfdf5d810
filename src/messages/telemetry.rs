//! Telemetry reports and their metric groups.

use serde::Serialize;

use crate::wire::{RawField, WireMessage};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DeviceMetrics {
    /// Percent, 101 means external power.
    pub battery_level: Option<u32>,
    pub voltage: Option<f32>,
    pub channel_utilization: Option<f32>,
    pub air_util_tx: Option<f32>,
    pub uptime_seconds: Option<u32>,
}

impl WireMessage for DeviceMetrics {
    fn merge_field(&mut self, field: &RawField<'_>) {
        match field.number {
            1 => self.battery_level = field.uint32().or(self.battery_level),
            2 => self.voltage = field.float().or(self.voltage),
            3 => self.channel_utilization = field.float().or(self.channel_utilization),
            4 => self.air_util_tx = field.float().or(self.air_util_tx),
            5 => self.uptime_seconds = field.uint32().or(self.uptime_seconds),
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct EnvironmentMetrics {
    /// Degrees Celsius.
    pub temperature: Option<f32>,
    pub relative_humidity: Option<f32>,
    /// Hectopascal.
    pub barometric_pressure: Option<f32>,
    /// Megaohm.
    pub gas_resistance: Option<f32>,
}

impl WireMessage for EnvironmentMetrics {
    fn merge_field(&mut self, field: &RawField<'_>) {
        match field.number {
            1 => self.temperature = field.float().or(self.temperature),
            2 => self.relative_humidity = field.float().or(self.relative_humidity),
            3 => self.barometric_pressure = field.float().or(self.barometric_pressure),
            4 => self.gas_resistance = field.float().or(self.gas_resistance),
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AirQualityMetrics {
    pub pm10_standard: Option<u32>,
    pub pm25_standard: Option<u32>,
    pub pm100_standard: Option<u32>,
}

impl WireMessage for AirQualityMetrics {
    fn merge_field(&mut self, field: &RawField<'_>) {
        match field.number {
            1 => self.pm10_standard = field.uint32().or(self.pm10_standard),
            2 => self.pm25_standard = field.uint32().or(self.pm25_standard),
            3 => self.pm100_standard = field.uint32().or(self.pm100_standard),
            _ => {}
        }
    }
}

/// Voltage and current for up to three monitored channels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PowerMetrics {
    pub voltages: [Option<f32>; 3],
    pub currents: [Option<f32>; 3],
}

impl WireMessage for PowerMetrics {
    fn merge_field(&mut self, field: &RawField<'_>) {
        let Some(value) = field.float() else { return };
        match field.number {
            number @ (1 | 3 | 5) => self.voltages[(number as usize - 1) / 2] = Some(value),
            number @ (2 | 4 | 6) => self.currents[(number as usize - 2) / 2] = Some(value),
            _ => {}
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Telemetry {
    pub time: Option<u32>,
    pub device_metrics: Option<DeviceMetrics>,
    pub environment_metrics: Option<EnvironmentMetrics>,
    pub air_quality_metrics: Option<AirQualityMetrics>,
    pub power_metrics: Option<PowerMetrics>,
}

impl WireMessage for Telemetry {
    fn merge_field(&mut self, field: &RawField<'_>) {
        match field.number {
            1 => self.time = field.fixed32().or(self.time),
            2 => {
                if let Some(metrics) = field.message::<DeviceMetrics>() {
                    self.device_metrics = Some(metrics.into_value());
                }
            }
            3 => {
                if let Some(metrics) = field.message::<EnvironmentMetrics>() {
                    self.environment_metrics = Some(metrics.into_value());
                }
            }
            4 => {
                if let Some(metrics) = field.message::<AirQualityMetrics>() {
                    self.air_quality_metrics = Some(metrics.into_value());
                }
            }
            5 => {
                if let Some(metrics) = field.message::<PowerMetrics>() {
                    self.power_metrics = Some(metrics.into_value());
                }
            }
            _ => {}
        }
    }
}

impl Telemetry {
    /// Whether any metric group was present; used to accept a speculative decode.
    pub fn has_metrics(&self) -> bool {
        self.device_metrics.is_some()
            || self.environment_metrics.is_some()
            || self.air_quality_metrics.is_some()
            || self.power_metrics.is_some()
    }
}
