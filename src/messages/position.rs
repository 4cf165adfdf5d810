//! Position reports.

use serde::Serialize;

use crate::wire::{RawField, WireMessage};

/// Scale between the integer coordinate fields and degrees.
pub const COORDINATE_SCALE: f64 = 1e7;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Position {
    /// Latitude in 1e-7 degrees.
    pub latitude_i: Option<i32>,
    /// Longitude in 1e-7 degrees.
    pub longitude_i: Option<i32>,
    /// Metres above mean sea level.
    pub altitude: Option<i32>,
    pub time: Option<u32>,
    pub location_source: Option<u32>,
    pub altitude_source: Option<u32>,
    pub timestamp: Option<u32>,
    pub pdop: Option<u32>,
    pub ground_speed: Option<u32>,
    pub ground_track: Option<u32>,
    pub sats_in_view: Option<u32>,
    pub precision_bits: Option<u32>,
}

impl WireMessage for Position {
    fn merge_field(&mut self, field: &RawField<'_>) {
        match field.number {
            1 => self.latitude_i = field.sfixed32().or(self.latitude_i),
            2 => self.longitude_i = field.sfixed32().or(self.longitude_i),
            3 => self.altitude = field.int32().or(self.altitude),
            4 => self.time = field.fixed32().or(self.time),
            5 => self.location_source = field.uint32().or(self.location_source),
            6 => self.altitude_source = field.uint32().or(self.altitude_source),
            7 => self.timestamp = field.fixed32().or(self.timestamp),
            11 => self.pdop = field.uint32().or(self.pdop),
            15 => self.ground_speed = field.uint32().or(self.ground_speed),
            16 => self.ground_track = field.uint32().or(self.ground_track),
            19 => self.sats_in_view = field.uint32().or(self.sats_in_view),
            23 => self.precision_bits = field.uint32().or(self.precision_bits),
            _ => {}
        }
    }
}

impl Position {
    /// Whether any coordinate was present; used to accept a speculative decode.
    pub fn has_fix(&self) -> bool {
        self.latitude_i.is_some() || self.longitude_i.is_some() || self.altitude.is_some()
    }

    pub fn latitude_degrees(&self) -> Option<f64> {
        self.latitude_i.map(|value| f64::from(value) / COORDINATE_SCALE)
    }

    pub fn longitude_degrees(&self) -> Option<f64> {
        self.longitude_i.map(|value| f64::from(value) / COORDINATE_SCALE)
    }
}
