//! Remote GPIO control messages.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::wire::{RawField, WireMessage, WireWriter};

/// Highest addressable GPIO pin.
pub const MAX_GPIO_PIN: u8 = 63;

/// Operation carried by a remote hardware message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HardwareOperation {
    #[default]
    Unset,
    WriteGpios,
    WatchGpios,
    GpiosChanged,
    ReadGpios,
    ReadGpiosReply,
    Other(u32),
}

impl HardwareOperation {
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => HardwareOperation::Unset,
            1 => HardwareOperation::WriteGpios,
            2 => HardwareOperation::WatchGpios,
            3 => HardwareOperation::GpiosChanged,
            4 => HardwareOperation::ReadGpios,
            5 => HardwareOperation::ReadGpiosReply,
            other => HardwareOperation::Other(other),
        }
    }

    pub fn code(self) -> u32 {
        match self {
            HardwareOperation::Unset => 0,
            HardwareOperation::WriteGpios => 1,
            HardwareOperation::WatchGpios => 2,
            HardwareOperation::GpiosChanged => 3,
            HardwareOperation::ReadGpios => 4,
            HardwareOperation::ReadGpiosReply => 5,
            HardwareOperation::Other(code) => code,
        }
    }
}

impl fmt::Display for HardwareOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HardwareOperation::Unset => f.write_str("UNSET"),
            HardwareOperation::WriteGpios => f.write_str("WRITE_GPIOS"),
            HardwareOperation::WatchGpios => f.write_str("WATCH_GPIOS"),
            HardwareOperation::GpiosChanged => f.write_str("GPIOS_CHANGED"),
            HardwareOperation::ReadGpios => f.write_str("READ_GPIOS"),
            HardwareOperation::ReadGpiosReply => f.write_str("READ_GPIOS_REPLY"),
            HardwareOperation::Other(code) => write!(f, "UNKNOWN({code})"),
        }
    }
}

/// Decoded remote hardware payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RemoteHardware {
    pub operation: HardwareOperation,
    pub gpio_mask: u64,
    pub gpio_value: u64,
}

impl WireMessage for RemoteHardware {
    fn merge_field(&mut self, field: &RawField<'_>) {
        match field.number {
            1 => {
                if let Some(code) = field.uint32() {
                    self.operation = HardwareOperation::from_code(code);
                }
            }
            2 => self.gpio_mask = field.varint().unwrap_or(self.gpio_mask),
            3 => self.gpio_value = field.varint().unwrap_or(self.gpio_value),
            _ => {}
        }
    }
}

impl RemoteHardware {
    /// Request setting each `(pin, high)` pair. Pins above 63 are ignored.
    pub fn write_gpios(pins: &[(u8, bool)]) -> Self {
        let mut message = Self { operation: HardwareOperation::WriteGpios, ..Self::default() };
        for &(pin, high) in pins.iter().filter(|(pin, _)| *pin <= MAX_GPIO_PIN) {
            message.gpio_mask |= 1u64 << pin;
            if high {
                message.gpio_value |= 1u64 << pin;
            }
        }
        message
    }

    pub fn watch_gpios(pins: &[u8]) -> Self {
        Self::with_mask(HardwareOperation::WatchGpios, pins)
    }

    pub fn read_gpios(pins: &[u8]) -> Self {
        Self::with_mask(HardwareOperation::ReadGpios, pins)
    }

    fn with_mask(operation: HardwareOperation, pins: &[u8]) -> Self {
        let gpio_mask =
            pins.iter().filter(|pin| **pin <= MAX_GPIO_PIN).fold(0u64, |mask, pin| mask | (1u64 << pin));
        Self { operation, gpio_mask, gpio_value: 0 }
    }

    /// Pins selected by the mask, ascending.
    pub fn affected_gpios(&self) -> Vec<u8> {
        (0..=MAX_GPIO_PIN).filter(|pin| self.gpio_mask & (1u64 << pin) != 0).collect()
    }

    /// Level of every selected pin (`true` = high).
    pub fn gpio_states(&self) -> BTreeMap<u8, bool> {
        self.affected_gpios().into_iter().map(|pin| (pin, self.gpio_value & (1u64 << pin) != 0)).collect()
    }

    /// One-line summary such as `Write: GPIO0=HIGH, GPIO3=LOW`.
    pub fn format_gpio_info(&self) -> String {
        let pins = self.affected_gpios();
        if pins.is_empty() {
            return "No GPIOs".to_string();
        }

        let with_levels = || {
            pins.iter()
                .map(|pin| {
                    let level = if self.gpio_value & (1u64 << pin) != 0 { "HIGH" } else { "LOW" };
                    format!("GPIO{pin}={level}")
                })
                .collect::<Vec<_>>()
                .join(", ")
        };
        let names = || pins.iter().map(|pin| format!("GPIO{pin}")).collect::<Vec<_>>().join(", ");

        match self.operation {
            HardwareOperation::WriteGpios => format!("Write: {}", with_levels()),
            HardwareOperation::WatchGpios => format!("Watch: {}", names()),
            HardwareOperation::GpiosChanged => format!("Changed: {}", with_levels()),
            HardwareOperation::ReadGpios => format!("Read: {}", names()),
            HardwareOperation::ReadGpiosReply => format!("Reply: {}", with_levels()),
            HardwareOperation::Unset | HardwareOperation::Other(_) => format!("GPIOs: {}", names()),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut writer = WireWriter::new();
        writer.varint(1, u64::from(self.operation.code()));
        if self.gpio_mask != 0 {
            writer.varint(2, self.gpio_mask);
        }
        if self.gpio_value != 0 {
            writer.varint(3, self.gpio_value);
        }
        writer.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::Decoded;

    #[test]
    fn decodes_mask_and_value() {
        // type=GPIOS_CHANGED, mask=0b1001, value=0b0001
        let decoded = RemoteHardware::decode(&[0x08, 0x03, 0x10, 0x09, 0x18, 0x01]);
        let message = *decoded.value();
        assert!(decoded.is_complete());
        assert_eq!(message.operation, HardwareOperation::GpiosChanged);
        assert_eq!(message.affected_gpios(), vec![0, 3]);
        assert_eq!(message.format_gpio_info(), "Changed: GPIO0=HIGH, GPIO3=LOW");
    }

    #[test]
    fn builders_ignore_out_of_range_pins() {
        let write = RemoteHardware::write_gpios(&[(0, true), (5, false), (64, true)]);
        assert_eq!(write.gpio_mask, 0b10_0001);
        assert_eq!(write.gpio_value, 0b1);
        assert_eq!(write.format_gpio_info(), "Write: GPIO0=HIGH, GPIO5=LOW");

        let watch = RemoteHardware::watch_gpios(&[63, 2]);
        assert_eq!(watch.affected_gpios(), vec![2, 63]);
        assert_eq!(watch.format_gpio_info(), "Watch: GPIO2, GPIO63");

        assert_eq!(RemoteHardware::read_gpios(&[]).format_gpio_info(), "No GPIOs");
    }

    #[test]
    fn encoded_request_decodes_back() {
        let request = RemoteHardware::write_gpios(&[(1, true), (40, true)]);
        assert_eq!(RemoteHardware::decode(&request.encode()), Decoded::Complete(request));
    }

    #[test]
    fn unknown_operation_codes_are_kept() {
        let message = RemoteHardware { operation: HardwareOperation::from_code(9), gpio_mask: 1, gpio_value: 0 };
        assert_eq!(message.operation.to_string(), "UNKNOWN(9)");
        assert_eq!(message.format_gpio_info(), "GPIOs: GPIO0");
        assert_eq!(message.gpio_states().get(&0), Some(&false));
    }
}
