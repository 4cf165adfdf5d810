//! Node identity: user records, node database entries and local device info.

use serde::Serialize;

use crate::wire::{RawField, WireMessage};

/// Identity a node announces about itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct User {
    /// Textual id, conventionally `!` followed by eight hex digits.
    pub id: String,
    pub long_name: String,
    pub short_name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub macaddr: Vec<u8>,
    pub hw_model: Option<u32>,
    pub is_licensed: bool,
    pub role: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub public_key: Vec<u8>,
    pub is_unmessagable: bool,
}

impl WireMessage for User {
    fn merge_field(&mut self, field: &RawField<'_>) {
        match field.number {
            1 => self.id = field.string().unwrap_or_else(|| std::mem::take(&mut self.id)),
            2 => self.long_name = field.string().unwrap_or_else(|| std::mem::take(&mut self.long_name)),
            3 => self.short_name = field.string().unwrap_or_else(|| std::mem::take(&mut self.short_name)),
            4 => {
                if let Some(mac) = field.bytes() {
                    self.macaddr = mac.to_vec();
                }
            }
            5 => self.hw_model = field.uint32().or(self.hw_model),
            6 => self.is_licensed = field.bool().unwrap_or(self.is_licensed),
            7 => self.role = field.uint32().or(self.role),
            8 => {
                if let Some(key) = field.bytes() {
                    self.public_key = key.to_vec();
                }
            }
            9 => self.is_unmessagable = field.bool().unwrap_or(self.is_unmessagable),
            _ => {}
        }
    }
}

impl User {
    /// Whether any of the three identity strings is set.
    pub fn has_identity(&self) -> bool {
        !self.id.is_empty() || !self.long_name.is_empty() || !self.short_name.is_empty()
    }

    pub fn hardware_model_name(&self) -> Option<&'static str> {
        self.hw_model.and_then(hardware_model_name)
    }
}

/// Entry from the device's node database.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NodeRecord {
    pub num: Option<u32>,
    pub user: Option<User>,
    pub snr: Option<f32>,
    pub last_heard: Option<u32>,
}

impl WireMessage for NodeRecord {
    fn merge_field(&mut self, field: &RawField<'_>) {
        match field.number {
            1 => self.num = field.uint32().or(self.num),
            2 => {
                if let Some(user) = field.message::<User>() {
                    self.user = Some(user.into_value());
                }
            }
            4 => self.snr = field.float().or(self.snr),
            5 => self.last_heard = field.fixed32().or(self.last_heard),
            // 3 is the last known position, not tracked here
            _ => {}
        }
    }
}

impl NodeRecord {
    /// Identity with the id derived from the node number when one is present.
    ///
    /// Returns `None` unless at least one identity string ends up set.
    pub fn identity(&self) -> Option<User> {
        let mut user = self.user.clone().unwrap_or_default();
        if let Some(num) = self.num {
            user.id = format!("!{num:08x}");
        }
        user.has_identity().then_some(user)
    }
}

/// Description of the radio this client is attached to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeviceIdentity {
    pub my_node_num: Option<u32>,
    pub reboot_count: Option<u32>,
    pub min_app_version: Option<u32>,
}

impl WireMessage for DeviceIdentity {
    fn merge_field(&mut self, field: &RawField<'_>) {
        match field.number {
            1 => self.my_node_num = field.uint32().or(self.my_node_num),
            8 => self.reboot_count = field.uint32().or(self.reboot_count),
            11 => self.min_app_version = field.uint32().or(self.min_app_version),
            _ => {}
        }
    }
}

/// Name of a well-known hardware model code.
pub fn hardware_model_name(code: u32) -> Option<&'static str> {
    let name = match code {
        0 => "UNSET",
        1 => "TLORA_V2",
        2 => "TLORA_V1",
        3 => "TLORA_V2_1_1P6",
        4 => "TBEAM",
        5 => "HELTEC_V2_0",
        6 => "TBEAM_V0P7",
        7 => "T_ECHO",
        8 => "TLORA_V1_1P3",
        9 => "RAK4631",
        10 => "HELTEC_V2_1",
        11 => "HELTEC_V1",
        12 => "LILYGO_TBEAM_S3_CORE",
        13 => "RAK11200",
        14 => "NANO_G1",
        15 => "TLORA_V2_1_1P8",
        16 => "TLORA_T3_S3",
        17 => "NANO_G1_EXPLORER",
        18 => "NANO_G2_ULTRA",
        43 => "HELTEC_V3",
        44 => "HELTEC_WSL_V3",
        255 => "PRIVATE_HW",
        _ => return None,
    };
    Some(name)
}
