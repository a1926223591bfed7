//! Wire types for `xcrun simctl list devices --json`.

use std::collections::BTreeMap;

use serde::Deserialize;

#[derive(Clone, Debug, Deserialize)]
pub(super) struct SimctlDeviceList {
    #[serde(default)]
    pub(super) devices: BTreeMap<String, Vec<SimctlDevice>>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SimctlDevice {
    pub(super) name: String,
    pub(super) udid: String,
    #[serde(default)]
    pub(super) device_type_identifier: String,
    #[serde(default)]
    pub(super) log_path: String,
    #[serde(default = "available_by_default")]
    pub(super) is_available: bool,
}

const fn available_by_default() -> bool {
    true
}
