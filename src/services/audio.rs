use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SetVolumesParams {
    /// Playback volume in percent (0-100).
    pub playback: u8,
    /// Capture volume in percent (0-100).
    pub capture: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SelectDeviceParams {
    /// Driver name as reported by `get_volumes` / the device list.
    pub driver_name: String,
}

define_service! {
    /// Sound card volumes and device selection.
    AudioService => "audio": "Playback and capture devices, volumes" {
        set_volumes(SetVolumesParams) => "set_volumes": "Set playback and capture volumes.";
        get_volumes => "get_volumes": "Read current playback and capture volumes.";
        select_device(SelectDeviceParams) => "select_device": "Switch the active audio device.";
        test_playing => "test_playing": "Play a test sound on the active device.";
        test_recording => "test_recording": "Record and play back a short sample.";
    }
}
