use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct BpmParams {
    /// Beats per minute.
    pub bpm: u16,
}

define_service! {
    MetronomeService => "metronome": "Metronome playback" {
        start(BpmParams) => "start": "Start ticking at the given tempo.";
        stop => "stop": "Stop ticking.";
        set_bpm(BpmParams) => "set_bpm": "Change tempo without stopping.";
        get_status => "get_status": "Report whether the metronome runs and at what tempo.";
    }
}
