use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SetApiKeyParams {
    /// Weather provider API key.
    pub apikey: String,
}

define_service! {
    WeatherService => "weather": "Current conditions and forecast" {
        get_weather => "get_weather": "Current conditions for the configured location.";
        get_forecast => "get_forecast": "Multi-day forecast for the configured location.";
        set_apikey(SetApiKeyParams) => "set_apikey": "Store the provider API key.";
    }
}
