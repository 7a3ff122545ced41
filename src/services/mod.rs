//! Per-module facades over the dispatch client.
//!
//! Each facade is generated by [`define_service!`]: one method per backend
//! command, each building exactly one envelope and returning the client's
//! [`PendingCommand`] untouched.

pub mod catalog;

use serde::Serialize;
use serde_json::Value;

use crate::dispatcher::{DispatchClient, PendingCommand};
use crate::envelope::CommandEnvelope;

/// Catalog entry for one backend command.
#[derive(Debug, Clone, Serialize)]
pub struct CommandEntry {
    pub module: &'static str,
    pub command: &'static str,
    pub description: &'static str,
    pub param_schema: Value,
}

impl CommandEntry {
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.module, self.command)
    }
}

/// Build the envelope and send it. Encoding failures settle immediately
/// as `InvalidEnvelope`; nothing reaches the transport.
pub(crate) fn dispatch<P: Serialize + ?Sized>(
    client: &DispatchClient,
    module: &'static str,
    command: &'static str,
    params: &P,
) -> PendingCommand {
    match CommandEnvelope::with_params(module, command, params) {
        Ok(envelope) => client.send(envelope),
        Err(err) => PendingCommand::rejected(err),
    }
}

// ── define_service! macro ───────────────────────────────────────

/// Generates a facade struct for one backend module:
/// 1. the struct, holding a `DispatchClient`
/// 2. `MODULE` / `DESCRIPTION` constants
/// 3. one method per command (`fn name(&self[, params]) -> PendingCommand`)
/// 4. `catalog()` — entries with the JSON schema of each param struct
macro_rules! define_service {
    (@method $method:ident ( $params:ty ) => $command:literal, $desc:literal) => {
        #[doc = $desc]
        pub fn $method(&self, params: $params) -> $crate::dispatcher::PendingCommand {
            $crate::services::dispatch(&self.client, Self::MODULE, $command, &params)
        }
    };
    (@method $method:ident => $command:literal, $desc:literal) => {
        #[doc = $desc]
        pub fn $method(&self) -> $crate::dispatcher::PendingCommand {
            $crate::services::dispatch(&self.client, Self::MODULE, $command, &())
        }
    };

    (@schema $params:ty) => {
        $crate::services::catalog::schema_value::<$params>()
    };
    (@schema) => {
        $crate::services::catalog::empty_object_schema()
    };

    (
        $(#[$meta:meta])*
        $service:ident => $module:literal : $mdesc:literal {
            $(
                $method:ident $( ( $params:ty ) )? => $command:literal : $desc:literal ;
            )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone)]
        pub struct $service {
            client: $crate::dispatcher::DispatchClient,
        }

        impl $service {
            pub const MODULE: &'static str = $module;
            pub const DESCRIPTION: &'static str = $mdesc;

            pub fn new(client: $crate::dispatcher::DispatchClient) -> Self {
                Self { client }
            }

            $( define_service!(@method $method $( ( $params ) )? => $command, $desc); )*

            pub fn catalog() -> Vec<$crate::services::CommandEntry> {
                vec![
                    $( $crate::services::CommandEntry {
                        module: $module,
                        command: $command,
                        description: $desc,
                        param_schema: define_service!(@schema $( $params )?),
                    }, )*
                ]
            }
        }
    };
}

pub mod audio;
pub mod database;
pub mod developer;
pub mod metronome;
pub mod weather;

pub use audio::AudioService;
pub use database::DatabaseService;
pub use developer::DeveloperService;
pub use metronome::MetronomeService;
pub use weather::WeatherService;

/// Every facade, sharing one dispatch client.
#[derive(Clone)]
pub struct Services {
    pub audio: AudioService,
    pub database: DatabaseService,
    pub developer: DeveloperService,
    pub metronome: MetronomeService,
    pub weather: WeatherService,
}

impl Services {
    pub fn new(client: &DispatchClient) -> Self {
        Self {
            audio: AudioService::new(client.clone()),
            database: DatabaseService::new(client.clone()),
            developer: DeveloperService::new(client.clone()),
            metronome: MetronomeService::new(client.clone()),
            weather: WeatherService::new(client.clone()),
        }
    }
}
