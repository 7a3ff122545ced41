use schemars::schema_for;
use serde::Serialize;
use serde_json::Value;

use super::{
    AudioService, CommandEntry, DatabaseService, DeveloperService, MetronomeService,
    WeatherService,
};

/// Summary of one backend module.
#[derive(Debug, Clone, Serialize)]
pub struct ModuleInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub commands: usize,
}

pub(crate) fn empty_object_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

pub(crate) fn schema_value<T: schemars::JsonSchema>() -> Value {
    let root = schema_for!(T);
    serde_json::to_value(root).unwrap_or_else(|_| empty_object_schema())
}

/// Every command of every facade.
pub fn all_entries() -> Vec<CommandEntry> {
    let mut entries = AudioService::catalog();
    entries.extend(DatabaseService::catalog());
    entries.extend(DeveloperService::catalog());
    entries.extend(MetronomeService::catalog());
    entries.extend(WeatherService::catalog());
    entries
}

pub fn modules() -> Vec<ModuleInfo> {
    let entries = all_entries();
    [
        (AudioService::MODULE, AudioService::DESCRIPTION),
        (DatabaseService::MODULE, DatabaseService::DESCRIPTION),
        (DeveloperService::MODULE, DeveloperService::DESCRIPTION),
        (MetronomeService::MODULE, MetronomeService::DESCRIPTION),
        (WeatherService::MODULE, WeatherService::DESCRIPTION),
    ]
    .into_iter()
    .map(|(name, description)| ModuleInfo {
        name,
        description,
        commands: entries.iter().filter(|e| e.module == name).count(),
    })
    .collect()
}

pub fn find(module: &str, command: &str) -> Option<CommandEntry> {
    all_entries()
        .into_iter()
        .find(|e| e.module == module && e.command == command)
}

/// Help text in three tiers: no topic → modules, module → its commands,
/// `module.command` → full parameter schema.
pub fn help_text(topic: Option<&str>) -> String {
    match topic {
        None => {
            let mut lines = vec!["Available modules:".to_string()];
            for m in modules() {
                lines.push(format!("  {} ({}) - {}", m.name, m.commands, m.description));
            }
            lines.push(String::new());
            lines.push("Use `describe <module>` to list its commands.".to_string());
            lines.join("\n")
        }
        Some(topic) => {
            if let Some((module, command)) = topic.split_once('.') {
                return match find(module, command) {
                    Some(entry) => {
                        let schema = serde_json::to_string_pretty(&entry.param_schema)
                            .unwrap_or_else(|_| "{}".to_string());
                        format!(
                            "{}: {}\n\nParameters:\n{schema}",
                            entry.qualified_name(),
                            entry.description
                        )
                    }
                    None => format!("Unknown command: \"{topic}\"."),
                };
            }

            let matching: Vec<CommandEntry> = all_entries()
                .into_iter()
                .filter(|e| e.module == topic)
                .collect();
            if matching.is_empty() {
                return format!("Unknown topic: \"{topic}\". Run `describe` without a topic to list modules.");
            }
            let mut lines = vec![format!("{topic} commands:")];
            for entry in &matching {
                lines.push(format!("  - {}: {}", entry.command, entry.description));
            }
            lines.push(String::new());
            lines.push(format!("Use `describe {topic}.<command>` for parameter details."));
            lines.join("\n")
        }
    }
}

/// JSON tool list for external callers.
pub fn to_json_schema() -> Value {
    Value::Array(
        all_entries()
            .iter()
            .map(|e| {
                serde_json::json!({
                    "module": e.module,
                    "command": e.command,
                    "description": e.description,
                    "inputSchema": e.param_schema,
                })
            })
            .collect(),
    )
}
