use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ModuleNameParams {
    /// Backend module to operate on.
    pub module_name: String,
}

define_service! {
    /// Tooling for backend module authors.
    DeveloperService => "developer": "Module scaffolding, checks and remote development" {
        start_remote_dev => "start_remote_dev": "Start the remote development session.";
        stop_remote_dev => "stop_remote_dev": "Stop the remote development session.";
        create_application(ModuleNameParams) => "create_application": "Scaffold a new backend module.";
        check_application(ModuleNameParams) => "check_application": "Run static checks on a module.";
        generate_documentation(ModuleNameParams) => "generate_documentation": "Build the API docs of a module.";
        restart_backend => "restart_backend": "Restart the backend process.";
    }
}
