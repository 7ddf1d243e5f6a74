use std::path::Path;

use movely_core::domain::draft::FormPayload;
use movely_core::form::FormDefinition;
use movely_core::validation::{assemble_request, ValidationErrors};

use crate::commands::{exit, read_json, CommandResult};

/// Checks every step of the service-request form against a payload file.
pub fn run(payload_path: &Path) -> CommandResult {
    let payload: FormPayload = match read_json(payload_path) {
        Ok(payload) => payload,
        Err(error) => {
            return CommandResult::failure("validate", "input", format!("{error:#}"), exit::INPUT)
        }
    };

    let definition = FormDefinition::service_request();
    let failures: Vec<ValidationErrors> =
        definition.steps().iter().filter_map(|step| step.validate(&payload).err()).collect();

    if !failures.is_empty() {
        let invalid_fields: usize = failures.iter().map(|failure| failure.errors.len()).sum();
        return CommandResult::failure_with_data(
            "validate",
            "validation",
            format!("{invalid_fields} invalid field(s) across {} step(s)", failures.len()),
            exit::VALIDATION,
            serde_json::to_value(&failures).ok(),
        );
    }

    match assemble_request(&payload) {
        Ok(request) => CommandResult::success_with_data(
            "validate",
            format!("payload is a valid {} request", request.request_type().as_str()),
            serde_json::to_value(&request).ok(),
        ),
        Err(error) => CommandResult::failure(
            "validate",
            "validation",
            format!("payload passed step checks but could not be assembled: {error}"),
            exit::VALIDATION,
        ),
    }
}
