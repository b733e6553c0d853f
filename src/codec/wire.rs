use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::command::{join_payload, CommandPayload, OutboxCommand};

/// Body sent to the remote endpoint for one delivery attempt.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryRequest {
    pub idempotency_key: String,
    #[serde(rename = "type")]
    pub command_type: String,
    pub payload: Value,
}

impl DeliveryRequest {
    /// Decode the payload into its typed form on the receiving side.
    pub fn payload_as<P: CommandPayload>(&self) -> Result<P, serde_json::Error> {
        join_payload(&self.command_type, &self.payload)
    }
}

pub fn to_request(command: &OutboxCommand) -> DeliveryRequest {
    DeliveryRequest {
        idempotency_key: command.idempotency_key.as_str().to_string(),
        command_type: command.command_type.clone(),
        payload: command.payload.clone(),
    }
}
