use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

const TAG: &str = "type";
const CONTENT: &str = "payload";

/// A typed command payload.
///
/// Implement this for an adjacently tagged enum so each variant maps to one
/// command type and the receiving side can decode exhaustively:
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// #[serde(tag = "type", content = "payload")]
/// enum PosCommand {
///     #[serde(rename = "sale.recorded")]
///     SaleRecorded { sale_id: String, total_cents: i64 },
///     #[serde(rename = "drawer.opened")]
///     DrawerOpened,
/// }
/// ```
///
/// The outbox itself never looks inside the payload.
pub trait CommandPayload: Serialize + DeserializeOwned {
    /// The command type tag for this value.
    fn command_type(&self) -> &'static str;
}

/// Split a typed payload into its type tag and untagged body.
pub(crate) fn split_payload<P: CommandPayload>(
    payload: &P,
) -> Result<(&'static str, Value), serde_json::Error> {
    let mut value = serde_json::to_value(payload)?;
    let body = value
        .get_mut(CONTENT)
        .map(Value::take)
        .unwrap_or(Value::Null);
    Ok((payload.command_type(), body))
}

/// Rebuild the tagged form from a type tag and body, then decode it.
pub(crate) fn join_payload<P: CommandPayload>(
    command_type: &str,
    body: &Value,
) -> Result<P, serde_json::Error> {
    let mut tagged = Map::new();
    tagged.insert(TAG.to_string(), Value::String(command_type.to_string()));
    if !body.is_null() {
        tagged.insert(CONTENT.to_string(), body.clone());
    }
    serde_json::from_value(Value::Object(tagged))
}
