use serde::de::DeserializeOwned;
use serde_json::Value;
use validator::Validate;

pub(crate) mod question;
pub(crate) mod student;
pub(crate) mod submission;

/// Decodes each element on its own so one malformed row never poisons the rest of a feed.
pub(crate) fn decode_rows<P, T>(items: Vec<Value>, kind: &'static str) -> Vec<T>
where
    P: DeserializeOwned + Validate + Into<T>,
{
    let mut decoded = Vec::with_capacity(items.len());
    for item in items {
        let row_id = item.get("id").cloned().unwrap_or(Value::Null);
        let payload = match serde_json::from_value::<P>(item) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::warn!(kind, row_id = %row_id, error = %err, "Rejected undecodable row");
                crate::core::metrics::row_rejected("decode");
                continue;
            }
        };
        if let Err(err) = payload.validate() {
            tracing::warn!(kind, row_id = %row_id, error = %err, "Rejected invalid row");
            crate::core::metrics::row_rejected("validation");
            continue;
        }
        decoded.push(payload.into());
    }
    decoded
}
