//! Request body encoding.

use http_sink_core::{Batch, BatchFormat};
use serde_json::value::RawValue;

/// Encode `batch` as a request body.
///
/// # Errors
/// Returns error if the format is `json_array` and a payload is not valid
/// JSON. `ndjson` never fails.
pub fn encode_body(format: BatchFormat, batch: &Batch) -> Result<Vec<u8>, serde_json::Error> {
    match format {
        BatchFormat::Ndjson => Ok(encode_ndjson(batch)),
        BatchFormat::JsonArray => encode_json_array(batch),
    }
}

fn encode_ndjson(batch: &Batch) -> Vec<u8> {
    let size = batch.iter().map(|r| r.payload.len() + 1).sum();
    let mut body = Vec::with_capacity(size);
    for record in batch {
        body.extend_from_slice(&record.payload);
        body.push(b'\n');
    }
    body
}

// Payloads are embedded verbatim; RawValue only checks they parse.
fn encode_json_array(batch: &Batch) -> Result<Vec<u8>, serde_json::Error> {
    let values = batch
        .iter()
        .map(|r| serde_json::from_slice::<&RawValue>(&r.payload))
        .collect::<Result<Vec<_>, _>>()?;
    serde_json::to_vec(&values)
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    fn batch(payloads: &[&str]) -> Batch {
        Batch::from_payloads(payloads.iter().map(|p| p.as_bytes().to_vec()))
    }

    #[test]
    fn test_ndjson_exact_body() {
        let body = encode_body(BatchFormat::Ndjson, &batch(&[r#"{"a":1}"#, r#"{"b":2}"#])).unwrap();
        assert_eq!(body, b"{\"a\":1}\n{\"b\":2}\n");
    }

    #[test]
    fn test_ndjson_does_not_validate() {
        let body = encode_body(BatchFormat::Ndjson, &batch(&["not json", "{}"])).unwrap();
        assert_eq!(body, b"not json\n{}\n");
    }

    #[test]
    fn test_ndjson_empty_batch() {
        let body = encode_body(BatchFormat::Ndjson, &Batch::default()).unwrap();
        assert!(body.is_empty());
    }

    #[test]
    fn test_json_array_order_and_values() {
        let body = encode_body(
            BatchFormat::JsonArray,
            &batch(&[r#"{"a":1}"#, "[1,2]", r#""s""#, "null", "3.5"]),
        )
        .unwrap();

        let parsed: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed, json!([{"a": 1}, [1, 2], "s", null, 3.5]));
    }

    #[test]
    fn test_json_array_embeds_raw() {
        let body = encode_body(BatchFormat::JsonArray, &batch(&[r#"{"a":1}"#, r#"{"b":2}"#])).unwrap();
        assert_eq!(body, br#"[{"a":1},{"b":2}]"#);
    }

    #[test]
    fn test_json_array_empty_batch() {
        let body = encode_body(BatchFormat::JsonArray, &Batch::default()).unwrap();
        assert_eq!(body, b"[]");
    }

    #[test]
    fn test_json_array_rejects_invalid_payload() {
        assert!(encode_body(BatchFormat::JsonArray, &batch(&["{}", "{oops"])).is_err());
        assert!(encode_body(BatchFormat::JsonArray, &batch(&[""])).is_err());
    }
}
