//! Serde helpers for wire-facing result types.

use serde::{Deserialize, Deserializer};

/// Deserialize a float that may have been serialized as `null`.
///
/// `serde_json` writes non-finite floats as `null`; reading them back as
/// NaN keeps the "N/A" marker semantics symmetric across the wire.
pub fn nan_from_null<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Probe {
        #[serde(deserialize_with = "super::nan_from_null")]
        value: f64,
    }

    #[test]
    fn test_null_becomes_nan() {
        let p: Probe = serde_json::from_str(r#"{"value": null}"#).unwrap();
        assert!(p.value.is_nan());
        let p: Probe = serde_json::from_str(r#"{"value": 1.5}"#).unwrap();
        assert_eq!(p.value, 1.5);
    }
}
