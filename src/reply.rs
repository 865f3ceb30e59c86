//! JSON envelope shared by every API endpoint.

use serde::{Deserialize, Serialize};

/// Sparse response body: zero and empty fields are left off the wire.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    #[serde(default, skip_serializing_if = "is_default")]
    pub success: u8,
    #[serde(default, skip_serializing_if = "is_default")]
    pub uploaded: usize,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub output: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl Reply {
    pub fn success() -> Self {
        Self {
            success: 1,
            ..Self::default()
        }
    }

    pub fn uploaded(count: usize) -> Self {
        Self {
            uploaded: count,
            ..Self::default()
        }
    }

    pub fn output(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            ..Self::default()
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            ..Self::default()
        }
    }

    /// Failure that still carries whatever output was produced.
    pub fn failure(error: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            error: error.into(),
            ..Self::default()
        }
    }
}

fn is_default<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

#[cfg(test)]
mod tests {
    use super::Reply;
    use serde_json::json;

    #[test]
    fn empty_fields_are_omitted() {
        assert_eq!(serde_json::to_value(Reply::success()).unwrap(), json!({"success": 1}));
        assert_eq!(serde_json::to_value(Reply::uploaded(0)).unwrap(), json!({}));
        assert_eq!(serde_json::to_value(Reply::output("")).unwrap(), json!({}));
    }

    #[test]
    fn failure_keeps_output_next_to_error() {
        let value = serde_json::to_value(Reply::failure("exit status: 2", "partial")).unwrap();
        assert_eq!(value, json!({"error": "exit status: 2", "output": "partial"}));
    }
}
