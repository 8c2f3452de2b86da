use serde::{Deserialize, Serialize};

use crate::api::ApiError;

/// Body of a write request, tagged by `action`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Transaction {
    Borrow {
        #[serde(rename = "userId")]
        user_id: String,
        #[serde(rename = "caseName")]
        case_name: String,
        component: String,
        quantity: u32,
    },
    Return {
        #[serde(rename = "userId")]
        user_id: String,
        component: String,
        quantity: u32,
    },
}

impl Transaction {
    fn verb(&self) -> &'static str {
        match self {
            Transaction::Borrow { .. } => "borrowed",
            Transaction::Return { .. } => "returned",
        }
    }

    pub fn success_message(&self) -> String {
        let (component, quantity) = match self {
            Transaction::Borrow { component, quantity, .. }
            | Transaction::Return { component, quantity, .. } => (component, quantity),
        };
        format!("Successfully {} {}x {}!", self.verb(), quantity, component)
    }
}

/// Raw backend reply to a write: `{success: true}` or `{error: "..."}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WriteResponse {
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Result of a write the backend accepted or rejected.
///
/// A rejection (insufficient stock, over-return) is not an error: the
/// request succeeded and the operation was refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct WriteOutcome {
    pub success: bool,
    pub message: String,
}

impl WriteResponse {
    /// Translate the reply for `transaction`. A reply carrying neither an
    /// error nor `success: true` is treated as malformed.
    pub fn into_outcome(self, transaction: &Transaction) -> Result<WriteOutcome, ApiError> {
        if let Some(error) = self.error.filter(|e| !e.trim().is_empty()) {
            return Ok(WriteOutcome {
                success: false,
                message: error,
            });
        }

        match self.success {
            Some(true) => Ok(WriteOutcome {
                success: true,
                message: transaction.success_message(),
            }),
            _ => Err(ApiError::InvalidResponse(
                "write reply had neither success nor error".to_string(),
            )),
        }
    }
}
