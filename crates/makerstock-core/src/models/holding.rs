use serde::{Deserialize, Serialize};

/// Quantity of a component a user has borrowed and not yet returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct Holding {
    pub component: String,
    pub outstanding: u32,
}

impl Holding {
    pub fn display(&self) -> String {
        format!("{} ({} borrowed)", self.component, self.outstanding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_holdings_payload() {
        let json = r#"[{"component":"MG996R Servo","outstanding":2},{"component":"SG90 Servo","outstanding":1}]"#;
        let holdings: Vec<Holding> = serde_json::from_str(json).unwrap();
        assert_eq!(holdings.len(), 2);
        assert_eq!(holdings[0].display(), "MG996R Servo (2 borrowed)");
    }

    #[test]
    fn test_negative_outstanding_is_rejected() {
        let json = r#"[{"component":"LED","outstanding":-1}]"#;
        assert!(serde_json::from_str::<Vec<Holding>>(json).is_err());
    }
}
