use serde::{Deserialize, Serialize};

use crate::utils::contains_ignore_case;

/// Case name used when the sheet row leaves column A blank.
const UNKNOWN_CASE: &str = "Unknown";

/// Stock at or below this count (but above zero) is shown as low.
const LOW_STOCK_THRESHOLD: u32 = 5;

// Live_Stock sheet columns: A=Case B=Component C=Initial D=Borrowed E=Returned F=Current_Stock
const CASE_COLUMN: usize = 0;
const COMPONENT_COLUMN: usize = 1;
const STOCK_COLUMN: usize = 5;

/// Current available quantity of a component in a named storage case.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
pub struct StockItem {
    pub component: String,
    pub stock: u32,
    #[serde(rename = "caseName")]
    pub case_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockLevel {
    Out,
    Low,
    Available,
}

impl StockItem {
    /// Map one row of the Live_Stock range. Rows without a component name
    /// are spacer or header rows and yield `None`.
    pub fn from_sheet_row(row: &[String]) -> Option<Self> {
        let component = row.get(COMPONENT_COLUMN).map(|s| s.trim()).unwrap_or_default();
        if component.is_empty() {
            return None;
        }

        let case_name = row
            .get(CASE_COLUMN)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .unwrap_or(UNKNOWN_CASE);

        let stock = row.get(STOCK_COLUMN).map(|s| parse_stock(s)).unwrap_or(0);

        Some(Self {
            component: component.to_string(),
            stock,
            case_name: case_name.to_string(),
        })
    }

    pub fn level(&self) -> StockLevel {
        match self.stock {
            0 => StockLevel::Out,
            n if n < LOW_STOCK_THRESHOLD => StockLevel::Low,
            _ => StockLevel::Available,
        }
    }

    fn matches_search(&self, query: &str) -> bool {
        contains_ignore_case(&self.component, query) || contains_ignore_case(&self.case_name, query)
    }
}

/// Parse a stock cell the way spreadsheet users type it.
/// Takes the leading run of digits ("12 pcs" is 12, "9.5" is 9); anything
/// else, including negative numbers, counts as 0.
fn parse_stock(cell: &str) -> u32 {
    let trimmed = cell.trim();
    let digits = trimmed
        .strip_prefix('+')
        .unwrap_or(trimmed)
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect::<String>();
    digits.parse().unwrap_or(0)
}

/// Items whose component or case name contains `query`, ignoring case.
pub fn filter_stock<'a>(items: &'a [StockItem], query: &str) -> Vec<&'a StockItem> {
    let query = query.trim();
    items
        .iter()
        .filter(|item| query.is_empty() || item.matches_search(query))
        .collect()
}

/// Items of one storage case, in the order they were listed.
#[derive(Debug)]
pub struct CaseGroup<'a> {
    pub case_name: &'a str,
    pub items: Vec<&'a StockItem>,
}

/// Group items by case, keeping cases in first-seen order.
pub fn group_by_case<'a>(items: &[&'a StockItem]) -> Vec<CaseGroup<'a>> {
    let mut groups: Vec<CaseGroup<'a>> = Vec::new();
    for &item in items {
        match groups.iter_mut().find(|g| g.case_name == item.case_name) {
            Some(group) => group.items.push(item),
            None => groups.push(CaseGroup {
                case_name: &item.case_name,
                items: vec![item],
            }),
        }
    }
    groups
}
