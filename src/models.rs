/// The category label assigned to rows matched by an exclusion rule.
/// Such rows are skipped by classification and omitted from reports.
pub const EXCLUDE_CATEGORY: &str = "Exclude";

#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct Transaction {
    pub id: i64,
    pub date: String,
    pub execution_date: Option<String>,
    pub title: String,
    pub vendor: Option<String>,
    pub account: Option<String>,
    pub amount: f64,
    pub balance: f64,
    pub category: Option<String>,
    pub sub_category: Option<String>,
}

/// One statement line parsed from a CSV export, before DB insert.
#[derive(Debug, Clone)]
pub struct ParsedRow {
    pub date: String,
    pub execution_date: Option<String>,
    pub title: String,
    pub vendor: Option<String>,
    pub account: Option<String>,
    pub amount: f64,
    pub balance: f64,
}

/// Monetary value as integer cents. Row identity must never hinge on
/// float equality.
pub fn cents(value: f64) -> i64 {
    (value * 100.0).round() as i64
}

pub type DedupKey = (String, String, i64, i64);

impl ParsedRow {
    /// Identity of a statement line across exports: two files covering
    /// overlapping periods produce the same key for the same real-world
    /// transaction.
    pub fn dedup_key(&self) -> DedupKey {
        (
            self.date.clone(),
            self.title.clone(),
            cents(self.amount),
            cents(self.balance),
        )
    }
}

/// Transaction columns that tags may match against. The variant order is
/// the match-priority order: groups for a later column are applied after
/// (and thus overwrite) groups for an earlier one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TagColumn {
    Title,
    Vendor,
    Account,
}

pub const TYPE_ORDER: [TagColumn; 3] = [TagColumn::Title, TagColumn::Vendor, TagColumn::Account];

impl TagColumn {
    /// Canonical display name, as stored in the tag_types table.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Title => "Title",
            Self::Vendor => "Vendor",
            Self::Account => "Account",
        }
    }

    /// Column name in the transactions table.
    pub fn sql_column(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Vendor => "vendor",
            Self::Account => "account",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "title" => Some(Self::Title),
            "vendor" => Some(Self::Vendor),
            "account" => Some(Self::Account),
            _ => None,
        }
    }

    pub fn order_index(&self) -> usize {
        TYPE_ORDER.iter().position(|c| c == self).unwrap_or(TYPE_ORDER.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cents_rounds_to_nearest() {
        assert_eq!(cents(4.50), 450);
        assert_eq!(cents(-4.50), -450);
        assert_eq!(cents(0.1 + 0.2), 30);
        assert_eq!(cents(1234.567), 123457);
    }

    #[test]
    fn test_dedup_key_ignores_optional_columns() {
        let a = ParsedRow {
            date: "2024-01-05".to_string(),
            execution_date: Some("2024-01-06".to_string()),
            title: "Coffee Shop".to_string(),
            vendor: Some("COFFEE".to_string()),
            account: None,
            amount: -4.50,
            balance: 1000.00,
        };
        let mut b = a.clone();
        b.execution_date = None;
        b.vendor = None;
        assert_eq!(a.dedup_key(), b.dedup_key());
    }

    #[test]
    fn test_tag_column_parse_is_case_insensitive() {
        assert_eq!(TagColumn::parse("title"), Some(TagColumn::Title));
        assert_eq!(TagColumn::parse("TITLE"), Some(TagColumn::Title));
        assert_eq!(TagColumn::parse(" Vendor "), Some(TagColumn::Vendor));
        assert_eq!(TagColumn::parse("amount"), None);
        assert_eq!(TagColumn::parse("balance"), None);
    }

    #[test]
    fn test_type_order_puts_title_first() {
        assert_eq!(TagColumn::Title.order_index(), 0);
        assert!(TagColumn::Vendor.order_index() < TagColumn::Account.order_index());
    }
}
