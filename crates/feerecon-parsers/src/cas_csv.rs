//! CAS CSV settlement file (§4.4, §6). Column names are case-insensitive;
//! unknown columns are ignored and missing recognized columns evaluate to
//! empty strings; callers must check before use, the parser itself never
//! fails a row for a missing column.

use feerecon_core::ParseOutcome;
use rust_decimal::Decimal;

#[derive(Debug, Clone, Default)]
pub struct CasRow {
    pub record_type: String,
    pub source_txn_no: String,
    pub target_txn_no: String,
    pub app_amount: String,
    pub target_txn_status: String,
    pub reversal_reason_desc: String,
    /// CFS customer account number (§4.4 step 1's PaymentAccount lookup key).
    pub customer_account: String,
    /// Original amount of the target transaction, independent of how much
    /// of it this row applies; seeds `Credit.amount` on first discovery.
    pub target_txn_original: String,
}

impl CasRow {
    pub fn app_amount_decimal(&self) -> Option<Decimal> {
        self.app_amount.trim().parse().ok()
    }

    pub fn target_txn_original_decimal(&self) -> Option<Decimal> {
        self.target_txn_original.trim().parse().ok()
    }
}

pub fn parse_cas_csv(bytes: &[u8]) -> ParseOutcome<CasRow> {
    let mut outcome = ParseOutcome::new();
    let mut reader = csv::ReaderBuilder::new().has_headers(true).from_reader(bytes);

    let headers: Vec<String> = match reader.headers() {
        Ok(h) => h.iter().map(|s| s.to_lowercase()).collect(),
        Err(e) => {
            outcome.push_error(0, format!("failed to read header row: {e}"));
            return outcome;
        }
    };

    for (idx, record) in reader.records().enumerate() {
        let line = idx + 2; // account for the header row, 1-indexed
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                outcome.push_error(line, format!("malformed CSV row: {e}"));
                continue;
            }
        };

        let mut row = CasRow::default();
        for (col, value) in headers.iter().zip(record.iter()) {
            match col.as_str() {
                "record_type" => row.record_type = value.to_string(),
                "source_txn_no" => row.source_txn_no = value.to_string(),
                "target_txn_no" => row.target_txn_no = value.to_string(),
                "app_amount" => row.app_amount = value.to_string(),
                "target_txn_status" => row.target_txn_status = value.to_string(),
                "reversal_reason_desc" => row.reversal_reason_desc = value.to_string(),
                "customer_account" => row.customer_account = value.to_string(),
                "target_txn_original" => row.target_txn_original = value.to_string(),
                _ => {}
            }
        }
        outcome.push_record(row);
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_columns_case_insensitively() {
        let csv = "RECORD_TYPE,SOURCE_TXN_NO,TARGET_TXN_NO,APP_AMOUNT,TARGET_TXN_STATUS,REVERSAL_REASON_DESC\n\
                    PAD,RCPT-9001,REGT00000002,125.00,PAID,\n";
        let outcome = parse_cas_csv(csv.as_bytes());
        assert!(!outcome.has_errors());
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].record_type, "PAD");
        assert_eq!(outcome.records[0].app_amount_decimal(), Some(Decimal::new(12500, 2)));
    }

    #[test]
    fn unknown_columns_are_ignored() {
        let csv = "record_type,some_future_column\nPAD,xyz\n";
        let outcome = parse_cas_csv(csv.as_bytes());
        assert!(!outcome.has_errors());
        assert_eq!(outcome.records[0].record_type, "PAD");
    }

    #[test]
    fn missing_recognized_column_is_empty_not_an_error() {
        let csv = "record_type\nBOLP\n";
        let outcome = parse_cas_csv(csv.as_bytes());
        assert!(!outcome.has_errors());
        assert_eq!(outcome.records[0].target_txn_no, "");
    }
}
