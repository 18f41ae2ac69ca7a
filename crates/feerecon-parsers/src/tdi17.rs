//! Fixed-width TDI17 electronic funds transfer deposit file (§4.7, §6).
//! Record type lives at offset 2, width 2: "1" header, "2" detail, "7"
//! trailer. Every field parse records a value or a typed error tagged
//! with the line index rather than aborting the record.

use chrono::NaiveDate;
use feerecon_core::ParseOutcome;

#[derive(Debug, Clone)]
pub struct Tdi17Header {
    pub creation_date: Option<NaiveDate>,
    pub deposit_date_start: Option<NaiveDate>,
    pub deposit_date_end: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default)]
pub struct Tdi17Detail {
    pub ministry_code: String,
    pub program_code: String,
    pub deposit_date: Option<NaiveDate>,
    pub deposit_time: String,
    pub location_id: String,
    pub transaction_sequence: String,
    pub transaction_description: String,
    pub deposit_amount_cents: i64,
    pub currency: String,
    pub exchange_adj: String,
    pub deposit_amount_cad_cents: i64,
    pub destination_bank_number: String,
    pub batch_number: String,
    pub jv_type: String,
    pub jv_number: String,
    pub transaction_date: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct Tdi17Trailer {
    pub number_of_details: i64,
    pub total_deposit_amount_cents: i64,
}

#[derive(Debug, Clone)]
pub enum Tdi17Record {
    Header(Tdi17Header),
    Detail(Tdi17Detail),
    Trailer(Tdi17Trailer),
}

fn slice(line: &str, start: usize, end: usize) -> &str {
    let bytes = line.as_bytes();
    if start >= bytes.len() {
        return "";
    }
    let end = end.min(bytes.len());
    line.get(start..end).unwrap_or("").trim()
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y%m%d").ok()
}

pub fn parse_tdi17(text: &str) -> ParseOutcome<Tdi17Record> {
    let mut outcome = ParseOutcome::new();

    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        let record_type = slice(line, 2, 4);
        match record_type {
            "1" => outcome.push_record(Tdi17Record::Header(Tdi17Header {
                creation_date: parse_date(slice(line, 4, 12)),
                deposit_date_start: parse_date(slice(line, 12, 20)),
                deposit_date_end: parse_date(slice(line, 20, 28)),
            })),
            "2" => {
                let mut detail = Tdi17Detail {
                    ministry_code: slice(line, 4, 7).to_string(),
                    program_code: slice(line, 7, 10).to_string(),
                    deposit_date: None,
                    deposit_time: slice(line, 18, 24).to_string(),
                    location_id: slice(line, 24, 28).to_string(),
                    transaction_sequence: slice(line, 28, 38).to_string(),
                    transaction_description: slice(line, 38, 78).to_string(),
                    deposit_amount_cents: 0,
                    currency: slice(line, 93, 96).to_string(),
                    exchange_adj: slice(line, 96, 106).to_string(),
                    deposit_amount_cad_cents: 0,
                    destination_bank_number: slice(line, 116, 120).to_string(),
                    batch_number: slice(line, 120, 130).to_string(),
                    jv_type: slice(line, 130, 132).to_string(),
                    jv_number: slice(line, 132, 142).to_string(),
                    transaction_date: None,
                };

                let deposit_date_raw = slice(line, 10, 18);
                detail.deposit_date = parse_date(deposit_date_raw);
                if detail.deposit_date.is_none() && !deposit_date_raw.is_empty() {
                    outcome.push_error(line_no, format!("unparseable deposit_date: {deposit_date_raw:?}"));
                }

                match slice(line, 78, 93).parse::<i64>() {
                    Ok(v) => detail.deposit_amount_cents = v,
                    Err(_) if !slice(line, 78, 93).is_empty() => {
                        outcome.push_error(line_no, "unparseable deposit_amount_cents".to_string())
                    }
                    Err(_) => {}
                }

                match slice(line, 106, 116).parse::<i64>() {
                    Ok(v) => detail.deposit_amount_cad_cents = v,
                    Err(_) if !slice(line, 106, 116).is_empty() => {
                        outcome.push_error(line_no, "unparseable deposit_amount_cad_cents".to_string())
                    }
                    Err(_) => {}
                }

                let txn_date_raw = slice(line, 142, 150);
                detail.transaction_date = parse_date(txn_date_raw);
                if detail.transaction_date.is_none() && !txn_date_raw.is_empty() {
                    outcome.push_error(line_no, format!("unparseable transaction_date: {txn_date_raw:?}"));
                }

                outcome.push_record(Tdi17Record::Detail(detail));
            }
            "7" => {
                let number_of_details = slice(line, 4, 12).parse().unwrap_or_else(|_| {
                    outcome.push_error(line_no, "unparseable number_of_details".to_string());
                    0
                });
                let total_deposit_amount_cents = slice(line, 12, 27).parse().unwrap_or_else(|_| {
                    outcome.push_error(line_no, "unparseable total_deposit_amount_cents".to_string());
                    0
                });
                outcome.push_record(Tdi17Record::Trailer(Tdi17Trailer {
                    number_of_details,
                    total_deposit_amount_cents,
                }));
            }
            other => {
                outcome.push_error(line_no, format!("unknown TDI17 record type: {other:?}"));
            }
        }
    }

    outcome
}

/// §6: the transaction-description prefix that classifies a TDI17 detail
/// line's short-name type. Federal-payment rows synthesize their short
/// name from the matched pattern rather than reading it off the line.
pub fn classify_short_name_type<'a>(
    description: &str,
    eft_pattern: &'a str,
    wire_pattern: &'a str,
    pad_pattern: &'a str,
    federal_payment_pattern: &'a str,
) -> Option<&'a str> {
    let description = description.trim();
    for pattern in [eft_pattern, wire_pattern, pad_pattern, federal_payment_pattern] {
        if description.starts_with(pattern) {
            return Some(pattern);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pad_field(value: &str, width: usize) -> String {
        format!("{:<width$}", value, width = width)
    }

    #[test]
    fn detail_line_extracts_deposit_amount() {
        let mut line = String::new();
        line.push_str("AA"); // offsets [0,2)
        line.push_str("2 "); // record type [2,4)
        line.push_str(&pad_field("MIN", 3)); // [4,7)
        line.push_str(&pad_field("PRG", 3)); // [7,10)
        line.push_str(&pad_field("20240115", 8)); // deposit_date [10,18)
        line.push_str(&pad_field("0900", 6)); // deposit_time [18,24)
        line.push_str(&pad_field("LOC1", 4)); // location_id [24,28)
        line.push_str(&pad_field("SEQ", 10)); // transaction_sequence [28,38)
        line.push_str(&pad_field("MISC PAYMENT ABC123", 40)); // description [38,78)
        line.push_str(&format!("{:0>15}", 10000)); // deposit_amount_cents [78,93)
        line.push_str(&pad_field("CAD", 3)); // currency [93,96)
        line.push_str(&pad_field("", 10)); // exchange_adj [96,106)
        line.push_str(&format!("{:0>10}", 10000)); // deposit_amount_cad_cents [106,116)
        line.push_str(&pad_field("0001", 4)); // destination_bank_number [116,120)
        line.push_str(&pad_field("BATCH1", 10)); // batch_number [120,130)
        line.push_str(&pad_field("JV", 2)); // jv_type [130,132)
        line.push_str(&pad_field("JVNUM", 10)); // jv_number [132,142)
        line.push_str("20240116"); // transaction_date [142,150)

        let outcome = parse_tdi17(&line);
        assert!(!outcome.has_errors(), "{:?}", outcome.errors);
        assert_eq!(outcome.records.len(), 1);
        match &outcome.records[0] {
            Tdi17Record::Detail(detail) => {
                assert_eq!(detail.deposit_amount_cents, 10000);
                assert_eq!(detail.transaction_description.trim(), "MISC PAYMENT ABC123");
            }
            other => panic!("expected detail, got {other:?}"),
        }
    }

    #[test]
    fn unknown_record_type_is_an_error_not_a_panic() {
        let outcome = parse_tdi17("AA9 rest of line here");
        assert!(outcome.has_errors());
        assert!(outcome.records.is_empty());
    }

    #[test]
    fn classify_matches_eft_prefix() {
        assert_eq!(classify_short_name_type("EFT ABC123", "EFT", "WIRE", "PAD", "FEDERAL PAYMENT"), Some("EFT"));
        assert_eq!(classify_short_name_type("no match here", "EFT", "WIRE", "PAD", "FEDERAL PAYMENT"), None);
    }
}
