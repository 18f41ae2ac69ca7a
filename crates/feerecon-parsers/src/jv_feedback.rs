//! Fixed-width government journal-voucher (JV) feedback file (§4.9, §6).
//!
//! A known CAS quirk inserts spurious zeros into a JD line's detail
//! column range [300,315) before the real field data; [`fix_zero_quirk`]
//! corrects a line before any field at or past column 300 is interpreted.

use chrono::NaiveDate;
use feerecon_core::ParseOutcome;

fn slice(line: &str, start: usize, end: usize) -> &str {
    let bytes = line.as_bytes();
    if start >= bytes.len() {
        return "";
    }
    let end = end.min(bytes.len());
    line.get(start..end).unwrap_or("").trim()
}

fn slice_raw(line: &str, start: usize, end: usize) -> &str {
    let bytes = line.as_bytes();
    if start >= bytes.len() {
        return "";
    }
    let end = end.min(bytes.len());
    line.get(start..end).unwrap_or("")
}

/// Scans [300,315) for the first `'0'`; if found at relative position `z`,
/// inserts `15 - z` spaces immediately after that position, shifting
/// everything from there on right. A line with no `'0'` in that window is
/// returned unmodified.
pub fn fix_zero_quirk(line: &str) -> String {
    let window = slice_raw(line, 300, 315);
    let Some(z) = window.find('0') else {
        return line.to_string();
    };
    let insert_at = 300 + z + 1;
    let pad = " ".repeat(15 - z);
    let mut corrected = String::with_capacity(line.len() + pad.len());
    corrected.push_str(&line[..insert_at.min(line.len())]);
    corrected.push_str(&pad);
    if insert_at < line.len() {
        corrected.push_str(&line[insert_at..]);
    }
    corrected
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y%m%d").ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchKind {
    Ejv,
    ApGovernment,
    ApNonGovernment,
}

#[derive(Debug, Clone)]
pub struct BatchGroup {
    pub kind: BatchKind,
    pub batch_number: String,
}

#[derive(Debug, Clone)]
pub struct BatchHeader {
    pub return_code: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct JvHeader {
    /// `{ministry}{ejv_header_id:0>8}` packed into a 10-char journal name.
    pub ejv_header_id: Option<i64>,
    pub receipt_number: String,
    pub settlement_amount_cents: i64,
    pub return_code: String,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct JvDetail {
    pub ejv_header_id: Option<i64>,
    /// The invoice id, or `"{invoice_id}-{partner_disbursement_id}"` when a
    /// disbursement is attached. Column [205,315), with the zero-quirk
    /// fix already applied.
    pub flowthrough: String,
    pub settlement_amount_cents: i64,
    pub credit_or_debit: char,
    pub return_code: String,
    pub message: String,
    pub effective_date: Option<NaiveDate>,
    pub object_code: String,
}

#[derive(Debug, Clone)]
pub struct ApHeader {
    pub return_code: String,
    pub message: String,
    /// Raw value at [19,69): a routing_slip_number, eft_refund_id, or
    /// invoice_id depending on the enclosing file's type; the parser
    /// does not know which, the reconciler resolves it against
    /// `EjvFile.file_type`.
    pub target_id: String,
}

#[derive(Debug, Clone)]
pub enum JvRecord {
    BatchGroup(BatchGroup),
    BatchHeader(BatchHeader),
    JvHeader(JvHeader),
    JvDetail(JvDetail),
    ApHeader(ApHeader),
    BatchTrailer,
}

pub fn parse_jv_feedback(text: &str) -> ParseOutcome<JvRecord> {
    let mut outcome = ParseOutcome::new();

    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        if raw_line.trim().is_empty() {
            continue;
        }

        let prefix4 = slice_raw(raw_line, 0, 4);
        let class = slice(raw_line, 2, 4);

        if class == "BT" {
            outcome.push_record(JvRecord::BatchTrailer);
            continue;
        }

        match class {
            "BG" => {
                let kind = match prefix4 {
                    "GABG" => BatchKind::Ejv,
                    "GIBG" => BatchKind::Ejv,
                    "APBG" => BatchKind::ApGovernment,
                    other => {
                        outcome.push_error(line_no, format!("unrecognized batch-start prefix: {other:?}"));
                        continue;
                    }
                };
                outcome.push_record(JvRecord::BatchGroup(BatchGroup {
                    kind,
                    batch_number: slice(raw_line, 15, 24).to_string(),
                }));
            }
            "BH" => outcome.push_record(JvRecord::BatchHeader(BatchHeader {
                return_code: slice(raw_line, 7, 11).to_string(),
                message: slice(raw_line, 11, 161).to_string(),
            })),
            "JH" => {
                let amount_raw = slice(raw_line, 42, 57);
                let settlement_amount_cents = match amount_raw.parse() {
                    Ok(v) => v,
                    Err(_) if !amount_raw.is_empty() => {
                        outcome.push_error(line_no, "unparseable JH settlement amount".to_string());
                        0
                    }
                    Err(_) => 0,
                };
                let journal_name = slice(raw_line, 7, 17);
                let ejv_header_id = journal_name.get(2..).and_then(|s| s.trim().parse().ok());
                outcome.push_record(JvRecord::JvHeader(JvHeader {
                    ejv_header_id,
                    receipt_number: slice(raw_line, 0, 42).to_string(),
                    settlement_amount_cents,
                    return_code: slice(raw_line, 271, 275).to_string(),
                    message: slice(raw_line, 275, 425).to_string(),
                }));
            }
            "JD" => {
                // CAS workaround: a stray zero in [300,315) must be bumped
                // out with spaces before any column at or past 300 means
                // anything.
                let corrected = fix_zero_quirk(raw_line);
                let amount_raw = slice(&corrected, 89, 104);
                let settlement_amount_cents = match amount_raw.parse() {
                    Ok(v) => v,
                    Err(_) if !amount_raw.is_empty() => {
                        outcome.push_error(line_no, "unparseable JD settlement amount".to_string());
                        0
                    }
                    Err(_) => 0,
                };
                let credit_or_debit = slice(&corrected, 104, 105).chars().next().unwrap_or(' ');
                let journal_name = slice(&corrected, 7, 17);
                let ejv_header_id = journal_name.get(2..).and_then(|s| s.trim().parse().ok());
                let effective_date_raw = slice(&corrected, 22, 30);
                let effective_date = parse_date(effective_date_raw);
                if effective_date.is_none() && !effective_date_raw.is_empty() {
                    outcome.push_error(line_no, format!("unparseable JD effective_date: {effective_date_raw:?}"));
                }
                outcome.push_record(JvRecord::JvDetail(JvDetail {
                    ejv_header_id,
                    flowthrough: slice(&corrected, 205, 315).to_string(),
                    settlement_amount_cents,
                    credit_or_debit,
                    return_code: slice(&corrected, 315, 319).to_string(),
                    message: slice(&corrected, 319, 469).to_string(),
                    effective_date,
                    object_code: slice(&corrected, 30, 33).to_string(),
                }));
            }
            "IH" => outcome.push_record(JvRecord::ApHeader(ApHeader {
                return_code: slice(raw_line, 414, 418).to_string(),
                message: slice(raw_line, 418, 568).to_string(),
                target_id: slice(raw_line, 19, 69).to_string(),
            })),
            other => {
                outcome.push_error(line_no, format!("unknown JV record class: {other:?}"));
            }
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_quirk_left_untouched_when_no_zero_present() {
        let line = "x".repeat(320);
        assert_eq!(fix_zero_quirk(&line), line);
    }

    #[test]
    fn zero_quirk_inserts_spaces_after_first_zero_in_window() {
        let mut line = "a".repeat(300);
        // window [300,315): put a '0' at relative position 5 (absolute 305)
        line.push_str("aaaaa0aaaaaaaaa");
        line.push_str("TAIL");
        let corrected = fix_zero_quirk(&line);
        // 15 - 5 = 10 spaces inserted right after the zero (absolute 306)
        assert_eq!(&corrected[306..316], "          ");
        assert!(corrected.ends_with("TAIL"));
    }

    #[test]
    fn batch_group_line_is_classified_by_prefix() {
        let mut line = "GABG".to_string();
        line.push_str(&" ".repeat(11));
        line.push_str("BATCH00001");
        let outcome = parse_jv_feedback(&line);
        assert!(!outcome.has_errors());
        match &outcome.records[0] {
            JvRecord::BatchGroup(bg) => {
                assert_eq!(bg.kind, BatchKind::Ejv);
                assert_eq!(bg.batch_number, "BATCH00001");
            }
            other => panic!("expected batch group, got {other:?}"),
        }
    }

    #[test]
    fn jd_line_extracts_fields_at_their_absolute_offsets() {
        let mut line = String::new();
        line.push_str("AA"); // [0,2)
        line.push_str("JD"); // class [2,4)
        line.push_str(&" ".repeat(3)); // pad to 7
        line.push_str("BC00001234"); // journal_name [7,17)
        line.push_str(&" ".repeat(5)); // pad to 22
        line.push_str("20240115"); // effective_date [22,30)
        line.push_str("112"); // object_code [30,33)
        line.push_str(&" ".repeat(56)); // pad to 89
        line.push_str(&format!("{:0>15}", 12345)); // settlement amount [89,104)
        line.push('C'); // credit/debit [104,105)
        line.push_str(&" ".repeat(100)); // pad to 205
        line.push_str(&format!("{:<110}", "9001")); // flowthrough [205,315)
        line.push_str(&" ".repeat(4)); // return code [315,319)
        line.push_str(&" ".repeat(150)); // message [319,469)

        let outcome = parse_jv_feedback(&line);
        assert!(!outcome.has_errors(), "{:?}", outcome.errors);
        match &outcome.records[0] {
            JvRecord::JvDetail(detail) => {
                assert_eq!(detail.ejv_header_id, Some(1234));
                assert_eq!(detail.settlement_amount_cents, 12345);
                assert_eq!(detail.credit_or_debit, 'C');
                assert_eq!(detail.effective_date, NaiveDate::from_ymd_opt(2024, 1, 15));
                assert_eq!(detail.object_code, "112");
                assert_eq!(detail.flowthrough, "9001");
            }
            other => panic!("expected JD, got {other:?}"),
        }
    }
}
