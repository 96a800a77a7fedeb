//! Precedence-based identity resolution.
//!
//! A directory accumulates multiple revisions and copies of logically the
//! same document. The resolver groups records by their *classifier* — the
//! first non-empty field in a fixed precedence order — and keeps one
//! representative per group: the record with the greatest `update_time`,
//! ties broken by id. Groups are emitted classifier-precedence-major
//! (filename groups first, part-number groups last) and value-ordered
//! within a classifier, so repeated calls on the same input are stable.

use std::collections::BTreeMap;

use crate::models::DocumentRecord;

/// `(precedence rank, value)` of the first non-empty classifier field, or
/// `None` when the record is unclassifiable (all seven fields empty).
fn classifier(record: &DocumentRecord) -> Option<(u8, &str)> {
    [
        &record.lower_format_file_name,
        &record.document_number0,
        &record.document_number1,
        &record.document_number2,
        &record.part_number0,
        &record.part_number1,
        &record.part_number2,
    ]
    .into_iter()
    .enumerate()
    .find(|(_, value)| !value.is_empty())
    .map(|(rank, value)| (rank as u8, value.as_str()))
}

/// Reduce an unordered record collection to one representative per logical
/// identity. Unclassifiable records are dropped.
pub fn resolve_latest(records: &[DocumentRecord]) -> Vec<DocumentRecord> {
    let mut groups: BTreeMap<(u8, String), &DocumentRecord> = BTreeMap::new();
    for record in records {
        let Some((rank, value)) = classifier(record) else {
            continue;
        };
        groups
            .entry((rank, value.to_string()))
            .and_modify(|current| {
                let newer = (record.update_time, record.id.as_str())
                    > (current.update_time, current.id.as_str());
                if newer {
                    *current = record;
                }
            })
            .or_insert(record);
    }
    groups.into_values().cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, update_time: i64) -> DocumentRecord {
        DocumentRecord {
            id: id.to_string(),
            key: format!("key-{id}"),
            origin_file_name: String::new(),
            format_file_name: String::new(),
            lower_format_file_name: String::new(),
            content_hash: String::new(),
            side_document_hash: String::new(),
            document_number0: String::new(),
            document_number1: String::new(),
            document_number2: String::new(),
            part_number0: String::new(),
            part_number1: String::new(),
            part_number2: String::new(),
            document_remote_id: String::new(),
            part_remote_id: String::new(),
            display_name: String::new(),
            create_time: 0,
            update_time,
            file_last_write_time: 0,
            file_length: 0,
        }
    }

    fn with_file_name(id: &str, name: &str, update_time: i64) -> DocumentRecord {
        let mut r = record(id, update_time);
        r.lower_format_file_name = name.to_string();
        r
    }

    fn with_document_number(id: &str, number: &str, update_time: i64) -> DocumentRecord {
        let mut r = record(id, update_time);
        r.document_number0 = number.to_string();
        r
    }

    #[test]
    fn test_latest_update_time_wins_within_group() {
        let records = vec![
            with_file_name("a", "part.step", 100),
            with_file_name("b", "part.step", 300),
            with_file_name("c", "part.step", 200),
        ];
        let resolved = resolve_latest(&records);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].id, "b");
    }

    #[test]
    fn test_tie_on_update_time_breaks_by_id() {
        let records = vec![
            with_file_name("a", "part.step", 100),
            with_file_name("z", "part.step", 100),
        ];
        let resolved = resolve_latest(&records);
        assert_eq!(resolved[0].id, "z");
    }

    #[test]
    fn test_filename_precedes_document_number_regardless_of_time() {
        let records = vec![
            with_document_number("n", "D1", 999),
            with_file_name("f", "a.step", 1),
        ];
        let resolved = resolve_latest(&records);
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].id, "f");
        assert_eq!(resolved[1].id, "n");
    }

    #[test]
    fn test_precedence_order_spans_all_seven_fields() {
        let mut by_part2 = record("p2", 10);
        by_part2.part_number2 = "P2".to_string();
        let mut by_part0 = record("p0", 10);
        by_part0.part_number0 = "P0".to_string();
        let mut by_doc1 = record("d1", 10);
        by_doc1.document_number1 = "D1".to_string();

        let resolved = resolve_latest(&[by_part2, by_part0, by_doc1]);
        let order: Vec<&str> = resolved.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(order, vec!["d1", "p0", "p2"]);
    }

    #[test]
    fn test_unclassifiable_records_are_dropped() {
        let records = vec![record("empty", 50), with_file_name("f", "x", 1)];
        let resolved = resolve_latest(&records);
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].id, "f");
    }

    #[test]
    fn test_classifier_field_is_not_cross_matched() {
        // Same value in different classifier fields → different groups
        let a = with_file_name("a", "D1", 1);
        let b = with_document_number("b", "D1", 2);
        let resolved = resolve_latest(&[a, b]);
        assert_eq!(resolved.len(), 2);
    }

    #[test]
    fn test_stable_across_input_order() {
        let records = vec![
            with_file_name("a", "b.step", 1),
            with_file_name("c", "a.step", 2),
            with_document_number("d", "D9", 3),
        ];
        let mut shuffled = records.clone();
        shuffled.reverse();
        let first: Vec<String> = resolve_latest(&records).iter().map(|r| r.id.clone()).collect();
        let second: Vec<String> = resolve_latest(&shuffled).iter().map(|r| r.id.clone()).collect();
        assert_eq!(first, second);
        assert_eq!(first, vec!["c", "a", "d"]);
    }
}
