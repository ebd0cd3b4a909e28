use chrono::NaiveDate;
use daybook_core::model::entry::EntryValidationError;
use daybook_core::Entry;
use uuid::Uuid;

fn may_8() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 8).unwrap()
}

#[test]
fn entry_new_sets_defaults() {
    let entry = Entry::new(may_8(), "title", "body");

    assert!(!entry.uuid.is_nil());
    assert_eq!(entry.entry_date, may_8());
    assert!(!entry.is_completed);
    assert_eq!(entry.lineage_id, None);
    assert!(!entry.is_pin_origin);
    assert!(entry.validate().is_ok());
}

#[test]
fn sibling_copy_keeps_text_and_drops_state() {
    let lineage_id = Uuid::new_v4();
    let mut origin = Entry::new(may_8(), "Stretch", "10 min");
    origin.is_completed = true;
    origin.lineage_id = Some(lineage_id);
    origin.is_pin_origin = true;

    let next = NaiveDate::from_ymd_opt(2024, 5, 9).unwrap();
    let copy = origin.sibling_copy(lineage_id, next);

    assert_ne!(copy.uuid, origin.uuid);
    assert_eq!(copy.entry_date, next);
    assert_eq!(copy.title, "Stretch");
    assert_eq!(copy.content, "10 min");
    assert!(!copy.is_completed);
    assert!(!copy.is_pin_origin);
    assert_eq!(copy.lineage_id, Some(lineage_id));
}

#[test]
fn pin_origin_requires_lineage() {
    let mut entry = Entry::new(may_8(), "t", "");
    entry.is_pin_origin = true;

    assert_eq!(
        entry.validate(),
        Err(EntryValidationError::OriginWithoutLineage)
    );
}

#[test]
fn entry_serialization_uses_expected_wire_fields() {
    let entry_id = Uuid::parse_str("11111111-2222-4333-8444-555555555555").unwrap();
    let mut entry = Entry::new(may_8(), "Plan", "- [ ] ship");
    entry.uuid = entry_id;

    let json = serde_json::to_value(&entry).unwrap();
    assert_eq!(json["uuid"], entry_id.to_string());
    assert_eq!(json["entry_date"], "2024-05-08");
    assert_eq!(json["title"], "Plan");
    assert!(json["lineage_id"].is_null());
    assert_eq!(json["is_completed"], false);

    let decoded: Entry = serde_json::from_value(json).unwrap();
    assert_eq!(decoded, entry);
}
