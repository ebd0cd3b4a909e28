use chrono::NaiveDate;
use daybook_core::db::open_db_in_memory;
use daybook_core::{
    DayService, Entry, EntryService, ListService, ListServiceError, PinService,
    SqliteDayRepository, SqliteEntryRepository, SqliteLineageRepository, SqliteListRepository,
    KANBAN_DEFAULT_COLUMNS, KANBAN_GROUP_ID,
};
use rusqlite::Connection;
use uuid::Uuid;

fn day(value: &str) -> NaiveDate {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").unwrap()
}

fn lists(conn: &Connection) -> ListService<SqliteListRepository<'_>> {
    ListService::new(SqliteListRepository::try_new(conn).unwrap())
}

fn new_entry(conn: &Connection, title: &str) -> Entry {
    EntryService::new(SqliteEntryRepository::try_new(conn).unwrap())
        .create_entry(day("2024-05-08"), title, "")
        .unwrap()
}

fn member_ids(conn: &Connection, list_id: Uuid) -> Vec<Uuid> {
    lists(conn)
        .list_members(list_id)
        .unwrap()
        .into_iter()
        .map(|member| member.entry_id)
        .collect()
}

fn order_indexes(conn: &Connection, list_id: Uuid) -> Vec<i64> {
    lists(conn)
        .list_members(list_id)
        .unwrap()
        .into_iter()
        .map(|member| member.order_index)
        .collect()
}

#[test]
fn kanban_columns_are_mutually_exclusive() {
    let conn = open_db_in_memory().unwrap();
    let columns = lists(&conn).initialize_kanban().unwrap();
    let (todo, doing, done) = (columns[0].uuid, columns[1].uuid, columns[2].uuid);
    let card = new_entry(&conn, "card");

    lists(&conn).add_to_list(todo, card.uuid).unwrap();
    let change = lists(&conn).add_to_list(doing, card.uuid).unwrap();
    assert!(change.changed);
    assert_eq!(change.displaced_from, vec![todo]);
    assert_eq!(change.memberships.len(), 1);
    assert_eq!(change.memberships[0].list_id, doing);

    lists(&conn).add_to_list(done, card.uuid).unwrap();
    let memberships = lists(&conn).memberships_for_entry(card.uuid).unwrap();
    assert_eq!(memberships.len(), 1);
    assert_eq!(memberships[0].list_id, done);
    assert!(member_ids(&conn, todo).is_empty());
    assert!(member_ids(&conn, doing).is_empty());
}

#[test]
fn ordinary_lists_are_independent() {
    let conn = open_db_in_memory().unwrap();
    let service = lists(&conn);
    let work = service.create_list("Work", "", None, None).unwrap();
    let urgent = service.create_list("Urgent", "", None, None).unwrap();
    let kanban = service.initialize_kanban().unwrap();
    let entry = new_entry(&conn, "report");

    service.add_to_list(work.uuid, entry.uuid).unwrap();
    service.add_to_list(urgent.uuid, entry.uuid).unwrap();
    service.add_to_list(kanban[0].uuid, entry.uuid).unwrap();
    service.add_to_list(kanban[1].uuid, entry.uuid).unwrap();

    let mut list_ids: Vec<Uuid> = service
        .memberships_for_entry(entry.uuid)
        .unwrap()
        .into_iter()
        .map(|membership| membership.list_id)
        .collect();
    list_ids.sort();
    let mut expected = vec![work.uuid, urgent.uuid, kanban[1].uuid];
    expected.sort();
    assert_eq!(list_ids, expected);
}

#[test]
fn adding_existing_member_is_a_noop() {
    let conn = open_db_in_memory().unwrap();
    let list = lists(&conn).create_list("Inbox", "", None, None).unwrap();
    let entry = new_entry(&conn, "idea");

    assert!(lists(&conn).add_to_list(list.uuid, entry.uuid).unwrap().changed);
    let again = lists(&conn).add_to_list(list.uuid, entry.uuid).unwrap();
    assert!(!again.changed);
    assert_eq!(member_ids(&conn, list.uuid), vec![entry.uuid]);
}

#[test]
fn kanban_initialization_is_one_shot() {
    let conn = open_db_in_memory().unwrap();
    let columns = lists(&conn).initialize_kanban().unwrap();
    let names: Vec<&str> = columns.iter().map(|list| list.name.as_str()).collect();
    assert_eq!(names, KANBAN_DEFAULT_COLUMNS.to_vec());
    assert_eq!(
        columns.iter().map(|list| list.group_order).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
    assert!(columns
        .iter()
        .all(|list| list.exclusivity_group_id.as_deref() == Some(KANBAN_GROUP_ID)));

    assert!(matches!(
        lists(&conn).initialize_kanban(),
        Err(ListServiceError::KanbanAlreadyInitialized)
    ));
    assert_eq!(lists(&conn).kanban_columns().unwrap().len(), 3);
}

#[test]
fn kanban_columns_are_hidden_from_ordinary_listing() {
    let conn = open_db_in_memory().unwrap();
    lists(&conn).initialize_kanban().unwrap();
    lists(&conn).create_list("Reading", "", None, None).unwrap();

    let ordinary = lists(&conn).list_lists(None, false).unwrap();
    assert_eq!(ordinary.len(), 1);
    assert_eq!(ordinary[0].name, "Reading");
}

#[test]
fn reorder_group_rewrites_column_order() {
    let conn = open_db_in_memory().unwrap();
    let columns = lists(&conn).initialize_kanban().unwrap();
    let reversed: Vec<Uuid> = columns.iter().rev().map(|list| list.uuid).collect();

    let reordered = lists(&conn)
        .reorder_group(KANBAN_GROUP_ID, &reversed)
        .unwrap();
    let names: Vec<&str> = reordered.iter().map(|list| list.name.as_str()).collect();
    assert_eq!(names, vec!["Done", "In Progress", "To Do"]);
}

#[test]
fn reorder_group_rejects_foreign_list() {
    let conn = open_db_in_memory().unwrap();
    let columns = lists(&conn).initialize_kanban().unwrap();
    let plain = lists(&conn).create_list("Plain", "", None, None).unwrap();

    let err = lists(&conn)
        .reorder_group(KANBAN_GROUP_ID, &[plain.uuid, columns[0].uuid])
        .unwrap_err();
    assert!(matches!(err, ListServiceError::NotInGroup { list_id, .. } if list_id == plain.uuid));

    let unchanged = lists(&conn).kanban_columns().unwrap();
    assert_eq!(unchanged[0].uuid, columns[0].uuid);
}

#[test]
fn reorder_group_requires_each_column_exactly_once() {
    let conn = open_db_in_memory().unwrap();
    let columns = lists(&conn).initialize_kanban().unwrap();
    let (todo, doing, done) = (columns[0].uuid, columns[1].uuid, columns[2].uuid);

    assert!(matches!(
        lists(&conn).reorder_group(KANBAN_GROUP_ID, &[done, done, todo]),
        Err(ListServiceError::InvalidGroupOrder(_))
    ));
    assert!(matches!(
        lists(&conn).reorder_group(KANBAN_GROUP_ID, &[done, todo]),
        Err(ListServiceError::InvalidGroupOrder(_))
    ));

    let unchanged: Vec<_> = lists(&conn)
        .kanban_columns()
        .unwrap()
        .into_iter()
        .map(|column| (column.uuid, column.group_order))
        .collect();
    assert_eq!(unchanged, vec![(todo, 0), (doing, 1), (done, 2)]);

    let reordered = lists(&conn)
        .reorder_group(KANBAN_GROUP_ID, &[done, todo, doing])
        .unwrap();
    let order: Vec<_> = reordered.iter().map(|column| column.uuid).collect();
    assert_eq!(order, vec![done, todo, doing]);
}

#[test]
fn list_names_are_trimmed_unique_and_not_blank() {
    let conn = open_db_in_memory().unwrap();
    let created = lists(&conn)
        .create_list("  Groceries ", "", Some("#ff0000"), None)
        .unwrap();
    assert_eq!(created.name, "Groceries");
    assert_eq!(created.color, "#ff0000");

    assert!(matches!(
        lists(&conn).create_list("groceries", "", None, None),
        Err(ListServiceError::DuplicateName(_))
    ));
    assert!(matches!(
        lists(&conn).create_list("   ", "", None, None),
        Err(ListServiceError::InvalidName(_))
    ));

    let renamed = lists(&conn).rename_list(created.uuid, "Shopping").unwrap();
    assert_eq!(renamed.name, "Shopping");
}

#[test]
fn archived_lists_are_hidden_unless_requested() {
    let conn = open_db_in_memory().unwrap();
    let list = lists(&conn).create_list("Old", "", None, None).unwrap();
    lists(&conn).set_list_archived(list.uuid, true).unwrap();

    assert!(lists(&conn).list_lists(None, false).unwrap().is_empty());
    let all = lists(&conn).list_lists(None, true).unwrap();
    assert_eq!(all.len(), 1);
    assert!(all[0].is_archived);
}

#[test]
fn deleting_a_list_preserves_entries() {
    let conn = open_db_in_memory().unwrap();
    let list = lists(&conn).create_list("Temp", "", None, None).unwrap();
    let entry = new_entry(&conn, "keeper");
    lists(&conn).add_to_list(list.uuid, entry.uuid).unwrap();

    lists(&conn).delete_list(list.uuid).unwrap();

    assert!(matches!(
        lists(&conn).get_list(list.uuid),
        Err(ListServiceError::ListNotFound(_))
    ));
    assert!(lists(&conn)
        .memberships_for_entry(entry.uuid)
        .unwrap()
        .is_empty());
    let still_there = EntryService::new(SqliteEntryRepository::try_new(&conn).unwrap())
        .get_entry(entry.uuid)
        .unwrap();
    assert_eq!(still_there.title, "keeper");
}

#[test]
fn remove_is_idempotent_and_keeps_order_dense() {
    let conn = open_db_in_memory().unwrap();
    let list = lists(&conn).create_list("Queue", "", None, None).unwrap();
    let a = new_entry(&conn, "a");
    let b = new_entry(&conn, "b");
    let c = new_entry(&conn, "c");
    for entry in [&a, &b, &c] {
        lists(&conn).add_to_list(list.uuid, entry.uuid).unwrap();
    }

    assert!(lists(&conn).remove_from_list(list.uuid, b.uuid).unwrap());
    assert!(!lists(&conn).remove_from_list(list.uuid, b.uuid).unwrap());
    assert_eq!(member_ids(&conn, list.uuid), vec![a.uuid, c.uuid]);
    assert_eq!(order_indexes(&conn, list.uuid), vec![0, 1]);
}

#[test]
fn move_within_list_clamps_and_rewrites_indexes() {
    let conn = open_db_in_memory().unwrap();
    let list = lists(&conn).create_list("Ranked", "", None, None).unwrap();
    let other = lists(&conn).create_list("Other", "", None, None).unwrap();
    let a = new_entry(&conn, "a");
    let b = new_entry(&conn, "b");
    let c = new_entry(&conn, "c");
    for entry in [&a, &b, &c] {
        lists(&conn).add_to_list(list.uuid, entry.uuid).unwrap();
    }
    lists(&conn).add_to_list(other.uuid, a.uuid).unwrap();

    let moved = lists(&conn).move_within_list(list.uuid, a.uuid, 99).unwrap();
    let ids: Vec<Uuid> = moved.iter().map(|member| member.entry_id).collect();
    assert_eq!(ids, vec![b.uuid, c.uuid, a.uuid]);
    assert_eq!(order_indexes(&conn, list.uuid), vec![0, 1, 2]);

    lists(&conn).move_within_list(list.uuid, c.uuid, -5).unwrap();
    assert_eq!(member_ids(&conn, list.uuid), vec![c.uuid, b.uuid, a.uuid]);
    assert_eq!(member_ids(&conn, other.uuid), vec![a.uuid]);

    let outsider = new_entry(&conn, "outsider");
    assert!(matches!(
        lists(&conn).move_within_list(list.uuid, outsider.uuid, 0),
        Err(ListServiceError::NotAMember { .. })
    ));
}

#[test]
fn unknown_list_or_entry_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let list = lists(&conn).create_list("Real", "", None, None).unwrap();
    let entry = new_entry(&conn, "real");

    assert!(matches!(
        lists(&conn).add_to_list(Uuid::new_v4(), entry.uuid),
        Err(ListServiceError::ListNotFound(_))
    ));
    assert!(matches!(
        lists(&conn).add_to_list(list.uuid, Uuid::new_v4()),
        Err(ListServiceError::EntryNotFound(_))
    ));
    assert!(matches!(
        lists(&conn).remove_from_list(Uuid::new_v4(), entry.uuid),
        Err(ListServiceError::ListNotFound(_))
    ));
    assert!(matches!(
        lists(&conn).memberships_for_entry(Uuid::new_v4()),
        Err(ListServiceError::EntryNotFound(_))
    ));
    assert!(lists(&conn).memberships_for_entry(entry.uuid).unwrap().is_empty());
}

#[test]
fn cascade_delete_compacts_every_touched_list() {
    let conn = open_db_in_memory().unwrap();
    let entries = EntryService::new(SqliteEntryRepository::try_new(&conn).unwrap());
    let pins = PinService::new(SqliteLineageRepository::try_new(&conn).unwrap());
    let days = DayService::new(SqliteDayRepository::try_new(&conn).unwrap());

    let list = lists(&conn).create_list("Mixed", "", None, None).unwrap();
    let columns = lists(&conn).initialize_kanban().unwrap();
    let first = new_entry(&conn, "first");
    let pinned = new_entry(&conn, "pinned");
    let last = new_entry(&conn, "last");
    pins.pin(pinned.uuid).unwrap();
    let copy = days.get_day(day("2024-05-09")).unwrap().entries[0]
        .entry
        .clone();

    for entry in [&first, &pinned, &copy, &last] {
        lists(&conn).add_to_list(list.uuid, entry.uuid).unwrap();
    }
    lists(&conn).add_to_list(columns[0].uuid, first.uuid).unwrap();
    lists(&conn).add_to_list(columns[0].uuid, copy.uuid).unwrap();
    lists(&conn).add_to_list(columns[0].uuid, last.uuid).unwrap();

    let deletion = entries.delete_entry(pinned.uuid).unwrap();
    assert_eq!(deletion.deleted_entry_ids.len(), 2);
    assert_eq!(deletion.touched_list_ids.len(), 2);

    assert_eq!(member_ids(&conn, list.uuid), vec![first.uuid, last.uuid]);
    assert_eq!(order_indexes(&conn, list.uuid), vec![0, 1]);
    assert_eq!(member_ids(&conn, columns[0].uuid), vec![first.uuid, last.uuid]);
    assert_eq!(order_indexes(&conn, columns[0].uuid), vec![0, 1]);
}

#[test]
fn memberships_serialize_for_export() {
    let conn = open_db_in_memory().unwrap();
    let list = lists(&conn).create_list("Export", "", None, None).unwrap();
    let entry = new_entry(&conn, "exported");
    lists(&conn).add_to_list(list.uuid, entry.uuid).unwrap();

    let memberships = lists(&conn).memberships_for_entry(entry.uuid).unwrap();
    let value = serde_json::to_value(&memberships).unwrap();
    assert_eq!(value[0]["list_name"], "Export");
    assert_eq!(value[0]["order_index"], 0);
    assert!(value[0]["exclusivity_group_id"].is_null());

    let entry_value = serde_json::to_value(&entry).unwrap();
    assert_eq!(entry_value["entry_date"], "2024-05-08");
    assert_eq!(entry_value["is_pin_origin"], false);
}
