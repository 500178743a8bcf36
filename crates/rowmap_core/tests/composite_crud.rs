mod common;

use common::{
    count_rows, manager, open_test_db, person, City, Employee, Executive, Manager,
    ManagerWithUpdateTracker, Mood, Person,
};
use rowmap_core::{Accessor, AccessorError, Entity, SqlResult, UpdatePolicy};

#[derive(Debug, Clone, Default, Entity)]
struct Visitor {
    #[db = "first_name"]
    first_name: String,
    #[db = "last_name"]
    last_name: String,
    #[db = "email"]
    email: Option<String>,
}

#[test]
fn create_backfills_auto_increment_id() {
    let conn = open_test_db();
    let accessor = Accessor::new(&conn);

    let mut city = City {
        name: "San Jose".to_string(),
        zip_code: "95120".to_string(),
        ..City::default()
    };
    accessor.create(&mut city, "city", &[]).unwrap();
    assert!(city.id > 0);

    let mut loaded = City {
        id: city.id,
        ..City::default()
    };
    accessor.read(&mut loaded, "city", &[]).unwrap();
    assert_eq!(loaded, city);
}

#[test]
fn create_keeps_explicit_id() {
    let conn = open_test_db();
    let accessor = Accessor::new(&conn);

    let mut city = City {
        id: 42,
        name: "Fremont".to_string(),
        zip_code: "94536".to_string(),
    };
    accessor.create(&mut city, "city", &["id"]).unwrap();
    assert_eq!(city.id, 42);
    assert_eq!(count_rows(&conn, "city", 42), 1);
}

#[test]
fn create_without_id_mapping_inserts_plain_row() {
    let conn = open_test_db();
    let accessor = Accessor::new(&conn);

    let mut visitor = Visitor {
        first_name: "foo".to_string(),
        last_name: "visitor".to_string(),
        email: Some("foo@visitor".to_string()),
    };
    accessor.create(&mut visitor, "person", &[]).unwrap();

    let mut loaded = Visitor {
        first_name: "foo".to_string(),
        last_name: "visitor".to_string(),
        ..Visitor::default()
    };
    accessor
        .read(&mut loaded, "person", &["first_name", "last_name"])
        .unwrap();
    assert_eq!(loaded.email.as_deref(), Some("foo@visitor"));
}

#[test]
fn create_with_unmapped_id_field_fails() {
    let conn = open_test_db();
    let accessor = Accessor::new(&conn);

    let mut visitor = Visitor::default();
    let err = accessor.create(&mut visitor, "person", &["id"]).unwrap_err();
    assert!(matches!(err, AccessorError::MissingIdColumns));
}

#[test]
fn composite_create_propagates_root_id_to_every_level() {
    let conn = open_test_db();
    let accessor = Accessor::new(&conn);

    let mut record = manager("Ada", "Lovelace");
    accessor.create(&mut record, "manager", &[]).unwrap();

    let id = record.employee.person.id;
    assert!(id > 0);
    for table in ["person", "employee", "manager"] {
        assert_eq!(count_rows(&conn, table, id), 1, "missing row in {table}");
    }
}

#[test]
fn executive_chain_round_trips_with_absent_optionals() {
    let conn = open_test_db();
    let accessor = Accessor::new(&conn);

    let mut executive = Executive::default();
    executive.manager.employee.person.first_name = "Grace".to_string();
    executive.manager.employee.person.last_name = "Hopper".to_string();
    accessor.create(&mut executive, "executive", &[]).unwrap();

    let id = executive.manager.employee.person.id;
    assert!(id > 0);
    for table in ["person", "employee", "manager", "executive"] {
        assert_eq!(count_rows(&conn, table, id), 1, "missing row in {table}");
    }

    let mut loaded = Executive::default();
    loaded.manager.employee.person.id = id;
    accessor.read(&mut loaded, "executive", &[]).unwrap();

    assert_eq!(loaded, executive);
    let person = &loaded.manager.employee.person;
    assert_eq!(person.first_name, "Grace");
    assert_eq!(person.email, None);
    assert_eq!(person.age, None);
    assert_eq!(person.current_mood, Mood::Unknown);
    assert_eq!(loaded.manager.title, None);
    assert_eq!(loaded.manager.employee.company, None);
    assert_eq!(loaded.level, None);

    let email_is_null: bool = accessor
        .get_value("SELECT email IS NULL FROM person WHERE id = ?1", [id])
        .unwrap();
    assert!(email_is_null);
}

#[test]
fn read_unknown_id_reports_not_found() {
    let conn = open_test_db();
    let accessor = Accessor::new(&conn);

    let mut record = Manager::default();
    record.employee.person.id = 999;
    let err = accessor.read(&mut record, "manager", &[]).unwrap_err();
    assert!(matches!(err, AccessorError::NotFound));
}

#[test]
fn read_with_unmapped_id_field_fails() {
    let conn = open_test_db();
    let accessor = Accessor::new(&conn);

    let mut record = Person::default();
    let err = accessor.read(&mut record, "person", &["nickname"]).unwrap_err();
    assert!(matches!(err, AccessorError::MissingIdColumns));
}

#[test]
fn untracked_update_rewrites_every_level() {
    let conn = open_test_db();
    let accessor = Accessor::new(&conn);

    let mut record = manager("Ada", "Lovelace");
    accessor.create(&mut record, "manager", &[]).unwrap();
    let id = record.employee.person.id;

    record.employee.person.email = Some("ada@acme".to_string());
    record.employee.company = Some("Analytical Engines".to_string());
    record.title = Some("Chief".to_string());
    let result = accessor.update(&record, "manager", &[]).unwrap();
    assert_eq!(result.rows_affected, 1);

    let mut loaded = Manager::default();
    loaded.employee.person.id = id;
    accessor.read(&mut loaded, "manager", &[]).unwrap();
    assert_eq!(loaded, record);
}

#[test]
fn tracked_update_skips_unchanged_tables() {
    let conn = open_test_db();
    let accessor = Accessor::new(&conn);

    let mut created = manager("Ada", "Lovelace");
    accessor.create(&mut created, "manager", &[]).unwrap();
    let id = created.employee.person.id;

    // employee row drifts behind the wrapper's back
    accessor
        .exec("UPDATE employee SET company = ?1 WHERE id = ?2", rusqlite::params!["Elsewhere", id])
        .unwrap();

    let mut tracked = ManagerWithUpdateTracker::new(created.clone());
    tracked.set_email(Some("ada@acme".to_string()));
    tracked.set_title(Some("Chief".to_string()));

    let result = accessor.update(&tracked, "manager", &[]).unwrap();
    assert_eq!(result.rows_affected, 1);

    let mut loaded = Manager::default();
    loaded.employee.person.id = id;
    accessor.read(&mut loaded, "manager", &[]).unwrap();
    assert_eq!(loaded.employee.person.email.as_deref(), Some("ada@acme"));
    assert_eq!(loaded.title.as_deref(), Some("Chief"));
    assert_eq!(loaded.employee.company.as_deref(), Some("Elsewhere"));
    assert_eq!(loaded.employee.person.first_name, "Ada");
}

#[test]
fn tracked_update_only_sets_changed_columns() {
    let conn = open_test_db();
    let accessor = Accessor::new(&conn);

    let mut created = manager("Ada", "Lovelace");
    accessor.create(&mut created, "manager", &[]).unwrap();
    let id = created.employee.person.id;

    let mut tracked = ManagerWithUpdateTracker::new(created);
    tracked.entity.employee.person.first_name = "Untracked".to_string();
    tracked.set_email(Some("ada@acme".to_string()));
    accessor.update(&tracked, "manager", &[]).unwrap();

    let first_name: String = accessor
        .get_value("SELECT first_name FROM person WHERE id = ?1", [id])
        .unwrap();
    assert_eq!(first_name, "Ada");
}

#[test]
fn tracked_update_without_changes_is_noop() {
    let conn = open_test_db();
    let accessor = Accessor::new(&conn);

    let mut created = manager("Ada", "Lovelace");
    accessor.create(&mut created, "manager", &[]).unwrap();

    let tracked = ManagerWithUpdateTracker::new(created);
    let result = accessor.update(&tracked, "manager", &[]).unwrap();
    assert_eq!(result, SqlResult::noop());
}

#[test]
fn final_level_skip_reports_noop_even_when_bases_change() {
    let conn = open_test_db();
    let accessor = Accessor::new(&conn);

    let mut created = manager("Ada", "Lovelace");
    accessor.create(&mut created, "manager", &[]).unwrap();

    let mut tracked = ManagerWithUpdateTracker::new(created);
    tracked.set_company(Some("Analytical Engines".to_string()));
    let result = accessor.update(&tracked, "manager", &[]).unwrap();
    assert_eq!(result.rows_affected, 0);

    let company: String = accessor
        .get_value(
            "SELECT company FROM employee WHERE id = ?1",
            [tracked.entity.employee.person.id],
        )
        .unwrap();
    assert_eq!(company, "Analytical Engines");
}

#[test]
fn skip_unless_tracked_policy_ignores_untracked_records() {
    let conn = open_test_db();
    let accessor = Accessor::new(&conn).with_update_policy(UpdatePolicy::SkipUnlessTracked);

    let mut record = manager("Ada", "Lovelace");
    accessor.create(&mut record, "manager", &[]).unwrap();
    let id = record.employee.person.id;

    record.title = Some("Chief".to_string());
    let result = accessor.update(&record, "manager", &[]).unwrap();
    assert_eq!(result, SqlResult::noop());

    let title: String = accessor
        .get_value("SELECT title FROM manager WHERE id = ?1", [id])
        .unwrap();
    assert_eq!(title, "Director");

    let mut tracked = ManagerWithUpdateTracker::new(record);
    tracked.set_title(Some("Chief".to_string()));
    let result = accessor.update(&tracked, "manager", &[]).unwrap();
    assert_eq!(result.rows_affected, 1);
}

#[test]
fn single_table_update_by_natural_key() {
    let conn = open_test_db();
    let accessor = Accessor::new(&conn);

    let mut visitor = Visitor {
        first_name: "foo".to_string(),
        last_name: "test".to_string(),
        email: Some("old@test".to_string()),
    };
    accessor.create(&mut visitor, "person", &[]).unwrap();

    visitor.email = Some("new@test".to_string());
    let result = accessor
        .update(&visitor, "person", &["first_name", "last_name"])
        .unwrap();
    assert_eq!(result.rows_affected, 1);

    let email: String = accessor
        .get_value("SELECT email FROM person WHERE first_name = ?1", ["foo"])
        .unwrap();
    assert_eq!(email, "new@test");
}

#[test]
fn composite_delete_removes_every_level() {
    let conn = open_test_db();
    let accessor = Accessor::new(&conn);

    let mut record = manager("Ada", "Lovelace");
    accessor.create(&mut record, "manager", &[]).unwrap();
    let id = record.employee.person.id;

    let result = accessor.delete(&record, "manager", &[]).unwrap();
    assert_eq!(result.rows_affected, 1);

    for table in ["person", "employee", "manager"] {
        assert_eq!(count_rows(&conn, table, id), 0, "row left in {table}");
    }

    let mut probe = Manager::default();
    probe.employee.person.id = id;
    assert!(matches!(
        accessor.read(&mut probe, "manager", &[]),
        Err(AccessorError::NotFound)
    ));
    let mut employee = Employee::default();
    employee.person.id = id;
    assert!(matches!(
        accessor.read(&mut employee, "employee", &[]),
        Err(AccessorError::NotFound)
    ));
    let mut root = Person {
        id,
        ..Person::default()
    };
    assert!(matches!(
        accessor.read(&mut root, "person", &[]),
        Err(AccessorError::NotFound)
    ));
}

#[test]
fn read_and_delete_returns_removed_values() {
    let conn = open_test_db();
    let accessor = Accessor::new(&conn);

    let mut record = manager("Ada", "Lovelace");
    accessor.create(&mut record, "manager", &[]).unwrap();
    let id = record.employee.person.id;

    let mut target = Manager::default();
    target.employee.person.id = id;
    let result = accessor.read_and_delete(&mut target, "manager", &[]).unwrap();

    assert_eq!(result.rows_affected, 1);
    assert_eq!(target.title.as_deref(), Some("Director"));
    assert_eq!(target.employee.person.first_name, "Ada");
    assert_eq!(count_rows(&conn, "person", id), 0);
}

#[test]
fn delete_by_natural_key() {
    let conn = open_test_db();
    let accessor = Accessor::new(&conn);

    let mut first = person("foo", "test");
    let mut second = person("bar", "test");
    accessor.create(&mut first, "person", &[]).unwrap();
    accessor.create(&mut second, "person", &[]).unwrap();

    let result = accessor
        .delete(&first, "person", &["first_name", "last_name"])
        .unwrap();
    assert_eq!(result.rows_affected, 1);
    assert_eq!(count_rows(&conn, "person", second.id), 1);
}
