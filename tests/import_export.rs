mod common;

use std::io::Cursor;

use common::{TestHub, text};
use repobase::dialect::DialectHints;
use repobase::engine::Value;
use repobase::error::Error;
use repobase::files::ArtifactPath;
use repobase::types::QualifiedName;

fn csv_hints() -> DialectHints {
    DialectHints {
        delimiter: ",".to_string(),
        quote_character: "\"".to_string(),
        has_header: true,
        ..DialectHints::default()
    }
}

fn table(name: &str) -> QualifiedName {
    QualifiedName::new("alice", "sales", name).unwrap()
}

#[test]
fn test_import_with_duplicate_headers() {
    let t = TestHub::new();
    let path = t.upload(
        "sales",
        "People.csv",
        b"Name,Name,2 Col\nada,lovelace,1815\n\"grace, rear admiral\",hopper,1906\n",
    );

    let report = t.hub.import_file("alice", &path, &csv_hints()).unwrap();

    assert_eq!(report.table, "alice.sales.people");
    assert_eq!(report.columns, vec!["name", "name_1", "col_2_col"]);
    assert_eq!(report.rows_loaded, 2);

    let page = t.hub.browse_table("alice", &table("people"), None).unwrap();
    assert_eq!(page.columns, vec!["name", "name_1", "col_2_col"]);
    assert_eq!(
        page.rows[1],
        vec![text("grace, rear admiral"), text("hopper"), text("1906")]
    );
}

#[test]
fn test_import_tab_separated_without_header() {
    let t = TestHub::new();
    let path = t.upload("sales", "2024 regions.tsv", b"north\t10\nsouth\t20\neast\t30\n");

    let hints = DialectHints {
        other_delimiter: "\\t".to_string(),
        other_quote_character: "'".to_string(),
        has_header: false,
        ..DialectHints::default()
    };
    let report = t.hub.import_file("alice", &path, &hints).unwrap();

    assert_eq!(report.table, "alice.sales.table_2024_regions");
    assert_eq!(report.columns, vec!["col_0", "col_1"]);
    assert_eq!(report.rows_loaded, 3);

    let page = t
        .hub
        .run_query(
            "alice",
            "alice",
            "sales",
            "select sum(cast(col_1 as integer)) from sales.table_2024_regions",
            None,
        )
        .unwrap();
    assert_eq!(page.rows, vec![vec![Value::Integer(60)]]);
}

#[test]
fn test_import_latin1_values() {
    let t = TestHub::new();
    let path = t.upload("sales", "cities.csv", b"city\nz\xfcrich\n");

    t.hub.import_file("alice", &path, &csv_hints()).unwrap();

    let page = t.hub.browse_table("alice", &table("cities"), None).unwrap();
    assert_eq!(page.rows, vec![vec![text("zürich")]]);
}

#[test]
fn test_import_empty_file() {
    let t = TestHub::new();
    let path = t.upload("sales", "empty.csv", b"");

    assert!(matches!(
        t.hub.import_file("alice", &path, &csv_hints()),
        Err(Error::EmptyOrUnreadableInput(_))
    ));
    assert!(
        t.hub
            .list_relations("alice", "alice", "sales")
            .unwrap()
            .tables
            .is_empty()
    );
}

#[test]
fn test_import_missing_file() {
    let t = TestHub::new();
    let path = ArtifactPath::new("alice", "sales", "ghost.csv").unwrap();
    assert!(matches!(
        t.hub.import_file("alice", &path, &csv_hints()),
        Err(Error::NotFound)
    ));
}

#[test]
fn test_import_invalid_dialect() {
    let t = TestHub::new();
    let path = t.upload("sales", "a.csv", b"a\n1\n");
    let hints = DialectHints {
        delimiter: ";;".to_string(),
        quote_character: "\"".to_string(),
        ..DialectHints::default()
    };
    assert!(matches!(
        t.hub.import_file("alice", &path, &hints),
        Err(Error::InvalidDialect(_))
    ));
}

#[test]
fn test_failed_load_keeps_empty_table() {
    let t = TestHub::new();
    let path = t.upload("sales", "ragged.csv", b"a,b\n1,2\n3\n");

    assert!(t.hub.import_file("alice", &path, &csv_hints()).is_err());

    let relations = t.hub.list_relations("alice", "alice", "sales").unwrap();
    assert_eq!(relations.tables, vec!["ragged"]);
    let page = t.hub.browse_table("alice", &table("ragged"), None).unwrap();
    assert!(page.rows.is_empty());
}

#[test]
fn test_import_twice_fails() {
    let t = TestHub::new();
    let path = t.upload("sales", "dup.csv", b"a\n1\n");
    t.hub.import_file("alice", &path, &csv_hints()).unwrap();
    assert!(matches!(
        t.hub.import_file("alice", &path, &csv_hints()),
        Err(Error::Execution(_))
    ));
}

#[test]
fn test_import_requires_create() {
    let t = TestHub::new();
    let path = t.upload("sales", "a.csv", b"a\n1\n");
    t.hub
        .add_collaborator("alice", "alice", "sales", "bob", None)
        .unwrap();

    assert!(matches!(
        t.hub.import_file("bob", &path, &csv_hints()),
        Err(Error::AccessDenied)
    ));
    assert_eq!(t.hub.download_file("bob", &path).unwrap(), b"a\n1\n");
    assert!(
        t.hub
            .list_relations("alice", "alice", "sales")
            .unwrap()
            .tables
            .is_empty()
    );
}

#[test]
fn test_denied_file_operations_leave_no_trace() {
    let t = TestHub::new();
    t.owner_sql("sales", "CREATE TABLE sales.orders (id integer)");
    t.owner_sql("sales", "INSERT INTO sales.orders VALUES (1)");
    t.hub
        .add_collaborator("alice", "alice", "sales", "bob", None)
        .unwrap();

    assert!(matches!(
        t.hub.export_table("bob", &table("orders")),
        Err(Error::AccessDenied)
    ));
    assert!(t.hub.list_files("alice", "alice", "sales").unwrap().is_empty());

    let upload = ArtifactPath::new("alice", "sales", "planted.csv").unwrap();
    assert!(matches!(
        t.hub
            .upload_file("bob", &upload, &mut Cursor::new(b"x\n".to_vec())),
        Err(Error::AccessDenied)
    ));
    assert!(t.hub.list_files("alice", "alice", "sales").unwrap().is_empty());

    let kept = t.upload("sales", "notes.txt", b"keep me");
    assert!(matches!(
        t.hub.delete_file("bob", &kept),
        Err(Error::AccessDenied)
    ));
    assert_eq!(t.hub.download_file("alice", &kept).unwrap(), b"keep me");

    // Strangers hold nothing at all on the repo.
    assert!(matches!(
        t.hub.download_file("carol", &kept),
        Err(Error::AccessDenied)
    ));
    let names: Vec<_> = t
        .hub
        .list_files("alice", "alice", "sales")
        .unwrap()
        .into_iter()
        .map(|f| f.name)
        .collect();
    assert_eq!(names, vec!["notes.txt"]);
}

#[test]
fn test_export_then_reimport_round_trips() {
    let t = TestHub::new();
    let path = t.upload(
        "sales",
        "orders.csv",
        b"id,note\n1,\"comma, inside\"\n2,\"quote \"\"here\"\"\"\n3,\n",
    );
    t.hub.import_file("alice", &path, &csv_hints()).unwrap();

    let report = t.hub.export_table("alice", &table("orders")).unwrap();
    assert_eq!(report.path, "alice/sales/orders.csv");
    assert_eq!(report.rows_written, 3);

    let exported = t.hub.download_file("alice", &path).unwrap();
    let copy = t.upload("sales", "orders_copy.csv", &exported);
    let reloaded = t.hub.import_file("alice", &copy, &csv_hints()).unwrap();
    assert_eq!(reloaded.rows_loaded, 3);

    let original = t.hub.browse_table("alice", &table("orders"), None).unwrap();
    let copied = t
        .hub
        .browse_table("alice", &table("orders_copy"), None)
        .unwrap();
    assert_eq!(original.columns, copied.columns);
    assert_eq!(original.rows, copied.rows);
}

#[test]
fn test_export_card() {
    let t = TestHub::new();
    let path = t.upload("sales", "orders.csv", b"id,region\n1,north\n2,south\n");
    t.hub.import_file("alice", &path, &csv_hints()).unwrap();
    t.hub
        .create_card(
            "alice",
            "alice",
            "sales",
            "north_only",
            "select id from sales.orders where region = 'north'",
        )
        .unwrap();

    let report = t
        .hub
        .export_card("alice", "alice", "sales", "north_only")
        .unwrap();
    assert_eq!(report.rows_written, 1);

    let exported = ArtifactPath::new("alice", "sales", "north_only.csv").unwrap();
    assert_eq!(t.hub.download_file("alice", &exported).unwrap(), b"id\n1\n");
}

#[test]
fn test_file_lifecycle() {
    let t = TestHub::new();

    assert!(t.hub.list_files("alice", "alice", "sales").unwrap().is_empty());

    let path = t.upload("sales", "notes.txt", b"hello");
    let files = t.hub.list_files("alice", "alice", "sales").unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].name, "notes.txt");
    assert_eq!(files[0].size, 5);

    t.hub.delete_file("alice", &path).unwrap();
    assert!(matches!(
        t.hub.delete_file("alice", &path),
        Err(Error::NotFound)
    ));
    assert!(matches!(
        t.hub.download_file("alice", &path),
        Err(Error::NotFound)
    ));
}

#[test]
fn test_delete_repo_removes_files() {
    let t = TestHub::new();
    let path = t.upload("hr", "staff.csv", b"name\nada\n");
    t.hub.delete_repo("alice", "alice", "hr").unwrap();
    t.hub.create_repo("alice", "alice", "hr").unwrap();
    assert!(matches!(
        t.hub.download_file("alice", &path),
        Err(Error::NotFound)
    ));
}
