use bookshelf_core::db::{open_db, open_db_in_memory};
use bookshelf_core::store::{FieldValue, ObjectStore, Pointer, Query, StoreError, StoreObject};
use bookshelf_core::{InMemoryStore, SqliteObjectStore};
use uuid::Uuid;

fn named(store: &impl ObjectStore, class_name: &str, name: &str) -> Pointer {
    let mut object = StoreObject::new(class_name);
    object.set("name", name);
    store.save(&object).unwrap().to_pointer().unwrap()
}

fn check_insertion_order_and_sorting(store: &impl ObjectStore) {
    for title in ["b", "c", "a"] {
        let mut book = StoreObject::new("Book");
        book.set("title", title);
        store.save(&book).unwrap();
    }

    let titles = |query: &Query| {
        store
            .find(query)
            .unwrap()
            .iter()
            .map(|book| book.text("title").unwrap().to_string())
            .collect::<Vec<_>>()
    };

    let unordered = Query::new("Book");
    assert_eq!(titles(&unordered), vec!["b", "c", "a"]);

    let mut sorted = Query::new("Book");
    sorted.add_descending("title");
    assert_eq!(titles(&sorted), vec!["c", "b", "a"]);

    let mut limited = Query::new("Book");
    limited.add_ascending("title").limit(2);
    assert_eq!(titles(&limited), vec!["a", "b"]);
}

fn check_relation_adds_are_idempotent(store: &impl ObjectStore) {
    let ann = named(store, "Author", "Ann");
    let bob = named(store, "Author", "Bob");

    let mut book = StoreObject::new("Book");
    book.set("title", "T");
    book.relation("authors").add([ann.clone(), bob.clone()]);
    let saved = store.save(&book).unwrap();
    let book_pointer = saved.to_pointer().unwrap();

    let mut again = StoreObject::with_id("Book", book_pointer.object_id);
    again.set("title", "T");
    again.relation("authors").add([ann.clone()]);
    store.save(&again).unwrap();

    let mut members = Query::new("Author");
    members.related_to(book_pointer.clone(), "authors");
    let names = store
        .find(&members)
        .unwrap()
        .iter()
        .map(|author| author.text("name").unwrap().to_string())
        .collect::<Vec<_>>();
    assert_eq!(names, vec!["Ann", "Bob"]);

    let mut by_author = Query::new("Book");
    by_author.equal_to("authors", bob);
    assert_eq!(store.find(&by_author).unwrap().len(), 1);
}

fn check_includes_expand_pointers(store: &impl ObjectStore) {
    let acme = named(store, "Publisher", "Acme");
    let mut book = StoreObject::new("Book");
    book.set("title", "T");
    book.set("publisher", acme.clone());
    store.save(&book).unwrap();

    let mut plain = Query::new("Book");
    plain.equal_to("publisher", acme.clone());
    let row = store.first(&plain).unwrap().unwrap();
    assert_eq!(row.get("publisher"), Some(&FieldValue::Pointer(acme.clone())));

    plain.include("publisher");
    let row = store.first(&plain).unwrap().unwrap();
    let publisher = row.get("publisher").and_then(FieldValue::as_object).unwrap();
    assert_eq!(publisher.text("name"), Some("Acme"));
    assert_eq!(row.get("publisher").unwrap().as_pointer(), Some(acme));
}

fn check_range_and_substring_constraints(store: &impl ObjectStore) {
    for (title, year) in [("Old Tales", 1950_i64), ("New Tales", 2020), ("Undated", 0)] {
        let mut book = StoreObject::new("Book");
        book.set("title", title);
        if year != 0 {
            book.set("year", year);
        }
        store.save(&book).unwrap();
    }

    let mut query = Query::new("Book");
    query
        .contains("title", "Tales")
        .greater_than_or_equal_to("year", 1900)
        .less_than_or_equal_to("year", 2000);
    let rows = store.find(&query).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].text("title"), Some("Old Tales"));

    let mut case_sensitive = Query::new("Book");
    case_sensitive.contains("title", "tales");
    assert!(store.find(&case_sensitive).unwrap().is_empty());
}

fn check_update_of_unknown_id_fails(store: &impl ObjectStore) {
    let ghost = StoreObject::with_id("Book", Uuid::new_v4());
    assert!(matches!(store.save(&ghost), Err(StoreError::NotFound(_))));
}

#[test]
fn in_memory_store_behaviour() {
    check_insertion_order_and_sorting(&InMemoryStore::new());
    check_relation_adds_are_idempotent(&InMemoryStore::new());
    check_includes_expand_pointers(&InMemoryStore::new());
    check_range_and_substring_constraints(&InMemoryStore::new());
    check_update_of_unknown_id_fails(&InMemoryStore::new());
}

#[test]
fn sqlite_store_behaviour() {
    with_sqlite(|store| check_insertion_order_and_sorting(store));
    with_sqlite(|store| check_relation_adds_are_idempotent(store));
    with_sqlite(|store| check_includes_expand_pointers(store));
    with_sqlite(|store| check_range_and_substring_constraints(store));
    with_sqlite(|store| check_update_of_unknown_id_fails(store));
}

fn with_sqlite(scenario: impl Fn(&SqliteObjectStore<'_>)) {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteObjectStore::try_new(&conn).unwrap();
    scenario(&store);
}

#[test]
fn sqlite_store_persists_records_and_relations_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.db");

    let book_pointer = {
        let conn = open_db(&path).unwrap();
        let store = SqliteObjectStore::try_new(&conn).unwrap();
        let ann = named(&store, "Author", "Ann");
        let mut book = StoreObject::new("Book");
        book.set("title", "Kept");
        book.relation("authors").add([ann]);
        store.save(&book).unwrap().to_pointer().unwrap()
    };

    let conn = open_db(&path).unwrap();
    let store = SqliteObjectStore::try_new(&conn).unwrap();
    let mut members = Query::new("Author");
    members.related_to(book_pointer, "authors");
    let authors = store.find(&members).unwrap();
    assert_eq!(authors.len(), 1);
    assert_eq!(authors[0].text("name"), Some("Ann"));
}

#[test]
fn sqlite_store_requires_migrated_connection() {
    let conn = rusqlite::Connection::open_in_memory().unwrap();
    assert!(matches!(
        SqliteObjectStore::try_new(&conn),
        Err(StoreError::MissingRequiredTable("objects"))
    ));
}

#[test]
fn injected_failures_reject_before_state_changes() {
    let store = InMemoryStore::new();
    store.fail_saves("Book", "backend offline");
    let err = store.save(&StoreObject::new("Book")).unwrap_err();
    assert_eq!(err.to_string(), "backend offline");
    assert_eq!(store.write_count(), 0);

    store.fail_queries("Genre", "genre service down");
    assert!(store.find(&Query::new("Genre")).is_err());
    store.clear_failures();
    assert!(store.find(&Query::new("Genre")).unwrap().is_empty());
}
