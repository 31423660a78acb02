use bookshelf_core::{
    CancellationToken, CatalogConfig, ChoiceSnapshot, InMemoryStore, ReferenceClass,
    ReferenceRepository, ReferenceService, RepoError, ScreenSession, ServiceError,
    ValidationError,
};

fn seed(store: &InMemoryStore) {
    let repo = ReferenceRepository::new(store);
    let token = CancellationToken::new();
    for (class, name) in [
        (ReferenceClass::Publisher, "Acme"),
        (ReferenceClass::Publisher, "Borealis"),
        (ReferenceClass::Author, "Ann"),
        (ReferenceClass::Genre, "Essay"),
        (ReferenceClass::Isbd, "978-0"),
    ] {
        repo.create(class, name, &token).unwrap();
    }
}

#[test]
fn load_choices_returns_each_class_in_store_order() {
    let store = InMemoryStore::new();
    seed(&store);
    let repo = ReferenceRepository::new(&store);

    let load = repo
        .load_choices(&ReferenceClass::BOOK_LIST, &CancellationToken::new())
        .unwrap();

    assert!(load.failures.is_empty());
    let publishers = load
        .get(ReferenceClass::Publisher)
        .unwrap()
        .iter()
        .map(|entity| entity.name.as_str())
        .collect::<Vec<_>>();
    assert_eq!(publishers, vec!["Acme", "Borealis"]);
    assert_eq!(load.get(ReferenceClass::Isbd).unwrap()[0].name, "978-0");
}

#[test]
fn failing_class_does_not_block_the_others() {
    let store = InMemoryStore::new();
    seed(&store);
    store.fail_queries("Author", "author shard offline");
    let repo = ReferenceRepository::new(&store);

    let load = repo
        .load_choices(&ReferenceClass::BOOK_FORM, &CancellationToken::new())
        .unwrap();

    assert_eq!(load.failures.len(), 1);
    assert_eq!(load.failures[0].class, ReferenceClass::Author);
    assert_eq!(load.failures[0].message, "author shard offline");
    assert!(load.get(ReferenceClass::Author).is_none());
    assert_eq!(load.get(ReferenceClass::Publisher).unwrap().len(), 2);
    assert_eq!(load.get(ReferenceClass::Genre).unwrap().len(), 1);
}

#[test]
fn empty_class_yields_empty_choice_list() {
    let store = InMemoryStore::new();
    let repo = ReferenceRepository::new(&store);

    let load = repo
        .load_choices(&[ReferenceClass::Genre], &CancellationToken::new())
        .unwrap();
    assert_eq!(load.get(ReferenceClass::Genre), Some(&[][..]));
}

#[test]
fn cancellation_aborts_the_whole_load() {
    let store = InMemoryStore::new();
    seed(&store);
    let repo = ReferenceRepository::new(&store);
    let token = CancellationToken::new();
    token.cancel();

    assert!(matches!(
        repo.load_choices(&ReferenceClass::BOOK_FORM, &token),
        Err(RepoError::Cancelled)
    ));
}

#[test]
fn snapshot_loads_only_while_empty() {
    let store = InMemoryStore::new();
    seed(&store);
    let repo = ReferenceRepository::new(&store);
    let token = CancellationToken::new();
    let mut snapshot = ChoiceSnapshot::new(&ReferenceClass::BOOK_FORM);
    assert!(snapshot.is_empty());

    snapshot.ensure_loaded(&repo, &token).unwrap();
    repo.create(ReferenceClass::Genre, "Poetry", &token).unwrap();
    snapshot.ensure_loaded(&repo, &token).unwrap();

    assert_eq!(snapshot.get(ReferenceClass::Genre).unwrap().len(), 1);
}

#[test]
fn create_trims_names_and_rejects_blank_ones() {
    let store = InMemoryStore::new();
    let service = ReferenceService::new(&store, CatalogConfig::default());
    let token = CancellationToken::new();

    let genre = service
        .create_reference(ReferenceClass::Genre, "  Essay ", &token)
        .unwrap();
    assert_eq!(genre.name, "Essay");
    assert_eq!(genre.class, ReferenceClass::Genre);

    let err = service
        .create_reference(ReferenceClass::Author, "   ", &token)
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Validation(ValidationError::EmptyName(ReferenceClass::Author))
    ));
    assert_eq!(store.object_count("Author"), 0);
}

#[test]
fn created_entities_are_found_by_id() {
    let store = InMemoryStore::new();
    let repo = ReferenceRepository::new(&store);
    let token = CancellationToken::new();
    let author = repo.create(ReferenceClass::Author, "Ann", &token).unwrap();

    assert_eq!(
        repo.find_by_id(ReferenceClass::Author, author.id, &token)
            .unwrap(),
        Some(author.clone())
    );
    assert_eq!(
        repo.find_by_id(ReferenceClass::Genre, author.id, &token)
            .unwrap(),
        None
    );
}

#[test]
fn screen_session_reports_failures_and_keeps_loaded_classes() {
    let store = InMemoryStore::new();
    seed(&store);
    store.fail_queries("Genre", "genre index rebuilding");
    let service = ReferenceService::new(&store, CatalogConfig::default());
    let mut session = ScreenSession::book_list();

    let failures = session.ensure_choices(&service).unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].class, ReferenceClass::Genre);
    assert_eq!(session.choices_for(ReferenceClass::Isbd).unwrap().len(), 1);
    assert!(session.choices_for(ReferenceClass::Genre).is_none());
}
