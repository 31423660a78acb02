//! FFI catalog API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose catalog use-cases to Dart via FRB as flat envelopes.
//! - Track screen sessions so a disposed screen cancels its pending work.
//! - Translate the UI's empty-string "nothing selected" id into `None`.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - Failures are reported in envelopes (`ok=false`, `error_code`, `message`).
//! - Calls naming a closed or unknown screen run with a cancelled token and
//!   report `error_code=cancelled`.
//! - The screen registry lock is never held across DB work; closing a screen
//!   cancels its token even while a load for it is in flight.

use bookshelf_core::db::open_db;
use bookshelf_core::{
    core_version as core_version_inner, init_logging as init_logging_inner, parse_year_bound,
    ping as ping_inner, toggle_author, BookFilters, BookInput, BookRecord, BookService,
    CancellationToken, CatalogConfig, IsbdPolicy, ReferenceClass, ReferenceEntity,
    ReferenceService, ScreenSession, ServiceError, SqliteObjectStore, TitleOrdering,
    ValidationError,
};
use log::warn;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock};
use uuid::Uuid;

const CATALOG_DB_FILE_NAME: &str = "bookshelf_catalog.sqlite3";
const DB_PATH_ENV: &str = "BOOKSHELF_DB_PATH";
const ISBD_POLICY_ENV: &str = "BOOKSHELF_ISBD_POLICY";

static CATALOG_DB_PATH: OnceLock<PathBuf> = OnceLock::new();
static CATALOG_CONFIG: OnceLock<CatalogConfig> = OnceLock::new();
static SCREENS: OnceLock<Mutex<HashMap<String, ScreenEntry>>> = OnceLock::new();

/// Registry slot of one open screen.
///
/// The token is cloned out so closing never waits on the session lock.
struct ScreenEntry {
    token: CancellationToken,
    session: Arc<Mutex<ScreenSession>>,
}

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// Returns an empty string on success and the error message otherwise.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Reference entity as shown in choice lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceItem {
    /// Stable object ID in string form.
    pub id: String,
    /// Store class name (`Publisher|Author|Genre|ISBD`).
    pub class_name: String,
    pub name: String,
}

/// Choices of one class, or the store message when that class failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceGroup {
    pub class_name: String,
    pub items: Vec<ReferenceItem>,
    /// Store message shown verbatim; `None` when the class loaded.
    pub error: Option<String>,
}

/// Response of `catalog_load_choices`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoicesResponse {
    pub ok: bool,
    pub groups: Vec<ChoiceGroup>,
    /// Machine-readable failure kind (`cancelled|store|...`).
    pub error_code: Option<String>,
    pub message: String,
}

/// Response of `catalog_open_screen`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenResponse {
    pub ok: bool,
    pub screen_id: Option<String>,
    pub message: String,
}

/// Response of reference creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceActionResponse {
    pub ok: bool,
    pub item: Option<ReferenceItem>,
    /// Machine-readable failure kind (`validation|conflict|store|...`).
    pub error_code: Option<String>,
    pub message: String,
}

/// Book row for list and create responses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookItem {
    pub id: String,
    pub title: String,
    pub year: Option<i32>,
    pub isbd: String,
    pub publisher: Option<ReferenceItem>,
    pub genre: Option<ReferenceItem>,
    pub authors: Vec<ReferenceItem>,
    /// `Publisher: .., Year: .., ISBD: .., Genre: .., Author(s): ..` line.
    pub summary: String,
}

/// Book creation form values. Empty ids mean "nothing selected".
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BookCreateRequest {
    pub title: String,
    pub isbd: String,
    pub year: Option<i32>,
    pub publisher_id: String,
    pub genre_id: String,
    pub author_ids: Vec<String>,
}

/// Response of `catalog_create_book`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookActionResponse {
    pub ok: bool,
    pub book: Option<BookItem>,
    pub error_code: Option<String>,
    pub message: String,
}

/// Book list filter values as held by the filter panel.
///
/// Empty strings mean "no filter"; `ordering` is `ascending|descending`,
/// anything else disables sorting.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BookQueryRequest {
    pub ordering: String,
    pub title_contains: String,
    pub year_from: String,
    pub year_to: String,
    pub publisher_id: String,
    pub genre_id: String,
    pub isbd_id: String,
    pub author_id: String,
}

/// Response of `catalog_query_books`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookListResponse {
    pub ok: bool,
    pub items: Vec<BookItem>,
    pub error_code: Option<String>,
    pub message: String,
}

/// Opens a screen session (`book_form` or `book_list`).
///
/// # FFI contract
/// - Sync call, no DB access.
/// - The returned `screen_id` is passed to every later catalog call of that
///   screen and released with `catalog_close_screen`.
#[flutter_rust_bridge::frb(sync)]
pub fn catalog_open_screen(kind: String) -> ScreenResponse {
    let session = match kind.trim() {
        "book_form" => ScreenSession::book_form(),
        "book_list" => ScreenSession::book_list(),
        other => {
            return ScreenResponse {
                ok: false,
                screen_id: None,
                message: format!("unknown screen kind `{other}`; expected book_form|book_list"),
            };
        }
    };

    let screen_id = Uuid::new_v4().to_string();
    let entry = ScreenEntry {
        token: session.token().clone(),
        session: Arc::new(Mutex::new(session)),
    };
    match screens().lock() {
        Ok(mut sessions) => {
            sessions.insert(screen_id.clone(), entry);
            ScreenResponse {
                ok: true,
                screen_id: Some(screen_id),
                message: "Screen opened.".to_string(),
            }
        }
        Err(_) => ScreenResponse {
            ok: false,
            screen_id: None,
            message: "screen registry unavailable".to_string(),
        },
    }
}

/// Closes a screen session and cancels its outstanding work.
///
/// Returns `true` when the session existed. Does not wait for in-flight
/// calls of that screen; they observe the cancelled token.
#[flutter_rust_bridge::frb(sync)]
pub fn catalog_close_screen(screen_id: String) -> bool {
    let removed = screens()
        .lock()
        .ok()
        .and_then(|mut sessions| sessions.remove(screen_id.trim()));
    match removed {
        Some(entry) => {
            entry.token.cancel();
            true
        }
        None => false,
    }
}

/// Loads the screen's reference choices once per session.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - A failing class is reported in its group; other classes still load.
/// - Repeated calls return the cached choices without reloading.
#[flutter_rust_bridge::frb(sync)]
pub fn catalog_load_choices(screen_id: String) -> ChoicesResponse {
    let shared = match screens().lock() {
        Ok(sessions) => sessions
            .get(screen_id.trim())
            .map(|entry| Arc::clone(&entry.session)),
        Err(_) => {
            return choices_failure("store", "screen registry unavailable".to_string());
        }
    };
    let Some(shared) = shared else {
        return choices_failure(
            ServiceError::Cancelled.code(),
            format!("catalog_load_choices failed: screen `{screen_id}` is closed"),
        );
    };
    // Per-screen lock only; the registry is already released here.
    let Ok(mut session) = shared.lock() else {
        return choices_failure("store", "screen session unavailable".to_string());
    };

    let loaded = with_reference_service(|service| session.ensure_choices(service));
    let failures = match loaded {
        Ok(failures) => failures,
        Err(err) => {
            return choices_failure(err.code(), format!("catalog_load_choices failed: {err}"));
        }
    };

    let groups = session
        .choices()
        .classes()
        .iter()
        .map(|class| ChoiceGroup {
            class_name: class.class_name().to_string(),
            items: session
                .choices_for(*class)
                .unwrap_or_default()
                .iter()
                .map(to_reference_item)
                .collect(),
            error: failures
                .iter()
                .find(|failure| failure.class == *class)
                .map(|failure| failure.message.clone()),
        })
        .collect::<Vec<_>>();
    let message = if failures.is_empty() {
        "Choices loaded.".to_string()
    } else {
        format!("{} class(es) failed to load.", failures.len())
    };
    ChoicesResponse {
        ok: true,
        groups,
        error_code: None,
        message,
    }
}

/// Creates a reference record from the object creation form.
///
/// `class_name` is one of `Publisher|Author|Genre|ISBD`.
#[flutter_rust_bridge::frb(sync)]
pub fn catalog_create_reference(
    screen_id: String,
    class_name: String,
    name: String,
) -> ReferenceActionResponse {
    let token = screen_token(&screen_id);
    match with_reference_service(|service| {
        service.create_reference_named(&class_name, &name, &token)
    }) {
        Ok(entity) => ReferenceActionResponse {
            ok: true,
            message: format!("{} created.", entity.class),
            item: Some(to_reference_item(&entity)),
            error_code: None,
        },
        Err(err) => ReferenceActionResponse {
            ok: false,
            item: None,
            error_code: Some(err.code().to_string()),
            message: format!("catalog_create_reference failed: {err}"),
        },
    }
}

/// Toggles `candidate` in the form's author selection.
///
/// Items are compared by id. An unparsable id, in the selection or in the
/// candidate, leaves the selection unchanged.
#[flutter_rust_bridge::frb(sync)]
pub fn catalog_toggle_author(
    selected: Vec<ReferenceItem>,
    candidate: ReferenceItem,
) -> Vec<ReferenceItem> {
    let parsed = selected
        .iter()
        .map(to_author_entity)
        .collect::<Result<Vec<_>, _>>()
        .and_then(|current| {
            to_author_entity(&candidate).map(|candidate| (current, candidate))
        });
    match parsed {
        Ok((current, candidate)) => toggle_author(&current, &candidate)
            .iter()
            .map(to_reference_item)
            .collect(),
        Err(err) => {
            warn!("event=author_toggle module=ffi status=error error={err}");
            selected
        }
    }
}

/// Creates a book with its publisher, genre, authors and ISBD.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
/// - `error_code=conflict` when the ISBD already exists under the unique
///   policy; `orphaned_isbd` when the ISBD record was saved but the book was
///   not.
#[flutter_rust_bridge::frb(sync)]
pub fn catalog_create_book(screen_id: String, request: BookCreateRequest) -> BookActionResponse {
    let token = screen_token(&screen_id);
    let created = with_catalog(|references, books| {
        let input = BookInput {
            title: request.title.clone(),
            isbd: request.isbd.clone(),
            year: request.year,
            publisher: references.resolve_selection(
                ReferenceClass::Publisher,
                &request.publisher_id,
                &token,
            )?,
            genre: references.resolve_selection(
                ReferenceClass::Genre,
                &request.genre_id,
                &token,
            )?,
            authors: references.resolve_selections(
                ReferenceClass::Author,
                &request.author_ids,
                &token,
            )?,
        };
        books.create_book(&input, &token)
    });

    match created {
        Ok(book) => BookActionResponse {
            ok: true,
            message: "Book created.".to_string(),
            book: Some(to_book_item(&book)),
            error_code: None,
        },
        Err(err) => BookActionResponse {
            ok: false,
            book: None,
            error_code: Some(err.code().to_string()),
            message: format!("catalog_create_book failed: {err}"),
        },
    }
}

/// Runs the book list query for the filter panel values.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Empty filter values apply no constraint; year `0` means no bound.
#[flutter_rust_bridge::frb(sync)]
pub fn catalog_query_books(screen_id: String, request: BookQueryRequest) -> BookListResponse {
    let token = screen_token(&screen_id);
    let listed = with_catalog(|references, books| {
        let filters = BookFilters {
            ordering: TitleOrdering::parse(&request.ordering),
            title_contains: request.title_contains.clone(),
            year_from: parse_year_bound(&request.year_from)?,
            year_to: parse_year_bound(&request.year_to)?,
            publisher: references.resolve_selection(
                ReferenceClass::Publisher,
                &request.publisher_id,
                &token,
            )?,
            genre: references.resolve_selection(
                ReferenceClass::Genre,
                &request.genre_id,
                &token,
            )?,
            isbd: references.resolve_selection(ReferenceClass::Isbd, &request.isbd_id, &token)?,
            author: references.resolve_selection(
                ReferenceClass::Author,
                &request.author_id,
                &token,
            )?,
        };
        books.query_books(&filters, &token)
    });

    match listed {
        Ok(records) => {
            let items = records.iter().map(to_book_item).collect::<Vec<_>>();
            let message = if items.is_empty() {
                "No books.".to_string()
            } else {
                format!("Found {} book(s).", items.len())
            };
            BookListResponse {
                ok: true,
                items,
                error_code: None,
                message,
            }
        }
        Err(err) => BookListResponse {
            ok: false,
            items: Vec::new(),
            error_code: Some(err.code().to_string()),
            message: format!("catalog_query_books failed: {err}"),
        },
    }
}

fn screens() -> &'static Mutex<HashMap<String, ScreenEntry>> {
    SCREENS.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Token of an open screen; empty id runs uncancellable, closed ids cancelled.
fn screen_token(screen_id: &str) -> CancellationToken {
    let trimmed = screen_id.trim();
    if trimmed.is_empty() {
        return CancellationToken::new();
    }
    let open = screens()
        .lock()
        .ok()
        .and_then(|sessions| sessions.get(trimmed).map(|entry| entry.token.clone()));
    open.unwrap_or_else(|| {
        let closed = CancellationToken::new();
        closed.cancel();
        closed
    })
}

fn resolve_catalog_db_path() -> PathBuf {
    CATALOG_DB_PATH
        .get_or_init(|| {
            if let Ok(raw) = std::env::var(DB_PATH_ENV) {
                let trimmed = raw.trim();
                if !trimmed.is_empty() {
                    return PathBuf::from(trimmed);
                }
            }
            std::env::temp_dir().join(CATALOG_DB_FILE_NAME)
        })
        .clone()
}

fn resolve_catalog_config() -> CatalogConfig {
    *CATALOG_CONFIG.get_or_init(|| {
        let policy = match std::env::var(ISBD_POLICY_ENV) {
            Ok(raw) if !raw.trim().is_empty() => IsbdPolicy::parse(&raw).unwrap_or_else(|| {
                warn!(
                    "event=config_load module=ffi status=fallback key={} value={}",
                    ISBD_POLICY_ENV,
                    raw.trim()
                );
                IsbdPolicy::default()
            }),
            _ => IsbdPolicy::default(),
        };
        CatalogConfig::new(policy)
    })
}

fn with_reference_service<T>(
    f: impl FnOnce(&ReferenceService<&SqliteObjectStore<'_>>) -> Result<T, ServiceError>,
) -> Result<T, ServiceError> {
    with_catalog(|references, _| f(references))
}

fn with_catalog<T>(
    f: impl FnOnce(
        &ReferenceService<&SqliteObjectStore<'_>>,
        &BookService<&SqliteObjectStore<'_>>,
    ) -> Result<T, ServiceError>,
) -> Result<T, ServiceError> {
    let conn = open_db(resolve_catalog_db_path()).map_err(bookshelf_core::StoreError::from)?;
    let store = SqliteObjectStore::try_new(&conn)?;
    let config = resolve_catalog_config();
    let references = ReferenceService::new(&store, config);
    let books = BookService::new(&store, config);
    f(&references, &books)
}

fn choices_failure(code: &str, message: String) -> ChoicesResponse {
    ChoicesResponse {
        ok: false,
        groups: Vec::new(),
        error_code: Some(code.to_string()),
        message,
    }
}

fn to_author_entity(item: &ReferenceItem) -> Result<ReferenceEntity, ValidationError> {
    let id = Uuid::parse_str(item.id.trim())
        .map_err(|_| ValidationError::InvalidId(item.id.clone()))?;
    Ok(ReferenceEntity::new(
        id,
        ReferenceClass::Author,
        item.name.as_str(),
    ))
}

fn to_reference_item(entity: &ReferenceEntity) -> ReferenceItem {
    ReferenceItem {
        id: entity.id.to_string(),
        class_name: entity.class.class_name().to_string(),
        name: entity.name.clone(),
    }
}

fn to_book_item(book: &BookRecord) -> BookItem {
    BookItem {
        id: book.id.to_string(),
        title: book.title.clone(),
        year: book.year,
        isbd: book.isbd.text().unwrap_or_default().to_string(),
        publisher: book.publisher.as_ref().map(to_reference_item),
        genre: book.genre.as_ref().map(to_reference_item),
        authors: book.authors.iter().map(to_reference_item).collect(),
        summary: book.describe(),
    }
}
