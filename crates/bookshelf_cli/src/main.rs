//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `bookshelf_core` linkage without the Flutter runtime.
//! - Seed a throwaway in-memory catalog and print its book list.

use bookshelf_core::{
    BookFilters, BookInput, BookService, CancellationToken, CatalogConfig, InMemoryStore,
    ReferenceClass, ReferenceService, ServiceError,
};

fn main() {
    println!("bookshelf_core ping={}", bookshelf_core::ping());
    println!("bookshelf_core version={}", bookshelf_core::core_version());

    if let Err(err) = run_demo() {
        eprintln!("demo catalog failed: {err}");
        std::process::exit(1);
    }
}

fn run_demo() -> Result<(), ServiceError> {
    let store = InMemoryStore::new();
    let config = CatalogConfig::default();
    let references = ReferenceService::new(&store, config);
    let books = BookService::new(&store, config);
    let token = CancellationToken::new();

    let publisher = references.create_reference(ReferenceClass::Publisher, "Acme", &token)?;
    let genre = references.create_reference(ReferenceClass::Genre, "Essay", &token)?;
    let ann = references.create_reference(ReferenceClass::Author, "Ann", &token)?;
    let bob = references.create_reference(ReferenceClass::Author, "Bob", &token)?;

    for (title, isbd, year, authors) in [
        ("Zebra Notes", "978-0-01", 1999, vec![ann.clone()]),
        ("Atlas", "978-0-02", 2005, vec![ann, bob]),
    ] {
        books.create_book(
            &BookInput {
                title: title.to_string(),
                isbd: isbd.to_string(),
                year: Some(year),
                publisher: Some(publisher.clone()),
                genre: Some(genre.clone()),
                authors,
            },
            &token,
        )?;
    }

    for book in books.query_books(&BookFilters::default(), &token)? {
        println!("{} | {}", book.title, book.describe());
    }
    Ok(())
}
