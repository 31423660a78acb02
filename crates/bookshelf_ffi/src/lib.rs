//! Flutter-facing bindings for the Bookshelf catalog core.

pub mod api;
