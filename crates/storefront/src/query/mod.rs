//! Parameterized SQL construction for the catalog.
//!
//! - [`sql`] - clause objects ([`Select`], [`Fragment`], [`Cte`]) rendered to
//!   text plus an ordered parameter list
//! - [`facets`] - the relation of products matching every requested facet
//! - [`products`] - listing, count, detail and strip statements
//!
//! No user input is ever spliced into SQL text; every value travels as a
//! bound parameter.

pub mod facets;
pub mod products;
pub mod sql;

pub use products::ProductQueryBuilder;
pub use sql::{Cte, Fragment, QueryBuildError, RenderedQuery, Select, SqlParam};
