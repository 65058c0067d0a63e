//! Datastore contract for apps, routes, and opaque key/value extras
//! (spec component B), plus the one in-memory backend shipped here.

pub mod datastore;
pub mod error;
pub mod filter;
pub mod memory;
pub mod model;
pub mod validator;

pub use datastore::{Datastore, ResolvedRoute, RouteResolver};
pub use error::DataError;
pub use filter::{AppFilter, RouteFilter};
pub use memory::MemoryDatastore;
pub use model::{App, ExecConfig, Route, RouteFormat, RouteType, Task};
pub use validator::Validator;
