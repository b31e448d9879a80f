pub mod schema;
pub mod value;
pub mod record;
pub mod validation;
pub mod store;
pub mod query;
pub mod error;

pub use error::{FormDbError, Result};
pub use schema::FormSchema;
pub use value::FieldValue;
pub use record::{Payload, Record};
pub use validation::{validate, ErrorMode, ValidationErrors, Validator};
pub use store::{RecordStore, StoreConfig};
pub use query::{query, PageMeta, QueryParams, QueryResult, RawQueryParams, SortOrder};
