//! Value, table and response types shared by stages, dispatchers and clients.

mod response;
mod table;
mod value;

pub use response::{CallStatus, Response};
pub use table::{Column, Table, TableError};
pub use value::{ColumnType, Value};
