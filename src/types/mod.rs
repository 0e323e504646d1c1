//! Column types, values, rows and row images.

mod column;
mod metadata;
mod row;
mod row_image;
mod sql_type;
mod value;

pub use column::ColumnInfo;
pub use metadata::{ColumnMetadata, TableMetadata};
pub use row::Row;
pub use row_image::{RowImage, RowSnapshot};
pub use sql_type::SqlType;
pub use value::{SqlValue, WireValue};
