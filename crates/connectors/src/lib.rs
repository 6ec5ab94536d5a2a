pub mod conn_str;
pub mod sql;
