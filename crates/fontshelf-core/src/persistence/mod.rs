//! On-disk formats: the JSON catalog document and CSV interchange.

mod atomic;
mod csv_io;
mod document;

pub use atomic::{read_json_file, write_file_atomic, write_json_file, backup_path_for};
pub use csv_io::{export_csv, import_csv, read_csv, write_csv};
pub use document::{load_catalog, save_catalog};
