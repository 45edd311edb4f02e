//! Generator infrastructure - lookup table and HTTP adapter

mod http;
mod table;

pub use http::HttpGenerator;
pub use table::GeneratorTable;
