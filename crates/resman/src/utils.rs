pub mod debug;
pub mod errors;
pub mod mem_reader;
