pub mod los;
pub mod obstruction;
pub mod viewshed;
