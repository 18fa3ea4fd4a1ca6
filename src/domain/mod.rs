pub mod id;
pub mod track;
