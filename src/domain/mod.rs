pub mod models;
pub mod settings;
pub mod text_processing;
