pub mod capture;
pub mod glasses;
pub mod logging;
pub mod session_store;
