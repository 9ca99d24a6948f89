pub mod feedback_service;
pub mod models;
