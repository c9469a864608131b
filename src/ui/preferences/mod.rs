pub mod appearance_page;
pub mod connection_page;
pub mod speech_page;
