pub mod bank_directory;
pub mod entities;
pub mod iban;
pub mod money;
