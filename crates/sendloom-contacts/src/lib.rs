//! # Sendloom Contacts
//! Reads contacts from a CSV file into ordered field maps, locates the
//! phone column tolerantly, and normalizes numbers to international format.
//! Rows without a usable phone are excluded and reported; they never reach
//! the orchestrator.

pub mod phone;
pub mod reader;

pub use reader::{read_contacts, ContactBook};
