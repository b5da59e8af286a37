//! Page handlers for the application.
//!
//! Each page handler fetches what it needs from the EPR backend and
//! renders plain HTML; the shared markup helpers live in [`views`].

pub mod home;
pub mod organisation;
pub mod registration;
pub mod views;

// Re-export all page handlers for convenient access
pub use home::home;
pub use organisation::{organisation, organisation_link};
pub use registration::registration;
