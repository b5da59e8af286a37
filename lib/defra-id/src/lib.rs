//! Defra ID identity domain for the EPR frontend.
//!
//! This crate provides:
//! - Token payload decoding into typed claims (`IdentityClaims`)
//! - Organisation relationship parsing (`Relationship`)
//! - Display-name policy for signed-in users
//! - The persisted session record (`UserSession`, `SessionId`) and the
//!   per-request view derived from it (`SessionContext`)
//! - Provider configuration (`DefraIdConfig`)
//!
//! It is deliberately free of I/O and web-framework types: the server binary
//! owns discovery, the OAuth2 exchange, and session storage, and drives this
//! crate with the tokens and claims those produce.
//!
//! # Example
//!
//! ```
//! use epr_frontend_defra_id::relationship::{current_relationship, parse_relationships};
//!
//! let raw = vec![
//!     "rel-1:org-1:Acme Ltd".to_string(),
//!     "rel-2:org-2:Globex".to_string(),
//! ];
//! let relationships = parse_relationships(&raw, Some("rel-2"));
//!
//! let current = current_relationship(&relationships).expect("current relationship");
//! assert_eq!(current.organisation_id, "org-2");
//! assert_eq!(current.organisation_name.as_deref(), Some("Globex"));
//! ```

pub mod claims;
pub mod config;
pub mod display;
pub mod error;
pub mod relationship;
pub mod session;

// Re-export main types at crate root
pub use claims::IdentityClaims;
pub use config::DefraIdConfig;
pub use display::display_name;
pub use error::{ProfileError, TokenDecodeError};
pub use relationship::{Relationship, current_relationship, parse_relationships};
pub use session::{SessionContext, SessionId, SessionUser, TokenSet, UserSession};
