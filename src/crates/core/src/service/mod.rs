//! Service layer
//!
//! REST collaborators of the study backend: document library, account
//! auth, and uploads. Independent of the chat core; they share only the
//! HTTP client, the endpoint config, and the error type.

pub mod auth;
pub mod library;
pub mod upload;

pub use auth::{AuthService, AuthSession, AuthUser, Credentials};
pub use library::{FileEntry, LibraryService};
pub use upload::{UploadService, UploadedFile};
