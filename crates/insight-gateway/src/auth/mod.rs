//! Credential verification and session tokens.

pub mod credentials;
pub mod session;

pub use credentials::{
    verify_credentials, CredentialOutcome, CredentialRecord, CredentialStore,
    InMemoryCredentialStore, StoreError, UserView,
};
pub use session::{Claims, SessionError, SessionIssuer};
