//! Backend credentials: data model, store seam, and in-process implementations

mod file;
mod memory;
mod store;
mod types;

pub use file::{CredentialRecord, load_credentials_file, parse_credentials};
pub use memory::InMemoryCredentialStore;
pub use store::{CredentialStore, SharedCredentialStore};
pub use types::{
    CooldownPolicy, Credential, CredentialHealth, CredentialId, DecryptedCredential, Secret,
};
