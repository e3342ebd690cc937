//! Account domain: credential records, storage and self-service operations

pub mod models;
pub mod repository;
pub mod service;

pub use models::{Account, AccountPublic, ChangePasswordRequest, NewAccount, RegisterRequest};
pub use repository::{AccountRepository, PgAccountRepository, RepositoryError};
pub use service::AccountService;
