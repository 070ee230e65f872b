//! Infrastructure layer: config, user records, broker and mail adapters.

pub mod broker;
pub mod config;
pub mod email;
pub mod user_store;

pub use config::{AppConfig, BootstrapAdmin, ConfigError, NotifierConfig, SmtpConfig};
pub use email::{EmailError, EmailMessage, EmailSender, InMemoryEmailSender};
pub use user_store::{InMemoryUserStore, NewUser, User, UserStore, UserStoreError};
