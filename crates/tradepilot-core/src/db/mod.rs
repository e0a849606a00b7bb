//! Database repositories.
//!
//! One repository per table, runtime-bound queries against a shared
//! [`sqlx::PgPool`]. The relational store is the single source of truth;
//! nothing here caches portfolio state across requests.

pub mod credentials;
pub mod decisions;
pub mod incidents;
pub mod models;
pub mod trades;

pub use credentials::{
    CredentialsManager, CredentialsRepository, CredentialsSummary, PlaintextEncoder,
    SecretEncoder, SetCredentials, StoredCredentials,
};
pub use decisions::PendingDecisionRepository;
pub use incidents::IncidentRepository;
pub use models::{ModelRepository, NewModel, UpdateModel};
pub use trades::TradeRepository;
