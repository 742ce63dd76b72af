pub mod commands;
pub mod expiry;
pub mod registry;
pub mod scheduler;
pub mod service;
pub mod sweep;

pub use crate::domain::model::{
    CertificateInfo, CheckState, Domain, ExpiryDecision, ProbeMode, ProbeOutcome, Subdomain,
    SubdomainInfo,
};
pub use crate::domain::ports::{
    CertificateProber, DomainRepository, Notifier, RecordSource, Storage,
};
pub use crate::utils::error::Result;
