pub mod domain;
pub mod ports;

pub use domain::{Contract, ContractAnalysis, NewContract, User, UserCredentials};
pub use ports::{ContractDocument, ContractExtractionService, DatabaseService, PortError, PortResult};
