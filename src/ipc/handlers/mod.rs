pub mod backlog;
pub mod backup_exchange;
pub mod baskets;
pub mod catalogue;
pub mod core;
pub mod ingest;
pub mod records;
pub mod results;
