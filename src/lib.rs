// Library for tests to access modules

pub mod billing;
pub mod config;
pub mod models;
pub mod routes;
pub mod units;
pub mod version;
pub mod vnstat_repo;
pub mod worker;
