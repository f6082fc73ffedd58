
pub mod core {
    pub mod aggregate;
    pub mod config;
    pub mod error;
    pub mod factory;
    pub mod ledger;
    pub mod measurement;
    pub mod model;
    pub mod runner;
    pub mod status;
}


pub mod sources {
    pub mod power;
}


pub mod reporters;
pub mod store;
