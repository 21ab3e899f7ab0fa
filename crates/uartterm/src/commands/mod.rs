pub mod connect;
pub mod defaults;
pub mod ports;
