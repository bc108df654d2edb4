pub mod cookie;
pub mod create;
pub mod error;
pub mod hooks;
pub mod manage;
pub mod options;
pub mod policy;
pub mod redeem;
pub mod schema;
pub mod store;
pub mod token;
