pub mod channel;
pub mod conditions;
pub mod config;
pub mod cursor;
pub mod director;
pub mod effects;
pub mod history;
pub mod variables;
