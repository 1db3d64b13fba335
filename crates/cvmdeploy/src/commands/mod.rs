pub mod artifact;
pub mod delete;
pub mod deploy;
pub mod genesis;
pub mod metadata;
