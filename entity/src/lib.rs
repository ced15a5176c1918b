//! # Entity 模块
//!
//! 包含所有 Sea-ORM 实体定义

pub mod integration_credentials;

pub use integration_credentials::Entity as IntegrationCredentials;
