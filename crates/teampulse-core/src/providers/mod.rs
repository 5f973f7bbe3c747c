//! Provider clients
//!
//! - LinearB: teams, repositories, users, measurement exports
//! - Jira: JQL search and counts

pub mod jira;
pub mod linearb;

pub use jira::{FieldValue, Issue, JiraClient};
pub use linearb::{repository_names, LinearbClient, LinearbUser, Repository};
