pub mod catalog;
pub mod config;
mod error;
pub mod pipeline;
pub mod poll;
pub mod request;
pub mod signup;

#[cfg(test)]
mod testing;

pub use catalog::ProductDefinition;
pub use config::{AutomationConfig, OperatorSettings, PipelineTimings};
pub use error::{Error, Result, Stage};
pub use pipeline::Pipeline;
pub use request::{CredentialSource, Customer, DeploymentRequest, Served};
pub use signup::{Provisioner, ReplaceRequest, SignupRequest};
