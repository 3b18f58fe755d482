use std::fmt;

/// Pipeline stage, used to tag failures and log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Activating,
    Verifying,
    ProvisioningBucket,
    Launching,
    ResolvingAddress,
    Installing,
    StartingService,
    Recording,
    Notifying,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Activating => "activating",
            Self::Verifying => "verifying",
            Self::ProvisioningBucket => "provisioning_bucket",
            Self::Launching => "launching",
            Self::ResolvingAddress => "resolving_address",
            Self::Installing => "installing",
            Self::StartingService => "starting_service",
            Self::Recording => "recording",
            Self::Notifying => "notifying",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("timed out waiting for verification of subscription after {polls} polls")]
    VerificationTimeout { polls: u32 },

    #[error("timed out waiting for instance addresses after {polls} polls")]
    AddressTimeout { polls: u32 },

    #[error("expected exactly one address pair for the instance, got {count}")]
    AddressCount { count: usize },

    #[error("timed out waiting for {host} to listen for ssh connections ({attempts} attempts)")]
    ListenTimeout { host: String, attempts: u32 },

    #[error("{stage} failed against {target}: {source}")]
    Remote {
        stage: Stage,
        target: String,
        source: lae_infra::Error,
    },

    #[error("failed to record server: {0}")]
    Recording(lae_infra::Error),
}

impl Error {
    pub(crate) fn remote(stage: Stage, target: impl Into<String>) -> impl FnOnce(lae_infra::Error) -> Self {
        let target = target.into();
        move |source| Self::Remote {
            stage,
            target,
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
