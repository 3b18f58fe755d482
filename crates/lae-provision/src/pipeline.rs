use std::sync::Arc;

use lae_infra::Services;
use lae_infra::types::{
    AccountCredentials, AddressPair, ConnectionDescriptor, InstanceSpec, LaunchedInstance,
    ServerRecord,
};
use tracing::{error, info};

use crate::config::{OperatorSettings, PipelineTimings};
use crate::poll::{PollError, PollPolicy, RetryError, RetryPolicy};
use crate::request::{CredentialSource, DeploymentRequest, Served};
use crate::{Error, Result, Stage};

/// Drives one customer's server from signup to serving.
#[derive(Clone)]
pub struct Pipeline {
    services: Services,
    operator: Arc<OperatorSettings>,
    timings: PipelineTimings,
}

enum State {
    Activating {
        activation_key: String,
    },
    Verifying {
        credentials: AccountCredentials,
    },
    ProvisioningBucket {
        credentials: AccountCredentials,
    },
    Launching {
        credentials: AccountCredentials,
    },
    ResolvingAddress {
        credentials: AccountCredentials,
        instance: LaunchedInstance,
    },
    Installing {
        credentials: AccountCredentials,
        instance: LaunchedInstance,
        addresses: AddressPair,
    },
    StartingService {
        credentials: AccountCredentials,
        instance: LaunchedInstance,
        addresses: AddressPair,
    },
    Recording {
        instance: LaunchedInstance,
        addresses: AddressPair,
        descriptor: ConnectionDescriptor,
    },
    Notifying {
        instance: LaunchedInstance,
        addresses: AddressPair,
        descriptor: ConnectionDescriptor,
    },
}

impl State {
    fn initial(request: &DeploymentRequest) -> Self {
        match &request.credentials {
            CredentialSource::Activate { activation_key } => Self::Activating {
                activation_key: activation_key.clone(),
            },
            // Replacement skips activation and verification.
            CredentialSource::Stored(secrets) => Self::ProvisioningBucket {
                credentials: secrets.credentials(),
            },
        }
    }

    fn stage(&self) -> Stage {
        match self {
            Self::Activating { .. } => Stage::Activating,
            Self::Verifying { .. } => Stage::Verifying,
            Self::ProvisioningBucket { .. } => Stage::ProvisioningBucket,
            Self::Launching { .. } => Stage::Launching,
            Self::ResolvingAddress { .. } => Stage::ResolvingAddress,
            Self::Installing { .. } => Stage::Installing,
            Self::StartingService { .. } => Stage::StartingService,
            Self::Recording { .. } => Stage::Recording,
            Self::Notifying { .. } => Stage::Notifying,
        }
    }
}

enum Flow {
    Next(State),
    Served(Served),
}

impl Pipeline {
    pub fn new(services: Services, operator: Arc<OperatorSettings>, timings: PipelineTimings) -> Self {
        Self {
            services,
            operator,
            timings,
        }
    }

    /// Run every stage in order. Any failure notifies staff and ends the run;
    /// resources created by earlier stages are left in place.
    pub async fn run(&self, request: &DeploymentRequest) -> Result<Served> {
        let mut state = State::initial(request);

        loop {
            let stage = state.stage();
            info!(stage = %stage, customer = %request.customer.email, "provisioning stage");

            match self.step(request, state).await {
                Ok(Flow::Next(next)) => state = next,
                Ok(Flow::Served(served)) => {
                    info!(
                        instance_id = %served.instance_id,
                        public_host = %served.public_host,
                        customer = %request.customer.email,
                        "server is serving"
                    );
                    return Ok(served);
                }
                Err(e) => return Err(self.fail(request, stage, e).await),
            }
        }
    }

    async fn step(&self, request: &DeploymentRequest, state: State) -> Result<Flow> {
        let timings = &self.timings;
        let operator = &*self.operator;

        let next = match state {
            State::Activating { activation_key } => {
                let credentials = self
                    .services
                    .billing
                    .activate(&activation_key, &request.product_token)
                    .await
                    .map_err(Error::remote(Stage::Activating, "billing"))?;
                State::Verifying { credentials }
            }

            State::Verifying { credentials } => {
                let billing = &*self.services.billing;
                let creds = &credentials;
                let token = request.product_token.as_str();

                PollPolicy::new(timings.poll_interval_secs, timings.verification_budget_secs)
                    .run("subscription verification", || async move {
                        billing
                            .verify_subscription(creds, token)
                            .await
                            .map(|verified| verified.then_some(()))
                    })
                    .await
                    .map_err(|e| match e {
                        PollError::Exhausted { polls } => Error::VerificationTimeout { polls },
                        PollError::Failed(source) => Error::remote(Stage::Verifying, "billing")(source),
                    })?;

                info!(access_key_id = %credentials.access_key_id, "subscription verified");
                State::ProvisioningBucket { credentials }
            }

            State::ProvisioningBucket { credentials } => {
                self.services
                    .storage
                    .create_or_adopt_bucket(&credentials, &request.bucket_name, request.location.as_deref())
                    .await
                    .map_err(Error::remote(Stage::ProvisioningBucket, &request.bucket_name))?;
                State::Launching { credentials }
            }

            State::Launching { credentials } => {
                let instance = self
                    .services
                    .compute
                    .launch_instance(&InstanceSpec {
                        image_id: request.image_id.clone(),
                        instance_size: request.instance_size.clone(),
                        bucket_name: request.bucket_name.clone(),
                        keypair_name: operator.admin_keypair_name.clone(),
                        instance_name: request.instance_name.clone(),
                    })
                    .await
                    .map_err(Error::remote(Stage::Launching, "compute"))?;

                info!(
                    instance_id = %instance.id,
                    delay_secs = timings.address_delay_secs,
                    "instance launched, waiting before polling for addresses"
                );
                tokio::time::sleep(timings.address_delay()).await;
                State::ResolvingAddress {
                    credentials,
                    instance,
                }
            }

            State::ResolvingAddress {
                credentials,
                instance,
            } => {
                let compute = &*self.services.compute;
                let ids = std::slice::from_ref(&instance.id);

                let pairs = PollPolicy::new(timings.poll_interval_secs, timings.address_budget_secs)
                    .run("instance addresses", || async move { compute.resolve_addresses(ids).await })
                    .await
                    .map_err(|e| match e {
                        PollError::Exhausted { polls } => Error::AddressTimeout { polls },
                        PollError::Failed(source) => {
                            Error::remote(Stage::ResolvingAddress, instance.id.to_string())(source)
                        }
                    })?;

                let addresses = match <[AddressPair; 1]>::try_from(pairs) {
                    Ok([pair]) => pair,
                    Err(pairs) => return Err(Error::AddressCount { count: pairs.len() }),
                };

                info!(
                    instance_id = %instance.id,
                    public_host = %addresses.public_host,
                    "instance addresses assigned"
                );
                State::Installing {
                    credentials,
                    instance,
                    addresses,
                }
            }

            State::Installing {
                credentials,
                instance,
                addresses,
            } => {
                let installer = &*self.services.installer;
                let host = addresses.public_host.as_str();

                RetryPolicy::new(timings.listen_retries, timings.listen_poll())
                    .run("ssh", lae_infra::Error::is_not_listening, || async move {
                        installer
                            .install(
                                host,
                                &operator.admin_privkey_path,
                                &operator.monitor_pubkey,
                                &operator.monitor_privkey_path,
                            )
                            .await
                    })
                    .await
                    .map_err(|e| match e {
                        RetryError::Exhausted { attempts } => Error::ListenTimeout {
                            host: host.to_string(),
                            attempts,
                        },
                        RetryError::Failed(source) => Error::remote(Stage::Installing, host)(source),
                    })?;

                State::StartingService {
                    credentials,
                    instance,
                    addresses,
                }
            }

            State::StartingService {
                credentials,
                instance,
                addresses,
            } => {
                let descriptor = self
                    .services
                    .installer
                    .bounce_service(
                        &addresses.public_host,
                        &operator.admin_privkey_path,
                        &addresses.private_host,
                        &credentials,
                        &request.bucket_name,
                        request.old_secrets(),
                    )
                    .await
                    .map_err(Error::remote(Stage::StartingService, &addresses.public_host))?;

                State::Recording {
                    instance,
                    addresses,
                    descriptor,
                }
            }

            State::Recording {
                instance,
                addresses,
                descriptor,
            } => {
                self.services
                    .server_log
                    .append(&ServerRecord {
                        launch_time: instance.launch_time,
                        instance_id: instance.id.clone(),
                        public_host: addresses.public_host.clone(),
                    })
                    .await
                    .map_err(Error::Recording)?;

                State::Notifying {
                    instance,
                    addresses,
                    descriptor,
                }
            }

            State::Notifying {
                instance,
                addresses,
                descriptor,
            } => {
                let notifier = &self.services.notifier;
                let customer = &request.customer;

                // A replacement keeps the customer's existing descriptor.
                if !request.is_replacement() {
                    notifier
                        .send_confirmation(
                            &addresses.public_host,
                            &customer.name,
                            &customer.email,
                            &descriptor,
                            customer.key_info.as_deref(),
                        )
                        .await
                        .map_err(Error::remote(Stage::Notifying, &customer.email))?;
                }

                info!(public_host = %addresses.public_host, "setting up monitoring");
                notifier
                    .register_monitoring(
                        &addresses.public_host,
                        &operator.monitoring_host,
                        &operator.monitoring_privkey_path,
                    )
                    .await
                    .map_err(Error::remote(Stage::Notifying, &operator.monitoring_host))?;

                return Ok(Flow::Served(Served {
                    instance_id: instance.id,
                    launch_time: instance.launch_time,
                    public_host: addresses.public_host,
                    bucket_name: request.bucket_name.clone(),
                    descriptor,
                }));
            }
        };

        Ok(Flow::Next(next))
    }

    async fn fail(&self, request: &DeploymentRequest, stage: Stage, e: Error) -> Error {
        let customer = &request.customer;
        error!(stage = %stage, customer = %customer.email, error = %e, "provisioning failed");

        if let Err(notify_err) = self
            .services
            .notifier
            .send_failure(&e.to_string(), &customer.name, &customer.email)
            .await
        {
            error!(error = %notify_err, "failed to notify staff of provisioning failure");
        }
        e
    }
}
