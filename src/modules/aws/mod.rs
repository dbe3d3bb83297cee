pub mod clients;
pub mod utils;

pub mod alias;
pub mod event_mapping;
pub mod facts;
pub mod function;
pub mod function_code;
pub mod invoke;
pub mod permission;
pub mod s3_notification;
pub mod version;

use std::sync::Arc;

pub use alias::AliasModule;
pub use event_mapping::EventMappingModule;
pub use function::FunctionModule;
pub use function_code::FunctionCodeModule;
pub use permission::PermissionModule;
pub use s3_notification::S3NotificationModule;
pub use version::VersionModule;

use clients::{IamOperations, IamService, LambdaOperations, LambdaService, S3Operations, S3Service};
use crate::modules::ResourceModule;
use crate::utils::Config;

/// The service boundaries every resource module is built from.
#[derive(Clone)]
pub struct AwsClients {
    pub lambda: Arc<dyn LambdaOperations>,
    pub s3: Arc<dyn S3Operations>,
    pub iam: Arc<dyn IamOperations>,
}

impl AwsClients {
    pub async fn from_config(config: &Config) -> Self {
        let sdk_config = utils::get_aws_config(config).await;

        Self {
            lambda: Arc::new(LambdaService::new(aws_sdk_lambda::Client::new(&sdk_config))),
            s3: Arc::new(S3Service::new(aws_sdk_s3::Client::new(&sdk_config))),
            iam: Arc::new(IamService::new(aws_sdk_iam::Client::new(&sdk_config))),
        }
    }

    pub fn modules(&self) -> Vec<Arc<dyn ResourceModule>> {
        vec![
            Arc::new(FunctionModule::new(self.lambda.clone(), self.iam.clone())),
            Arc::new(FunctionCodeModule::new(self.lambda.clone())),
            Arc::new(AliasModule::new(self.lambda.clone())),
            Arc::new(VersionModule::new(self.lambda.clone())),
            Arc::new(EventMappingModule::new(self.lambda.clone())),
            Arc::new(PermissionModule::new(self.lambda.clone())),
            Arc::new(S3NotificationModule::new(self.s3.clone())),
        ]
    }
}
