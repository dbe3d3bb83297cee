use async_trait::async_trait;
use aws_sdk_iam::Client as IamClient;

use super::traits::{BoundaryResult, IamOperations};
use crate::modules::aws::utils::classify;
use crate::reconcile::error::BoundaryError;

pub struct IamService {
    client: IamClient,
}

impl IamService {
    pub fn new(client: IamClient) -> Self {
        Self { client }
    }
}

/// The account id is the fifth field of an IAM ARN.
pub fn account_from_arn(arn: &str) -> Option<&str> {
    arn.split(':').nth(4).filter(|id| !id.is_empty())
}

#[async_trait]
impl IamOperations for IamService {
    async fn account_id(&self) -> BoundaryResult<String> {
        let output = self
            .client
            .get_user()
            .send()
            .await
            .map_err(|e| classify("GetUser", e))?;

        let arn = output
            .user()
            .map(|u| u.arn())
            .ok_or_else(|| BoundaryError::unknown("GetUser: no user in response"))?;

        account_from_arn(arn)
            .map(str::to_string)
            .ok_or_else(|| BoundaryError::unknown(format!("GetUser: unexpected ARN {}", arn)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_from_arn() {
        assert_eq!(
            account_from_arn("arn:aws:iam::123456789012:user/deployer"),
            Some("123456789012")
        );
        assert_eq!(account_from_arn("not-an-arn"), None);
    }
}
