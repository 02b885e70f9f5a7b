//! Credentials and placement for the wide-column backend.

use serde::Deserialize;

/// AWS credentials plus region (and an optional local endpoint override)
/// for a DynamoDB deployment. Credentials arrive per request and are never
/// read from ambient configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DynamoEndpoint {
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    #[serde(default)]
    pub session_token: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

impl DynamoEndpoint {
    /// Resolve into an SDK config for this endpoint.
    pub async fn sdk_config(&self) -> aws_config::SdkConfig {
        let credentials = aws_sdk_dynamodb::config::Credentials::new(
            self.access_key.clone(),
            self.secret_key.clone(),
            self.session_token.clone(),
            None,
            "docload",
        );
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(aws_sdk_dynamodb::config::Region::new(self.region.clone()));
        if let Some(url) = &self.url {
            loader = loader.endpoint_url(url);
        }
        loader.load().await
    }
}
