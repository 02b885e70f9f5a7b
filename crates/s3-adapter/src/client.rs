//! Thin wrapper over the S3 SDK scoped to what the object-store loader
//! needs: bucket lifecycle, prefix listings, and single-object put/delete.

use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration, Delete, ObjectIdentifier};
use aws_sdk_s3::Client;
use loader_core::AdapterError;
use tracing::info;

/// Objects per DeleteObjects request.
const DELETE_CHUNK: usize = 1000;

pub struct S3Client {
    inner: Client,
    region: String,
}

fn classify<E>(err: SdkError<E>) -> AdapterError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let message = DisplayErrorContext(&err).to_string();
    match &err {
        SdkError::DispatchFailure(_) | SdkError::TimeoutError(_) => {
            AdapterError::Unavailable(message)
        }
        _ => match err.code() {
            Some(
                "InvalidAccessKeyId" | "SignatureDoesNotMatch" | "AccessDenied"
                | "ExpiredToken" | "TokenRefreshRequired",
            ) => AdapterError::Auth(message),
            Some("NoSuchBucket") => AdapterError::ContainerMissing(message),
            _ => AdapterError::Backend(message),
        },
    }
}

impl S3Client {
    /// Build a client from per-request credentials.
    pub async fn connect(
        access_key: &str,
        secret_key: &str,
        session_token: Option<String>,
        region: &str,
    ) -> Self {
        let credentials = aws_sdk_s3::config::Credentials::new(
            access_key.to_string(),
            secret_key.to_string(),
            session_token,
            None,
            "docload",
        );
        let config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(aws_sdk_s3::config::Region::new(region.to_string()))
            .load()
            .await;
        Self {
            inner: Client::new(&config),
            region: region.to_string(),
        }
    }

    /// Create a bucket in the client's region. Returns `false` (without
    /// error) when the bucket already exists under this account.
    pub async fn create_bucket(&self, bucket: &str) -> Result<bool, AdapterError> {
        let mut request = self.inner.create_bucket().bucket(bucket);
        // us-east-1 is the one region that rejects an explicit constraint.
        if self.region != "us-east-1" {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }
        match request.send().await {
            Ok(_) => Ok(true),
            Err(err)
                if matches!(
                    err.code(),
                    Some("BucketAlreadyOwnedByYou" | "BucketAlreadyExists")
                ) =>
            {
                Ok(false)
            }
            Err(err) => Err(classify(err)),
        }
    }

    async fn list_keys(&self, bucket: &str, prefix: Option<&str>) -> Result<Vec<String>, AdapterError> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;
        loop {
            let mut request = self.inner.list_objects_v2().bucket(bucket);
            if let Some(prefix) = prefix {
                request = request.prefix(prefix);
            }
            if let Some(token) = &continuation {
                request = request.continuation_token(token);
            }
            let output = request.send().await.map_err(classify)?;
            keys.extend(
                output
                    .contents()
                    .iter()
                    .filter_map(|object| object.key())
                    .map(|key| key.to_string()),
            );
            match output.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => return Ok(keys),
            }
        }
    }

    /// Keys directly under a folder prefix (a trailing slash is appended
    /// when missing).
    pub async fn list_files_in_folder(
        &self,
        bucket: &str,
        folder_path: &str,
    ) -> Result<Vec<String>, AdapterError> {
        let prefix = if folder_path.ends_with('/') {
            folder_path.to_string()
        } else {
            format!("{folder_path}/")
        };
        self.list_keys(bucket, Some(&prefix)).await
    }

    /// Every key in the bucket.
    pub async fn list_all_keys(&self, bucket: &str) -> Result<Vec<String>, AdapterError> {
        self.list_keys(bucket, None).await
    }

    /// Total object population of the bucket.
    pub async fn count_objects(&self, bucket: &str) -> Result<u64, AdapterError> {
        Ok(self.list_all_keys(bucket).await?.len() as u64)
    }

    pub async fn upload_object(
        &self,
        bucket: &str,
        key: &str,
        content: Vec<u8>,
    ) -> Result<(), AdapterError> {
        self.inner
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(content))
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    pub async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), AdapterError> {
        self.inner
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    /// Delete every object in the bucket.
    pub async fn empty_bucket(&self, bucket: &str) -> Result<(), AdapterError> {
        let keys = self.list_all_keys(bucket).await?;
        for chunk in keys.chunks(DELETE_CHUNK) {
            let mut identifiers = Vec::with_capacity(chunk.len());
            for key in chunk {
                identifiers.push(
                    ObjectIdentifier::builder()
                        .key(key)
                        .build()
                        .map_err(|e| AdapterError::Backend(e.to_string()))?,
                );
            }
            let delete = Delete::builder()
                .set_objects(Some(identifiers))
                .build()
                .map_err(|e| AdapterError::Backend(e.to_string()))?;
            self.inner
                .delete_objects()
                .bucket(bucket)
                .delete(delete)
                .send()
                .await
                .map_err(classify)?;
        }
        Ok(())
    }

    /// Empty the bucket, then delete it.
    pub async fn delete_bucket(&self, bucket: &str) -> Result<(), AdapterError> {
        self.empty_bucket(bucket).await?;
        self.inner
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    /// Log the bucket's current key listing, one line per object.
    pub async fn log_bucket_structure(&self, bucket: &str) -> Result<(), AdapterError> {
        let keys = self.list_all_keys(bucket).await?;
        info!("bucket {bucket} holds {} objects", keys.len());
        for key in keys {
            info!("  {bucket}/{key}");
        }
        Ok(())
    }
}
