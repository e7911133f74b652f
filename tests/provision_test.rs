//! Provisioning runs against an in-memory S3 that keeps bucket state,
//! ownership and the public access block rules.

use async_trait::async_trait;
use sitebucket::provision::{Provisioner, ProvisioningResult, Step, BUCKET_ALREADY_OWNED};
use sitebucket::s3::{
    BucketApi, BucketPolicy, CreateBucketConfiguration, PublicAccessBlockConfiguration, S3Error,
    WebsiteConfiguration,
};
use sitebucket::BucketConfig;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
struct BucketState {
    owner: String,
    region: String,
    public_access: PublicAccessBlockConfiguration,
    website: Option<WebsiteConfiguration>,
    policy: Option<BucketPolicy>,
}

/// One account's view of a shared in-memory S3 region
#[derive(Clone)]
struct FakeS3 {
    account: String,
    region: String,
    buckets: Arc<Mutex<HashMap<String, BucketState>>>,
    denied: Arc<Mutex<HashSet<&'static str>>>,
    calls: Arc<Mutex<Vec<&'static str>>>,
}

impl FakeS3 {
    fn new(account: &str, region: &str) -> Self {
        Self {
            account: account.to_string(),
            region: region.to_string(),
            buckets: Arc::new(Mutex::new(HashMap::new())),
            denied: Arc::new(Mutex::new(HashSet::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Another account sharing the same bucket namespace
    fn as_account(&self, account: &str) -> Self {
        Self {
            account: account.to_string(),
            region: self.region.clone(),
            buckets: Arc::clone(&self.buckets),
            denied: Arc::new(Mutex::new(HashSet::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn deny(&self, operation: &'static str) {
        self.denied.lock().unwrap().insert(operation);
    }

    fn bucket(&self, name: &str) -> Option<BucketState> {
        self.buckets.lock().unwrap().get(name).cloned()
    }

    fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn enter(&self, operation: &'static str) -> Result<(), S3Error> {
        self.calls.lock().unwrap().push(operation);
        if self.denied.lock().unwrap().contains(operation) {
            return Err(S3Error::service(403, "AccessDenied", "Access Denied"));
        }
        Ok(())
    }

    fn with_owned_bucket<T>(
        &self,
        name: &str,
        f: impl FnOnce(&mut BucketState) -> Result<T, S3Error>,
    ) -> Result<T, S3Error> {
        let mut buckets = self.buckets.lock().unwrap();
        match buckets.get_mut(name) {
            None => Err(S3Error::service(
                404,
                "NoSuchBucket",
                "The specified bucket does not exist",
            )),
            Some(state) if state.owner != self.account => {
                Err(S3Error::service(403, "AccessDenied", "Access Denied"))
            }
            Some(state) => f(state),
        }
    }
}

#[async_trait]
impl BucketApi for FakeS3 {
    async fn create_bucket(
        &self,
        bucket: &str,
        configuration: Option<CreateBucketConfiguration>,
    ) -> Result<(), S3Error> {
        self.enter("create_bucket")?;

        match (&configuration, self.region.as_str()) {
            (Some(c), "us-east-1") if c.location_constraint == "us-east-1" => {
                return Err(S3Error::service(
                    400,
                    "InvalidLocationConstraint",
                    "The specified location-constraint is not valid",
                ));
            }
            (None, region) if region != "us-east-1" => {
                return Err(S3Error::service(
                    400,
                    "IllegalLocationConstraintException",
                    "The unspecified location constraint is incompatible for the region specific endpoint this request was sent to.",
                ));
            }
            (Some(c), region) if c.location_constraint != region => {
                return Err(S3Error::service(
                    400,
                    "IllegalLocationConstraintException",
                    "The location constraint is incompatible with the endpoint region.",
                ));
            }
            _ => {}
        }

        let mut buckets = self.buckets.lock().unwrap();
        if let Some(existing) = buckets.get(bucket) {
            return Err(if existing.owner == self.account {
                S3Error::service(
                    409,
                    BUCKET_ALREADY_OWNED,
                    "Your previous request to create the named bucket succeeded and you already own it.",
                )
            } else {
                S3Error::service(
                    409,
                    "BucketAlreadyExists",
                    "The requested bucket name is not available.",
                )
            });
        }

        buckets.insert(
            bucket.to_string(),
            BucketState {
                owner: self.account.clone(),
                region: self.region.clone(),
                // New buckets start with every public access flag set
                public_access: PublicAccessBlockConfiguration {
                    block_public_acls: true,
                    ignore_public_acls: true,
                    block_public_policy: true,
                    restrict_public_buckets: true,
                },
                website: None,
                policy: None,
            },
        );
        Ok(())
    }

    async fn put_public_access_block(
        &self,
        bucket: &str,
        configuration: &PublicAccessBlockConfiguration,
    ) -> Result<(), S3Error> {
        self.enter("put_public_access_block")?;
        self.with_owned_bucket(bucket, |state| {
            state.public_access = *configuration;
            Ok(())
        })
    }

    async fn put_bucket_website(
        &self,
        bucket: &str,
        configuration: &WebsiteConfiguration,
    ) -> Result<(), S3Error> {
        self.enter("put_bucket_website")?;
        self.with_owned_bucket(bucket, |state| {
            state.website = Some(configuration.clone());
            Ok(())
        })
    }

    async fn put_bucket_policy(&self, bucket: &str, policy: &BucketPolicy) -> Result<(), S3Error> {
        self.enter("put_bucket_policy")?;
        self.with_owned_bucket(bucket, |state| {
            if state.public_access.block_public_policy {
                return Err(S3Error::service(
                    403,
                    "AccessDenied",
                    "User is not authorized to perform: s3:PutBucketPolicy because public policies are blocked by the BlockPublicPolicy block public access setting.",
                ));
            }
            state.policy = Some(policy.clone());
            Ok(())
        })
    }
}

#[tokio::test]
async fn test_default_scenario_sa_east_1() {
    let s3 = FakeS3::new("111111111111", "sa-east-1");
    let provisioner = Provisioner::new(s3.clone());

    let result = provisioner.provision(&BucketConfig::default()).await;

    assert_eq!(
        result.website_url(),
        Some("http://cloud-app-project-1.s3-website-sa-east-1.amazonaws.com")
    );
    assert!(result.failure().is_none());

    let bucket = s3.bucket("cloud-app-project-1").unwrap();
    assert_eq!(bucket.region, "sa-east-1");
    assert!(bucket.public_access.is_fully_open());
    assert_eq!(
        bucket.website,
        Some(WebsiteConfiguration::new("index.html", "error.html"))
    );
    let policy = bucket.policy.unwrap();
    assert_eq!(policy.statement.len(), 1);
    assert_eq!(policy.statement[0].resource, "arn:aws:s3:::cloud-app-project-1/*");
    assert_eq!(policy.statement[0].action, "s3:GetObject");
    assert_eq!(policy.statement[0].principal, "*");

    assert_eq!(
        s3.calls(),
        vec![
            "create_bucket",
            "put_public_access_block",
            "put_bucket_website",
            "put_bucket_policy"
        ]
    );
}

#[tokio::test]
async fn test_default_region_needs_no_location_constraint() {
    let s3 = FakeS3::new("111111111111", "us-east-1");
    let config = BucketConfig::new("my-site", "us-east-1");

    let result = Provisioner::new(s3.clone()).provision(&config).await;

    assert_eq!(
        result.into_result().unwrap(),
        "http://my-site.s3-website-us-east-1.amazonaws.com"
    );
    assert!(s3.bucket("my-site").unwrap().policy.is_some());
}

#[tokio::test]
async fn test_every_non_default_region_passes_its_constraint() {
    for region in ["sa-east-1", "eu-west-1", "us-west-2", "ap-northeast-1"] {
        let s3 = FakeS3::new("111111111111", region);
        let config = BucketConfig::new("regional-site", region);

        let result = Provisioner::new(s3).provision(&config).await;

        assert!(result.is_success(), "{}: {:?}", region, result);
    }
}

#[tokio::test]
async fn test_bucket_owned_by_other_account() {
    let other = FakeS3::new("222222222222", "sa-east-1");
    Provisioner::new(other.clone())
        .provision(&BucketConfig::default())
        .await
        .into_result()
        .unwrap();

    let mine = other.as_account("111111111111");
    let result = Provisioner::new(mine.clone())
        .provision(&BucketConfig::default())
        .await;

    assert!(result.website_url().is_none());
    let failure = result.failure().unwrap();
    assert_eq!(failure.step, Some(Step::CreateBucket));
    assert_eq!(failure.code, "BucketAlreadyExists");
    assert!(failure.completed_steps.is_empty());
    assert_eq!(mine.calls(), vec!["create_bucket"]);
    assert_eq!(
        mine.bucket("cloud-app-project-1").unwrap().owner,
        "222222222222"
    );
}

#[tokio::test]
async fn test_rerun_converges() {
    let s3 = FakeS3::new("111111111111", "sa-east-1");
    let provisioner = Provisioner::new(s3.clone());
    let config = BucketConfig::default();

    let first = provisioner.provision(&config).await;
    let state_after_first = s3.bucket("cloud-app-project-1").unwrap();
    let second = provisioner.provision(&config).await;
    let state_after_second = s3.bucket("cloud-app-project-1").unwrap();

    assert_eq!(first.website_url(), second.website_url());
    match second {
        ProvisioningResult::Provisioned {
            bucket_preexisting,
            completed_steps,
            ..
        } => {
            assert!(bucket_preexisting);
            assert_eq!(completed_steps, Step::ALL.to_vec());
        }
        other => panic!("rerun should converge, got {:?}", other),
    }
    assert_eq!(state_after_first.policy, state_after_second.policy);
    assert_eq!(state_after_first.website, state_after_second.website);
    assert_eq!(
        state_after_first.public_access,
        state_after_second.public_access
    );
}

#[tokio::test]
async fn test_policy_denied_leaves_partial_state() {
    let s3 = FakeS3::new("111111111111", "sa-east-1");
    s3.deny("put_bucket_policy");

    let result = Provisioner::new(s3.clone())
        .provision(&BucketConfig::default())
        .await;

    let failure = result.into_result().unwrap_err();
    assert_eq!(failure.step, Some(Step::BucketPolicy));
    assert_eq!(failure.code, "AccessDenied");
    assert_eq!(
        failure.completed_steps,
        vec![
            Step::CreateBucket,
            Step::PublicAccessBlock,
            Step::WebsiteHosting
        ]
    );

    // Nothing rolled back
    let bucket = s3.bucket("cloud-app-project-1").unwrap();
    assert!(bucket.public_access.is_fully_open());
    assert!(bucket.website.is_some());
    assert!(bucket.policy.is_none());
}

#[tokio::test]
async fn test_website_failure_leaves_bucket_created() {
    let s3 = FakeS3::new("111111111111", "sa-east-1");
    s3.deny("put_bucket_website");

    let result = Provisioner::new(s3.clone())
        .provision(&BucketConfig::default())
        .await;

    assert_eq!(result.failure().unwrap().step, Some(Step::WebsiteHosting));
    assert!(!s3.calls().contains(&"put_bucket_policy"));
    let bucket = s3.bucket("cloud-app-project-1").unwrap();
    assert!(bucket.website.is_none());
    assert!(bucket.policy.is_none());
}

#[tokio::test]
async fn test_policy_targets_configured_bucket() {
    let s3 = FakeS3::new("111111111111", "eu-west-1");
    let config = BucketConfig::new("staging-site", "eu-west-1")
        .with_index_document("home.html")
        .with_error_document("404.html");

    let result = Provisioner::new(s3.clone()).provision(&config).await;

    assert_eq!(
        result.website_url(),
        Some("http://staging-site.s3-website-eu-west-1.amazonaws.com")
    );
    let bucket = s3.bucket("staging-site").unwrap();
    assert_eq!(
        bucket.policy.unwrap().statement[0].resource,
        "arn:aws:s3:::staging-site/*"
    );
    assert_eq!(
        bucket.website,
        Some(WebsiteConfiguration::new("home.html", "404.html"))
    );
    assert!(s3.bucket("cloud-app-project-1").is_none());
}
