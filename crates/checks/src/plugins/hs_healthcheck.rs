//! `hs_healthcheck` and `hs_healthcheck_v2`: status endpoints following the
//! health checks API.
//!
//! Version 1 answers with a JSON array whose first element is the status,
//! version 2 with an object whose `result` field is. The status is one of
//! `OK`, `WARN` or `CRIT`; anything else, including a body that does not
//! parse, is reported as critical.

use super::{http_client, parse_args, resolve_url};
use crate::check::{Check, CheckUsage};
use crate::config::CheckConfig;
use crate::error::CheckError;
use crate::resource::Resource;
use crate::result::{truncate_utf8, CheckResult, CheckStatus};
use clap::{CommandFactory, Parser};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Output sent upstream is capped to this many bytes
const MAX_BODY_BYTES: usize = 1024;

const DESCRIPTION_V1: &str = "Make an http request to the pod or service and check \
the status returned in the following format: \
https://hootsuite.github.io/health-checks-api/#status-aggregate-get.\n\
Example: `hs_healthcheck --url=http://:::POD_IP::::8080/status/dependencies`";

const DESCRIPTION_V2: &str = "Make an http request to the pod or service and check \
the status returned in the following format: \
https://hootsuite.github.io/health-checks-api/#status-aggregate-get.\n\
Example: `hs_healthcheck_v2 --url=http://:::POD_IP::::8080/status/dependencies`";

#[derive(Debug, Parser)]
struct Args {
    /// url to query. :::POD_IP::: gets replaced with the pod's IP. :::HOST_IP::: gets
    /// replaced with the pod's host ip. :::CLUSTER_IP::: gets replaced by the service's ip
    #[arg(short, long, default_value = "")]
    url: String,

    /// Request timeout in SECONDS
    #[arg(short, long, default_value_t = 15)]
    timeout: u64,
}

/// Health checks API response format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiVersion {
    /// `["OK", ...]`
    V1,
    /// `{"result": "OK", ...}`
    V2,
}

impl ApiVersion {
    fn id(self) -> &'static str {
        match self {
            ApiVersion::V1 => "hs_healthcheck",
            ApiVersion::V2 => "hs_healthcheck_v2",
        }
    }

    fn usage(self) -> CheckUsage {
        let description = match self {
            ApiVersion::V1 => DESCRIPTION_V1,
            ApiVersion::V2 => DESCRIPTION_V2,
        };
        let mut cmd = Args::command().name(self.id());
        CheckUsage {
            description: description.to_string(),
            flags: cmd.render_help().to_string(),
        }
    }

    fn status_of(self, body: &[u8]) -> CheckStatus {
        let status = match self {
            ApiVersion::V1 => serde_json::from_slice::<Vec<Value>>(body)
                .ok()
                .and_then(|items| items.first().and_then(Value::as_str).map(str::to_string)),
            ApiVersion::V2 => serde_json::from_slice::<AggregateStatus>(body)
                .ok()
                .map(|status| status.result),
        };
        match status.as_deref() {
            Some("OK") => CheckStatus::Ok,
            Some("WARN") => CheckStatus::Warn,
            _ => CheckStatus::Critical,
        }
    }
}

#[derive(Debug, Deserialize)]
struct AggregateStatus {
    #[serde(default)]
    result: String,
}

/// Health checks API check
#[derive(Debug)]
pub struct HsHealthCheck {
    config: CheckConfig,
    version: ApiVersion,
    args: Args,
    client: reqwest::Client,
    resource: Option<Arc<Resource>>,
}

impl HsHealthCheck {
    /// Builds a check reading `version` responses
    pub fn new(config: CheckConfig, version: ApiVersion) -> Result<Box<dyn Check>, CheckError> {
        let args: Args = parse_args(&config.name, &config.argv)?;
        if args.url.is_empty() {
            return Err(CheckError::InvalidArgs {
                name: config.name.clone(),
                reason: "--url cannot be empty".to_string(),
            });
        }
        let client = http_client(Duration::from_secs(args.timeout), false, "Sens8-HS-Healthcheck")?;

        Ok(Box::new(Self {
            config,
            version,
            args,
            client,
            resource: None,
        }))
    }

    pub fn new_v1(config: CheckConfig) -> Result<Box<dyn Check>, CheckError> {
        Self::new(config, ApiVersion::V1)
    }

    pub fn new_v2(config: CheckConfig) -> Result<Box<dyn Check>, CheckError> {
        Self::new(config, ApiVersion::V2)
    }

    pub fn static_usage_v1() -> CheckUsage {
        ApiVersion::V1.usage()
    }

    pub fn static_usage_v2() -> CheckUsage {
        ApiVersion::V2.usage()
    }
}

#[async_trait::async_trait]
impl Check for HsHealthCheck {
    fn config(&self) -> &CheckConfig {
        &self.config
    }

    fn update(&mut self, resource: Arc<Resource>) {
        self.resource = Some(resource);
    }

    async fn execute(&mut self) -> Result<CheckResult, CheckError> {
        let start = Instant::now();
        let resource = self.resource.as_deref().ok_or(CheckError::NoResource)?;
        let url = resolve_url(&self.args.url, resource)?;
        let mut result = CheckResult::new(self.config.clone());

        let body = self.client.get(&url).send().await?.bytes().await?;
        result.status = self.version.status_of(&body);
        let mut output = String::from_utf8_lossy(&body).into_owned();
        truncate_utf8(&mut output, MAX_BODY_BYTES);
        result.push_output(&output);

        result.finish(start);
        Ok(result)
    }

    fn usage(&self) -> CheckUsage {
        self.version.usage()
    }
}
