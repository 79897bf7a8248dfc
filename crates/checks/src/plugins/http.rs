//! `http`: request a URL on the pod or service and check the response code.

use super::{http_client, parse_args, resolve_url, usage_for};
use crate::check::{Check, CheckUsage};
use crate::config::CheckConfig;
use crate::error::CheckError;
use crate::resource::Resource;
use crate::result::{CheckResult, CheckStatus};
use clap::Parser;
use reqwest::Method;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

const DESCRIPTION: &str = "Takes a URL and checks for a 200 response.\n\
Example: Make a GET request to a pod and expect a 200 response:\n\
`http --url=http://:::POD_IP::::8080/status/health`";

#[derive(Debug, Parser)]
#[command(name = "http")]
struct Args {
    /// url to query. :::POD_IP::: gets replaced with the pod's IP. :::HOST_IP::: gets
    /// replaced with the pod's host ip. :::CLUSTER_IP::: gets replaced by the service's ip
    #[arg(short, long, default_value = "")]
    url: String,

    /// Specify a GET, POST, or PUT operation
    #[arg(short = 'X', long, default_value = "GET")]
    method: String,

    /// Send a data body string with the request
    #[arg(short = 'd', long, default_value = "")]
    body: String,

    /// Specify a USER-AGENT
    #[arg(short = 'x', long = "user-agent", default_value = "Sens8-HTTP-Check")]
    user_agent: String,

    /// Check for a specific response code
    #[arg(short = 'O', long = "response-code", default_value_t = 200)]
    response_code: u16,

    /// Print BYTES of the output
    #[arg(short = 'b', long = "response-bytes", default_value_t = 256)]
    response_bytes: usize,

    /// Enable insecure SSL connections
    #[arg(short = 'k', long)]
    insecure: bool,

    /// Request timeout in SECONDS
    #[arg(short, long, default_value_t = 15)]
    timeout: u64,
}

/// HTTP probe check
#[derive(Debug)]
pub struct Http {
    config: CheckConfig,
    args: Args,
    method: Method,
    client: reqwest::Client,
    resource: Option<Arc<Resource>>,
}

impl Http {
    /// Builds the check from its config
    pub fn new(config: CheckConfig) -> Result<Box<dyn Check>, CheckError> {
        let args: Args = parse_args(&config.name, &config.argv)?;
        if args.url.is_empty() {
            return Err(CheckError::InvalidArgs {
                name: config.name.clone(),
                reason: "--url cannot be empty".to_string(),
            });
        }
        let method = Method::from_bytes(args.method.to_uppercase().as_bytes()).map_err(|e| {
            CheckError::InvalidArgs {
                name: config.name.clone(),
                reason: format!("--method {}: {}", args.method, e),
            }
        })?;
        let client = http_client(Duration::from_secs(args.timeout), args.insecure, &args.user_agent)?;

        Ok(Box::new(Self {
            config,
            args,
            method,
            client,
            resource: None,
        }))
    }

    /// Usage without an instance
    pub fn static_usage() -> CheckUsage {
        usage_for::<Args>(DESCRIPTION)
    }
}

#[async_trait::async_trait]
impl Check for Http {
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

        debug!("{} {}: {} {}", self.config.source_name(), self.config.name, self.method, url);
        let mut response = self
            .client
            .request(self.method.clone(), &url)
            .body(self.args.body.clone())
            .send()
            .await?;

        result.status = if response.status().as_u16() == self.args.response_code {
            CheckStatus::Ok
        } else {
            CheckStatus::Critical
        };

        // read only the desired amount of the body
        let mut body = Vec::new();
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    body.extend_from_slice(&chunk);
                    if body.len() >= self.args.response_bytes {
                        break;
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    result.push_output("error reading response body");
                    body.clear();
                    break;
                }
            }
        }
        body.truncate(self.args.response_bytes);
        result.push_output(&String::from_utf8_lossy(&body));

        result.finish(start);
        Ok(result)
    }

    fn usage(&self) -> CheckUsage {
        Self::static_usage()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::fixtures::*;

    fn config(command: &str) -> CheckConfig {
        CheckConfig {
            name: "probe".to_string(),
            command: command.to_string(),
            interval: 10,
            id: "http".to_string(),
            argv: shell_words::split(command).unwrap(),
            ..Default::default()
        }
    }

    #[test]
    fn test_url_required() {
        let err = Http::new(config("http")).unwrap_err();
        assert!(err.to_string().contains("--url cannot be empty"));
    }

    #[test]
    fn test_invalid_method() {
        let err = Http::new(config("http -u http://x -X \"NOT VALID\"")).unwrap_err();
        assert!(matches!(err, CheckError::InvalidArgs { .. }));
    }

    #[tokio::test]
    async fn test_pod_probe_ok() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/status/health")
            .match_header("user-agent", "Sens8-HTTP-Check")
            .with_status(200)
            .with_body("healthy")
            .create_async()
            .await;

        let mut check = Http::new(config("http --url http://:::POD_IP:::/status/health")).unwrap();
        check.update(Arc::new(Resource::Pod(pod_with_ips(&server.host_with_port(), "10.0.0.1"))));
        let res = check.execute().await.unwrap();

        mock.assert_async().await;
        assert_eq!(res.status, CheckStatus::Ok);
        assert_eq!(res.output, "healthy");
        assert!(res.duration > 0.0);
    }

    #[tokio::test]
    async fn test_service_probe_unexpected_code() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .match_body("ping")
            .with_status(503)
            .with_body("x".repeat(1000))
            .create_async()
            .await;

        let mut check = Http::new(config("http -u http://:::CLUSTER_IP:::/ -X post -d ping -b 10")).unwrap();
        check.update(Arc::new(Resource::Service(service_with_cluster_ip(&server.host_with_port()))));
        let res = check.execute().await.unwrap();

        assert_eq!(res.status, CheckStatus::Critical);
        assert_eq!(res.output, "x".repeat(10));
    }

    #[tokio::test]
    async fn test_expected_non_200_code() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server.mock("GET", "/gone").with_status(404).create_async().await;

        let mut check = Http::new(config("http -u http://:::POD_IP:::/gone -O 404")).unwrap();
        check.update(Arc::new(Resource::Pod(pod_with_ips(&server.host_with_port(), ""))));
        assert_eq!(check.execute().await.unwrap().status, CheckStatus::Ok);
    }

    #[tokio::test]
    async fn test_unreachable_is_error() {
        let mut check = Http::new(config("http -u http://:::POD_IP:::/ -t 1")).unwrap();
        check.update(Arc::new(Resource::Pod(pod_with_ips("127.0.0.1:1", ""))));
        assert!(matches!(check.execute().await, Err(CheckError::Http(_))));
    }
}
