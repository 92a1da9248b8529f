/*
 * Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
 * SPDX-License-Identifier: Apache-2.0
 */

//! Calls S3 `ListBuckets`, EC2 `DescribeInstances`, EKS `ListClusters` and STS
//! `GetCallerIdentity` on a timer through an instrumented SDK config, and serves the resulting
//! request metrics for Prometheus to scrape.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use anyhow::Context;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_metrics::{instrument_sdk_config, RequestMetrics};
use aws_sdk_s3::error::DisplayErrorContext;
use clap::Parser;
use prometheus::Registry;
use tracing::{info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

mod server;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Metrics server bind address.
    #[clap(short, long, default_value = "0.0.0.0")]
    address: IpAddr,
    /// Metrics server bind port.
    #[clap(short, long, default_value_t = 2112)]
    port: u16,
    /// Seconds between rounds of SDK calls.
    #[clap(short, long, default_value_t = 30)]
    interval_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    setup_tracing();

    let registry = Registry::new();
    let metrics = RequestMetrics::new();

    let sdk_config = aws_config::defaults(BehaviorVersion::latest()).load().await;
    let sdk_config = instrument_sdk_config(&sdk_config, &metrics, &registry)
        .context("failed to instrument the SDK HTTP client")?;

    tokio::spawn(call_services(
        sdk_config,
        Duration::from_secs(args.interval_secs),
    ));

    server::serve_metrics(SocketAddr::new(args.address, args.port), registry).await
}

fn setup_tracing() {
    let filter = EnvFilter::builder()
        .with_default_directive(tracing_subscriber::filter::LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn call_services(sdk_config: SdkConfig, interval: Duration) {
    let s3 = aws_sdk_s3::Client::new(&sdk_config);
    let ec2 = aws_sdk_ec2::Client::new(&sdk_config);
    let eks = aws_sdk_eks::Client::new(&sdk_config);
    let sts = aws_sdk_sts::Client::new(&sdk_config);
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        match s3.list_buckets().send().await {
            Ok(output) => info!(buckets = output.buckets().len(), "listed S3 buckets"),
            Err(err) => warn!(error = %DisplayErrorContext(&err), "S3 ListBuckets failed"),
        }
        match ec2.describe_instances().send().await {
            Ok(output) => info!(
                reservations = output.reservations().len(),
                "described EC2 instances"
            ),
            Err(err) => warn!(error = %DisplayErrorContext(&err), "EC2 DescribeInstances failed"),
        }
        match eks.list_clusters().send().await {
            Ok(output) => info!(clusters = output.clusters().len(), "listed EKS clusters"),
            Err(err) => warn!(error = %DisplayErrorContext(&err), "EKS ListClusters failed"),
        }
        match sts.get_caller_identity().send().await {
            Ok(output) => info!(account = ?output.account(), "fetched caller identity"),
            Err(err) => warn!(error = %DisplayErrorContext(&err), "STS GetCallerIdentity failed"),
        }
    }
}
