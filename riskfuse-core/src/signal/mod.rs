//! Request/response boundary to the remote scan services.
//!
//! The client performs no retries; every failure is handed back to the
//! pipeline verbatim, tagged with the stage that failed.

use std::sync::Arc;

use async_trait::async_trait;
use riskfuse_model::{CombinedReport, FileDescriptor, MlReport, RemotePath, ReputationReport};

use crate::error::TransportError;

pub mod http;

pub use http::{HttpSignalClient, HttpSignalSettings, SignalEndpoints};

/// File contents shared between the concurrent calls of one job.
pub type FileBytes = Arc<[u8]>;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SignalClient: Send + Sync {
    /// Store the file remotely and return its opaque path token.
    async fn upload(
        &self,
        file: &FileDescriptor,
        bytes: FileBytes,
    ) -> Result<RemotePath, TransportError>;

    /// Hash-based reputation lookup against an earlier upload.
    async fn reputation_scan(
        &self,
        path: &RemotePath,
    ) -> Result<ReputationReport, TransportError>;

    /// Static-analysis ML classifier over the raw bytes.
    async fn classify(
        &self,
        file: &FileDescriptor,
        bytes: FileBytes,
    ) -> Result<MlReport, TransportError>;

    /// Generic multi-format classifier over the raw bytes.
    async fn combined_classify(
        &self,
        file: &FileDescriptor,
        bytes: FileBytes,
    ) -> Result<CombinedReport, TransportError>;
}
