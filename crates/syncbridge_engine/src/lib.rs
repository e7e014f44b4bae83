//! # syncbridge engine
//!
//! Runs the incoming and outgoing synchronization flows on top of
//! `syncbridge_core`.
//!
//! This crate provides:
//! - The [`InputClient`] and [`OutputClient`] capability contracts
//! - The [`SyncProcessor`], which owns the registered clients and drives
//!   both flows while isolating per-client and per-record failures
//! - [`FlushListener`] and [`DriverErrorListener`], the hooks a unit of
//!   work calls around a flush
//! - Request handlers for the inbound endpoint and the status callback
//! - [`ErrorReport`] and its mapping to a response code
//! - Mock clients for tests
//!
//! ## Flows
//!
//! Outgoing: a flush is captured by the applicator, every supporting output
//! client gets one outbox record per touched aggregate, builds a transfer
//! object for it and sends it. Failures mark the record
//! `error_on_sync_mapping` or `error_on_sync_transport`.
//!
//! Incoming: a validated request is decoded by the input client with the
//! matching operation code, one inbox record is written per item, and each
//! item ends `sync_ok` or `error_on_sync_transport`.
//!
//! Each flow refuses to run in the other direction's request context.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod error;
mod listener;
mod mock;
mod operations;
mod processor;
mod report;

pub use client::{InputClient, OutputClient, OutputSupport, SyncClient};
pub use error::{error_trace, SyncError, SyncResult};
pub use listener::{DriverErrorListener, FlushListener, PendingFlush, UnitOfWork, NOTIFICATION_PREFIX};
pub use mock::{MockFailure, MockInputClient, MockOutputClient};
pub use operations::{ReceiveOperationHandler, SyncStatusOperation, SyncStatusOperationHandler};
pub use processor::{SyncProcessor, INCOMING_ON_OUTGOING, OUTGOING_ON_INCOMING};
pub use report::{ErrorReport, INTERNAL_SERVER_ERROR};

pub use syncbridge_core::{
    client_types, ClientDescriptor, ReceiveOperation, TransferEnvelope, TransferItem,
    TransferObject,
};
