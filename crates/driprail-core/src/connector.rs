//! The connector capability contract and its dynamic-dispatch wrapper.
//!
//! A connector is a live client for one third-party platform, bound to one
//! account's credentials. `get_tags` is the one capability every platform
//! must answer; the rest are optional and advertised through
//! [`ConnectorCapabilities`] -- default method bodies return 501 so an
//! adapter only implements what its platform supports.

use std::future::Future;
use std::pin::Pin;

use driprail_types::connection::{Connection, ConnectorCredentials, Platform};
use driprail_types::connector::{
    ConnectorCapabilities, MessageReceipt, OutboundMessage, Tag, UpsertReceipt, UpsertRequest,
};
use driprail_types::error::ConnectorError;

// ---------------------------------------------------------------------------
// Connector trait
// ---------------------------------------------------------------------------

/// Capability interface implemented by platform-specific adapters.
///
/// Uses RPITIT for async methods, consistent with the project's Rust 2024
/// edition approach. Steps check [`Connector::capabilities`] before calling
/// an optional method; calling one anyway yields a 501 connector error.
pub trait Connector: Send + Sync {
    fn platform(&self) -> Platform;

    fn capabilities(&self) -> ConnectorCapabilities;

    /// Tags currently on the contact. The one capability every platform
    /// adapter must implement.
    fn get_tags(
        &self,
        contact_id: &str,
    ) -> impl Future<Output = Result<Vec<Tag>, ConnectorError>> + Send;

    /// Apply a tag by name, returning the platform's view of it.
    fn apply_tag(
        &self,
        _contact_id: &str,
        _tag_name: &str,
    ) -> impl Future<Output = Result<Tag, ConnectorError>> + Send {
        async { Err(ConnectorError::unsupported("tags")) }
    }

    /// Remove a tag by name. Removing an absent tag is not an error.
    fn remove_tag(
        &self,
        _contact_id: &str,
        _tag_name: &str,
    ) -> impl Future<Output = Result<(), ConnectorError>> + Send {
        async { Err(ConnectorError::unsupported("tags")) }
    }

    /// Create or update a record (contact fields, spreadsheet row).
    fn upsert_record(
        &self,
        _request: &UpsertRequest,
    ) -> impl Future<Output = Result<UpsertReceipt, ConnectorError>> + Send {
        async { Err(ConnectorError::unsupported("records")) }
    }

    /// Deliver an outbound message.
    fn send_message(
        &self,
        _message: &OutboundMessage,
    ) -> impl Future<Output = Result<MessageReceipt, ConnectorError>> + Send {
        async { Err(ConnectorError::unsupported("messaging")) }
    }
}

// ---------------------------------------------------------------------------
// BoxConnector -- object-safe dynamic dispatch wrapper
// ---------------------------------------------------------------------------

/// Object-safe version of [`Connector`] with boxed futures.
///
/// Exists solely to enable dynamic dispatch; a blanket implementation
/// covers every `Connector`.
pub trait ConnectorDyn: Send + Sync {
    fn platform(&self) -> Platform;

    fn capabilities(&self) -> ConnectorCapabilities;

    fn get_tags_boxed<'a>(
        &'a self,
        contact_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Tag>, ConnectorError>> + Send + 'a>>;

    fn apply_tag_boxed<'a>(
        &'a self,
        contact_id: &'a str,
        tag_name: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Tag, ConnectorError>> + Send + 'a>>;

    fn remove_tag_boxed<'a>(
        &'a self,
        contact_id: &'a str,
        tag_name: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), ConnectorError>> + Send + 'a>>;

    fn upsert_record_boxed<'a>(
        &'a self,
        request: &'a UpsertRequest,
    ) -> Pin<Box<dyn Future<Output = Result<UpsertReceipt, ConnectorError>> + Send + 'a>>;

    fn send_message_boxed<'a>(
        &'a self,
        message: &'a OutboundMessage,
    ) -> Pin<Box<dyn Future<Output = Result<MessageReceipt, ConnectorError>> + Send + 'a>>;
}

/// Blanket implementation: any `Connector` automatically implements
/// `ConnectorDyn`.
impl<T: Connector> ConnectorDyn for T {
    fn platform(&self) -> Platform {
        Connector::platform(self)
    }

    fn capabilities(&self) -> ConnectorCapabilities {
        Connector::capabilities(self)
    }

    fn get_tags_boxed<'a>(
        &'a self,
        contact_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<Tag>, ConnectorError>> + Send + 'a>> {
        Box::pin(self.get_tags(contact_id))
    }

    fn apply_tag_boxed<'a>(
        &'a self,
        contact_id: &'a str,
        tag_name: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Tag, ConnectorError>> + Send + 'a>> {
        Box::pin(self.apply_tag(contact_id, tag_name))
    }

    fn remove_tag_boxed<'a>(
        &'a self,
        contact_id: &'a str,
        tag_name: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), ConnectorError>> + Send + 'a>> {
        Box::pin(self.remove_tag(contact_id, tag_name))
    }

    fn upsert_record_boxed<'a>(
        &'a self,
        request: &'a UpsertRequest,
    ) -> Pin<Box<dyn Future<Output = Result<UpsertReceipt, ConnectorError>> + Send + 'a>> {
        Box::pin(self.upsert_record(request))
    }

    fn send_message_boxed<'a>(
        &'a self,
        message: &'a OutboundMessage,
    ) -> Pin<Box<dyn Future<Output = Result<MessageReceipt, ConnectorError>> + Send + 'a>> {
        Box::pin(self.send_message(message))
    }
}

/// Type-erased connector handle as steps see it.
///
/// Built fresh for each execution by the connector loader. Never cached
/// across executions, so credential rotation takes effect on the next
/// message without an invalidation protocol.
pub struct BoxConnector {
    inner: Box<dyn ConnectorDyn + Send + Sync>,
}

impl std::fmt::Debug for BoxConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoxConnector")
            .field("platform", &self.platform())
            .finish_non_exhaustive()
    }
}

impl BoxConnector {
    /// Wrap a concrete `Connector` in a type-erased box.
    pub fn new<T: Connector + 'static>(connector: T) -> Self {
        Self {
            inner: Box::new(connector),
        }
    }

    pub fn platform(&self) -> Platform {
        self.inner.platform()
    }

    pub fn capabilities(&self) -> ConnectorCapabilities {
        self.inner.capabilities()
    }

    pub async fn get_tags(&self, contact_id: &str) -> Result<Vec<Tag>, ConnectorError> {
        self.inner.get_tags_boxed(contact_id).await
    }

    pub async fn apply_tag(
        &self,
        contact_id: &str,
        tag_name: &str,
    ) -> Result<Tag, ConnectorError> {
        self.inner.apply_tag_boxed(contact_id, tag_name).await
    }

    pub async fn remove_tag(
        &self,
        contact_id: &str,
        tag_name: &str,
    ) -> Result<(), ConnectorError> {
        self.inner.remove_tag_boxed(contact_id, tag_name).await
    }

    pub async fn upsert_record(
        &self,
        request: &UpsertRequest,
    ) -> Result<UpsertReceipt, ConnectorError> {
        self.inner.upsert_record_boxed(request).await
    }

    pub async fn send_message(
        &self,
        message: &OutboundMessage,
    ) -> Result<MessageReceipt, ConnectorError> {
        self.inner.send_message_boxed(message).await
    }
}

// ---------------------------------------------------------------------------
// ConnectorBuilder port
// ---------------------------------------------------------------------------

/// Constructs a live connector from a connection record and its decrypted
/// credentials. Implemented in driprail-infra per platform; construction is
/// synchronous (client setup, no I/O).
pub trait ConnectorBuilder: Send + Sync {
    fn build(
        &self,
        connection: &Connection,
        credentials: ConnectorCredentials,
    ) -> Result<BoxConnector, ConnectorError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
