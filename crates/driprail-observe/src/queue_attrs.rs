//! OpenTelemetry Messaging Semantic Convention attribute constants.
//!
//! These follow the OTel messaging conventions so queue producer and
//! consumer spans line up across the codebase. All constants are string
//! slices usable in `tracing::span!` and `tracing::info_span!` field names
//! (wrap them in braces: `{ MESSAGING_OPERATION_NAME } = OP_SEND`).
//!
//! Span naming convention: `"{operation} {destination}"` (e.g., `"send queue_messages"`)

// --- Required attributes ---

/// The messaging system delivering the message (e.g., "sqlite").
pub const MESSAGING_SYSTEM: &str = "messaging.system";

/// The name of the operation being performed (e.g., "send", "poll").
pub const MESSAGING_OPERATION_NAME: &str = "messaging.operation.name";

// --- Recommended attributes ---

/// The queue or topic the message is routed through.
pub const MESSAGING_DESTINATION_NAME: &str = "messaging.destination.name";

/// Transport-assigned identifier of a single message.
pub const MESSAGING_MESSAGE_ID: &str = "messaging.message.id";

/// Number of messages covered by a batch operation.
pub const MESSAGING_BATCH_MESSAGE_COUNT: &str = "messaging.batch.message_count";

// --- Driprail-specific attributes ---

/// Deduplication identity of the trigger event inside the message body.
pub const DRIPRAIL_EVENT_ID: &str = "driprail.event.id";

/// Registry kind of the step the event resolves to.
pub const DRIPRAIL_STEP_KIND: &str = "driprail.step.kind";

/// Account the event is scoped to.
pub const DRIPRAIL_ACCOUNT_ID: &str = "driprail.account.id";

/// Delivery attempt the outcome belongs to (1 = first delivery).
pub const DRIPRAIL_ATTEMPT: &str = "driprail.attempt";

// --- Operation name values ---

/// Enqueue a message (producer edge).
pub const OP_SEND: &str = "send";

/// Lease a batch of messages for processing.
pub const OP_POLL: &str = "poll";

/// Execute the step an event resolves to.
pub const OP_PROCESS: &str = "process";

/// Delete settled messages from the queue.
pub const OP_ACK: &str = "ack";

// --- System / destination values ---

/// SQLite-backed durable queue.
pub const SYSTEM_SQLITE: &str = "sqlite";

/// The live queue table.
pub const DESTINATION_QUEUE: &str = "queue_messages";
