//! Canonical structured event names used across `fit-registry`.

// Topology events.
pub const FITABLE_CREATED: &str = "fitable_created";
pub const FITABLE_PRUNED: &str = "fitable_pruned";
pub const GENERICABLE_PRUNED: &str = "genericable_pruned";
pub const APPLICATION_DETACHED: &str = "application_detached";
pub const APPLICATION_PRUNED: &str = "application_pruned";
pub const ENDPOINT_ISOLATED: &str = "endpoint_isolated";
pub const ENDPOINT_UNISOLATED: &str = "endpoint_unisolated";
pub const OBSERVER_REGISTERED: &str = "observer_registered";
pub const OBSERVER_REMOVED: &str = "observer_removed";

// Reconciliation events.
pub const RECONCILE_START: &str = "reconcile_start";
pub const RECONCILE_OK: &str = "reconcile_ok";
pub const RECONCILE_ITEM_SKIPPED: &str = "reconcile_item_skipped";
pub const WORKER_PRUNED: &str = "worker_pruned";
pub const ENDPOINT_PRUNED: &str = "endpoint_pruned";

// Synchronizer events.
pub const SYNCHRONIZER_START: &str = "synchronizer_start";
pub const SYNCHRONIZER_STOP: &str = "synchronizer_stop";
pub const SYNC_QUERY_OK: &str = "sync_query_ok";
pub const SYNC_QUERY_FAILED: &str = "sync_query_failed";
pub const SYNC_SUBSCRIBE_OK: &str = "sync_subscribe_ok";
pub const SYNC_SUBSCRIBE_FAILED: &str = "sync_subscribe_failed";
pub const SYNC_UNSUBSCRIBE_FAILED: &str = "sync_unsubscribe_failed";
pub const SYNC_PUSH_RECEIVED: &str = "sync_push_received";
pub const ISOLATION_EXPIRED: &str = "isolation_expired";

// Runtime events.
pub const SCHEDULER_START: &str = "scheduler_start";
pub const SCHEDULER_STOP: &str = "scheduler_stop";
pub const SCHEDULER_TASK_SCHEDULED: &str = "scheduler_task_scheduled";
pub const SCHEDULER_TASK_UNSCHEDULED: &str = "scheduler_task_unscheduled";
pub const SCHEDULER_TASK_FIRED: &str = "scheduler_task_fired";
pub const RUNTIME_SPAWN_OK: &str = "runtime_spawn_ok";
pub const RUNTIME_SPAWN_FAILED: &str = "runtime_spawn_failed";

// Static-file registry events.
pub const STATIC_TOPOLOGY_READ: &str = "static_topology_read";
pub const STATIC_TOPOLOGY_ENTRY_SKIPPED: &str = "static_topology_entry_skipped";
pub const STATIC_TOPOLOGY_RELOADED: &str = "static_topology_reloaded";
pub const STATIC_TOPOLOGY_RELOAD_FAILED: &str = "static_topology_reload_failed";
pub const SPI_FITABLES_SUBSCRIBED: &str = "spi_fitables_subscribed";
pub const SPI_FITABLES_UNSUBSCRIBED: &str = "spi_fitables_unsubscribed";
pub const SPI_CALL_RECORDED: &str = "spi_call_recorded";

// Host process events.
pub const LISTENER_START: &str = "listener_start";
pub const LISTENER_STOP: &str = "listener_stop";
pub const LISTENER_FITABLE_SKIPPED: &str = "listener_fitable_skipped";
pub const LISTENER_ADDRESSES: &str = "listener_addresses";
pub const LISTENER_SIGNAL_UNAVAILABLE: &str = "listener_signal_unavailable";
