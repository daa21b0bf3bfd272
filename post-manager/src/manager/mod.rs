/*!
Core modules for the post manager: local collection, durable delete queue,
reconciliation and the session that ties them together
*/

pub mod config;
pub mod delete_queue;
pub mod error;
pub mod event_system;
pub mod output_plugins;
pub mod posts;
pub mod queue_store;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;
