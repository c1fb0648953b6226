//! Floor server: the event source dashboards read from.
//!
//! ## Overview
//!
//! Stations and supervisors record production, RFID scans, inspections and
//! line moves through a small JSON API backed by SQLite. Every mutation
//! publishes a topic on the process [`Notifier`](crate::notifier::Notifier);
//! a forwarding subscriber pushes each notification to connected dashboards
//! over WebSocket and SSE.
//!
//! ## Module Map
//!
//! ```text
//! ┌───────────┐   HTTP   ┌──────────────────────────────────────────────┐
//! │ Stations  │ ───────> │  server.rs  (Router, ServerConfig)           │
//! │ Dashboard │ <─────── │    └─ api.rs  (handlers, AppState, ApiError) │
//! └───────────┘ WS / SSE │         │                                    │
//!                        │         │ Notifier::publish(topic, data)     │
//!                        │         v                                    │
//!                        │  ws.rs   forward_to_broadcast → /ws          │
//!                        │  sse.rs  BroadcastStream → /api/events       │
//!                        └──────────────────────────────────────────────┘
//! ```
//!
//! | Module   | Responsibility                                          |
//! |----------|---------------------------------------------------------|
//! | `models` | Rows and request payloads: `Employee`, `Scan`, plans    |
//! | `db`     | SQLite access via `DbHandle` (thin `Arc<Mutex<_>>`)     |
//!
//! ## Topics published
//!
//! | Mutation                         | Topic(s)                                   |
//! |----------------------------------|--------------------------------------------|
//! | create / pcs / delete employee   | `ProductionChanged` + employee collection  |
//! | line change                      | `ReallocationChanged`, `ReallocatedEmployeesChanged`, `ProductionChanged` |
//! | RFID scan                        | `ScanRecorded` (no payload)                |
//! | inspection                       | `DefectRecorded` + inspection collection   |
//! | plan create / update             | `PlanChanged` + plan collection            |

pub mod api;
pub mod db;
pub mod models;
pub mod server;
pub mod sse;
pub mod ws;
