//! Dashboard client: widgets that keep a [`Panel`] fresh from push
//! notifications, with a fallback timer.
//!
//! | Module   | Responsibility                                             |
//! |----------|------------------------------------------------------------|
//! | `source` | `RecordSource` trait and the HTTP implementation           |
//! | `panel`  | What a widget shows: production, defect rate, leading line |
//! | `widget` | Mount/refresh/unmount loop and `WidgetState`               |
//! | `bridge` | Relays the floor server's SSE stream into a local Notifier |

pub mod bridge;
pub mod panel;
pub mod source;
pub mod widget;

pub use bridge::PushBridge;
pub use panel::{DefectRatePanel, LeadingLinePanel, Panel, ProductionPanel, ProductionView};
pub use source::{HttpSource, RecordSource};
pub use widget::{RefreshSettings, Trigger, Widget, WidgetHandle, WidgetState, WidgetView};
