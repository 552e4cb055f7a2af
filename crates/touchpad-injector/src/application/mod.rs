//! Application layer use cases for the injection service.
//!
//! # What use cases does the injector have?
//!
//! - **`pointer_sink`** – The [`pointer_sink::PointerSink`] trait every
//!   injection backend implements, plus the errors it reports.  The concrete
//!   backends live in the infrastructure layer and are injected through a
//!   [`pointer_sink::SinkFactory`].
//!
//! - **`select_backend`** – Probes backends in priority order, caches the
//!   first that works, and degrades to the next one on failure.
//!
//! - **`input_service`** – The call surface used by the touch front end:
//!   absolute cursor moves, clicks, scrolls, drags, swipe actions,
//!   diagnostics, and shutdown.  Serialises every backend call.
//!
//! - **`system_action`** – Maps three-finger swipes to platform shortcuts
//!   and defines the external-command seam they run through.
//!
//! - **`dispatch_intents`** – Turns classifier intents into service calls
//!   while tracking the cursor on the target display.

pub mod dispatch_intents;
pub mod input_service;
pub mod pointer_sink;
pub mod select_backend;
pub mod system_action;
