//! # Pokebot Responder
//!
//! Turns platform events into automatic responses.
//!
//! ## Flow
//! ```text
//! poke notice / message with emoji
//!   → DebounceGuard (too soon? drop, no side effects)
//!   → selector::select (weighted pick among configured candidates)
//!   → TemplateExpander ({at}, {username}, {hitokoto}, {pixiv}, {~} ...)
//!   → ActionDispatcher
//!        ├── Command → CommandExecutor (triggered_by_system = true)
//!        └── Message → MessageSink, one segment at a time
//! ```

pub mod debounce;
pub mod dispatch;
pub mod hitokoto;
pub mod pixiv;
pub mod poke;
pub mod selector;
pub mod stick;
pub mod template;

pub use debounce::{CooldownGuard, DebounceGuard};
pub use dispatch::{ActionDispatcher, DispatchOutcome};
pub use poke::PokeResponder;
pub use selector::ResponseSet;
pub use stick::StickResponder;
pub use template::{TemplateContext, TemplateExpander};
