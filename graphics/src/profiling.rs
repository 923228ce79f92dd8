//! Profiling support via Tracy.
//!
//! Allocator and buffer pool hot paths are instrumented with [`profile_scope!`].
//! Spans are only recorded when the `profiling` feature is enabled:
//!
//! ```toml
//! [dependencies]
//! redlilium-graphics = { version = "0.1", features = ["profiling"] }
//! ```
//!
//! ```ignore
//! fn build_frame() {
//!     redlilium_graphics::profile_scope!("build_frame");
//!     // ... do work ...
//! }
//! ```
//!
//! [`profile_scope!`]: crate::profile_scope

#[cfg(feature = "profiling")]
pub use tracy_client::{self, Client, span};

/// Create a profiling span for the current scope.
///
/// The span ends when the scope exits. `$name` must be a string literal.
#[macro_export]
#[cfg(feature = "profiling")]
macro_rules! profile_scope {
    ($name:expr) => {
        let _profile_span = $crate::profiling::span!($name);
    };
}

/// Create a profiling span (no-op when profiling disabled).
#[macro_export]
#[cfg(not(feature = "profiling"))]
macro_rules! profile_scope {
    ($name:expr) => {};
}

/// Start the Tracy client. Does nothing when profiling is disabled.
///
/// Call once at startup, before the first instrumented scope runs.
pub fn start() {
    #[cfg(feature = "profiling")]
    {
        Client::start();
        log::info!("Tracy profiling client started");
    }
}

/// Whether the crate was built with the `profiling` feature.
pub const fn is_enabled() -> bool {
    cfg!(feature = "profiling")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_scope_compiles() {
        crate::profile_scope!("test_scope");
        start();
        assert_eq!(is_enabled(), cfg!(feature = "profiling"));
    }
}
