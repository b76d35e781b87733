//! ---
//! rm_section: "03-logging"
//! rm_subsection: "module"
//! rm_type: "source"
//! rm_scope: "code"
//! rm_description: "Context-enriched logging macros."
//! rm_version: "v0.0.0-prealpha"
//! rm_owner: "tbd"
//! ---
//! `rm_info!`, `rm_warn!`, `rm_debug!` and `rm_error!` accept an optional
//! leading `context = <LogContext>` argument followed by format arguments.

#[doc(hidden)]
#[macro_export]
macro_rules! __rm_event {
    ($level:expr, context = $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        $crate::tracing::event!(
            $level,
            host = ctx.host.unwrap_or(""),
            master = ctx.master.unwrap_or(""),
            mode = ctx.mode.unwrap_or(""),
            cycle = ctx.cycle.unwrap_or_default(),
            message = %format_args!($($arg)+)
        );
    }};
    ($level:expr, $($arg:tt)+) => {
        $crate::__rm_event!($level, context = $crate::LogContext::default(), $($arg)+)
    };
}

/// Informational event with replication context.
#[macro_export]
macro_rules! rm_info {
    ($($arg:tt)+) => { $crate::__rm_event!($crate::tracing::Level::INFO, $($arg)+) };
}

/// Warning with replication context.
#[macro_export]
macro_rules! rm_warn {
    ($($arg:tt)+) => { $crate::__rm_event!($crate::tracing::Level::WARN, $($arg)+) };
}

/// Debug event with replication context.
#[macro_export]
macro_rules! rm_debug {
    ($($arg:tt)+) => { $crate::__rm_event!($crate::tracing::Level::DEBUG, $($arg)+) };
}

/// Error with replication context.
#[macro_export]
macro_rules! rm_error {
    ($($arg:tt)+) => { $crate::__rm_event!($crate::tracing::Level::ERROR, $($arg)+) };
}
