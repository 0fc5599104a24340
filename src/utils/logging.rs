use std::error::Error;
use std::fmt::Debug;

/// Standard format for activity logs: [component] message: details
pub fn log_activity(component: &str, message: &str, details: Option<&str>) {
    let details_str = details.unwrap_or("");
    log::info!("[{}] {}: {}", component, message, details_str);
}

/// Standard format for error logs, including the chain of causes
pub fn log_error(component: &str, context: &str, err: &dyn Error) {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(&format!(" (caused by: {})", cause));
        source = cause.source();
    }
    log::error!("[{}] ERROR - {}: {}", component, context, message);
}

/// Log statistics with standard format
pub fn log_stats(component: &str, context: &str, stats: &str) {
    log_activity(component, context, Some(stats));
}

/// Log debug information
pub fn log_debug<T: Debug>(component: &str, context: &str, details: &T) {
    if log::log_enabled!(log::Level::Debug) {
        log::debug!("[{}] {} - Details: {:?}", component, context, details);
    }
}
