/// Register descriptions for every client metric and start them at zero.
///
/// Safe to call with no recorder installed; the `metrics` macros are no-ops then.
pub fn initialize_client_metrics() {
    metrics::describe_counter!(
        "api.requests_total",
        "HTTP requests sent to the admin backend, including replays after refresh"
    );
    metrics::describe_counter!(
        "api.refresh.attempts_total",
        "Token refreshes started after a 401"
    );
    metrics::describe_counter!(
        "api.refresh.failures_total",
        "Token refreshes where both refresh routes failed"
    );
    metrics::describe_counter!(
        "confirm.requests_total",
        "Confirmation dialogs requested"
    );

    metrics::counter!("api.requests_total").absolute(0);
    metrics::counter!("api.refresh.attempts_total").absolute(0);
    metrics::counter!("api.refresh.failures_total").absolute(0);
    metrics::counter!("confirm.requests_total").absolute(0);
}
