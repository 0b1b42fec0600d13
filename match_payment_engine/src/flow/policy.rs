use chrono::Duration;

/// How long players have to pay once the match soft-locks, given how long remains until the event starts.
///
/// | Time until start | Window     |
/// |------------------|------------|
/// | < 2h             | 30 minutes |
/// | 2h – 6h          | 60 minutes |
/// | > 6h             | 90 minutes |
///
/// Events that have already started (negative durations) get the shortest window.
pub fn compute_window_duration(time_until_start: Duration) -> Duration {
    let minutes = if time_until_start < Duration::hours(2) {
        30
    } else if time_until_start <= Duration::hours(6) {
        60
    } else {
        90
    };
    Duration::minutes(minutes)
}
