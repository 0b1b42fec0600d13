use std::str::FromStr;

/// Interpret an optional configuration string as a boolean. Unrecognised or missing values yield `default`.
pub fn parse_boolean_flag(value: Option<String>, default: bool) -> bool {
    let Some(value) = value else {
        return default;
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => true,
        "0" | "false" | "no" | "off" => false,
        _ => default,
    }
}

/// Interpret an optional configuration string as a number. Returns `Err` with a printable reason when the value is
/// present but malformed, so that callers can log it before falling back to their default.
pub fn parse_number<T>(value: Option<String>, default: T) -> Result<T, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        None => Ok(default),
        Some(s) => s.trim().parse::<T>().map_err(|e| format!("'{s}' is not a valid number. {e}")),
    }
}
