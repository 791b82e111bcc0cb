use std::env;

/// Retrieves an environment variable, treating empty values as unset.
///
/// # Arguments
/// - `var`: The name of the environment variable.
///
/// # Returns
/// - `Option<String>`
pub fn get_env_var(var: &str) -> Option<String> {
    env::var(var)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
