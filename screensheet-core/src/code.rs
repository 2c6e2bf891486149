//! Connection codes and connection ids.

use rand::Rng;
use rand::distributions::Alphanumeric;

/// Length of the code a host shows and a viewer types.
pub const CODE_LEN: usize = 8;

/// Length of broker-assigned connection ids.
pub const CONNECTION_ID_LEN: usize = 20;

/// Fresh 8-character upper-case alphanumeric connection code.
pub fn generate_code() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CODE_LEN)
        .map(|b| (b as char).to_ascii_uppercase())
        .collect()
}

/// Fresh broker connection id.
pub fn connection_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(CONNECTION_ID_LEN)
        .map(char::from)
        .collect()
}

/// Normalize user input into a connection code.
///
/// Trims, upper-cases and drops anything that is not ASCII
/// alphanumeric. Returns `None` unless exactly [`CODE_LEN`] characters
/// remain.
pub fn normalize_code(input: &str) -> Option<String> {
    let code: String = input
        .trim()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect();
    (code.len() == CODE_LEN).then_some(code)
}
