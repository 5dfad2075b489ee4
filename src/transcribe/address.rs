//! Formatting of structured address fields into header values.

use crate::model::address::EmailAddress;

use super::sanitize::sanitize;

/// `"Display Name" <address>`, sanitized.
pub fn format_address(addr: &EmailAddress) -> String {
    sanitize(&format!("\"{}\" <{}>", addr.display_name, addr.address))
}

/// Formatted addresses joined with `", "`, in source order.
pub fn format_address_list(list: &[EmailAddress]) -> String {
    list.iter()
        .map(format_address)
        .collect::<Vec<_>>()
        .join(", ")
}
