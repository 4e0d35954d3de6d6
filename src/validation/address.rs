//! Recipient address rules
//!
//! Recipients are typed either as a hex address or as a name-service name
//! (`alice.eth`). Names are resolved by a `NameResolver`; hex input must be a
//! well-formed 20-byte address and, when written in mixed case, must carry a
//! valid EIP-55 checksum.

use ethers::types::Address;
use ethers::utils::to_checksum;

/// Whether the input looks like a name-service name with one of the given suffixes
pub fn is_name_service(raw: &str, suffixes: &[String]) -> bool {
    let lowered = raw.trim().to_lowercase();
    suffixes.iter().any(|suffix| {
        let suffix = suffix.trim_start_matches('.').to_lowercase();
        lowered
            .strip_suffix(suffix.as_str())
            .and_then(|rest| rest.strip_suffix('.'))
            .is_some_and(|label| !label.is_empty())
    })
}

/// Parse a `0x`-prefixed hex address, enforcing the checksum on mixed-case input
pub fn parse_address(raw: &str) -> Option<Address> {
    let trimmed = raw.trim();
    let hex = trimmed.strip_prefix("0x")?;
    if hex.len() != 40 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }

    let address: Address = hex.parse().ok()?;

    let has_upper = hex.bytes().any(|b| b.is_ascii_uppercase());
    let has_lower = hex.bytes().any(|b| b.is_ascii_lowercase());
    if has_upper && has_lower && to_checksum(&address, None) != trimmed {
        return None;
    }

    Some(address)
}
