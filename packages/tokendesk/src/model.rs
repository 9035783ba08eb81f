//! Domain records exchanged with the ledger service.
//!
//! These are plain data carriers; all lifecycle logic lives in the reducer
//! and the scheduler. Timestamps are absolute instants (`DateTime<Utc>`);
//! the whitelist form converts them to calendar dates only at the edit
//! boundary.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The distinguished feature flag that gates role delegation.
///
/// The feature-status trigger extracts this flag out of the fetched map into
/// `AppState::permissions_enabled` and removes it from the stored map.
pub const PERMISSIONS_FEATURE: &str = "Permissions";

/// Feature name to enabled flag, as reported by the ledger for one token.
pub type FeatureMap = BTreeMap<String, bool>;

/// An exclusive, time-bounded claim on a token symbol prior to creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// The reserved symbol, e.g. `"AAA"`.
    pub symbol: String,
    /// When the claim lapses and the symbol becomes reservable again.
    pub expiry: DateTime<Utc>,
}

/// A token owned by the connected wallet, as listed by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSummary {
    pub symbol: String,
    pub name: String,
}

/// Parameters for creating a token from an existing reservation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenParams {
    /// Must match one of the wallet's reservations.
    pub symbol: String,
    pub name: String,
    /// Link to supplementary token information; may be empty.
    pub details_url: String,
    /// Wallet used to store tokens for some operations.
    pub treasury_wallet: String,
    pub divisible: bool,
}

/// An administrative role that can be delegated on a token.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(pub String);

impl Role {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Role {
    fn from(name: &str) -> Self {
        Role(name.to_string())
    }
}

/// A delegate as reported by the ledger: one address, many roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delegate {
    pub address: String,
    pub roles: Vec<Role>,
    pub description: String,
}

/// One display row per (address, role) pair.
///
/// The delegate-fetch trigger flattens each [`Delegate`] into these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegateRecord {
    pub address: String,
    pub role: Role,
    pub description: String,
}

/// Flatten delegates into one record per (address, role) combination,
/// preserving the ledger's ordering.
pub fn flatten_delegates(delegates: &[Delegate]) -> Vec<DelegateRecord> {
    delegates
        .iter()
        .flat_map(|delegate| {
            delegate.roles.iter().map(|role| DelegateRecord {
                address: delegate.address.clone(),
                role: role.clone(),
                description: delegate.description.clone(),
            })
        })
        .collect()
}

/// A whitelist entry: per-address eligibility instants and flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tokenholder {
    pub address: String,
    pub can_send_after: DateTime<Utc>,
    pub can_receive_after: DateTime<Utc>,
    pub kyc_expiry: DateTime<Utc>,
    pub can_buy_from_sto: bool,
    pub is_accredited: bool,
}

/// Syntactic validity of a ledger address: `0x` followed by 40 hex digits.
///
/// This is a client-side convenience check only; the ledger remains
/// authoritative.
pub fn is_valid_address(address: &str) -> bool {
    let Some(hex) = address.strip_prefix("0x") else {
        return false;
    };
    hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_flatten_delegates_one_row_per_role() {
        let delegates = vec![
            Delegate {
                address: "0xaa".into(),
                roles: vec![Role::from("StoOperator"), Role::from("StoAdministrator")],
                description: "ops".into(),
            },
            Delegate {
                address: "0xbb".into(),
                roles: vec![Role::from("PermissionsOperator")],
                description: "perm".into(),
            },
        ];

        let records = flatten_delegates(&delegates);

        assert_eq!(records.len(), 3);
        assert_eq!(records[0].address, "0xaa");
        assert_eq!(records[0].role, Role::from("StoOperator"));
        assert_eq!(records[1].address, "0xaa");
        assert_eq!(records[1].role, Role::from("StoAdministrator"));
        assert_eq!(records[2].address, "0xbb");
        assert_eq!(records[2].role, Role::from("PermissionsOperator"));
    }

    #[test]
    fn test_flatten_delegates_empty_roles_yields_nothing() {
        let delegates = vec![Delegate {
            address: "0xaa".into(),
            roles: vec![],
            description: String::new(),
        }];
        assert!(flatten_delegates(&delegates).is_empty());
    }

    #[test]
    fn test_tokenholder_json_shape() {
        let holder = Tokenholder {
            address: "0x1111111111111111111111111111111111111111".into(),
            can_send_after: Utc.with_ymd_and_hms(2021, 3, 4, 5, 6, 7).unwrap(),
            can_receive_after: Utc.with_ymd_and_hms(2021, 3, 4, 5, 6, 7).unwrap(),
            kyc_expiry: Utc.with_ymd_and_hms(2022, 3, 4, 5, 6, 7).unwrap(),
            can_buy_from_sto: true,
            is_accredited: false,
        };

        let json = serde_json::to_value(&holder).unwrap();
        assert_eq!(json["can_send_after"], "2021-03-04T05:06:07Z");

        let back: Tokenholder = serde_json::from_value(json).unwrap();
        assert_eq!(back, holder);
    }

    #[test]
    fn test_address_validity() {
        assert!(is_valid_address(
            "0xdfabf3e4793cd30affb47ab6fa4cf4eef26bbc27"
        ));
        assert!(is_valid_address(
            "0x9FBDa871d559710256a2502A2517b794B482Db40"
        ));

        // No prefix
        assert!(!is_valid_address(
            "dfabf3e4793cd30affb47ab6fa4cf4eef26bbc27"
        ));
        // Too short
        assert!(!is_valid_address("0xdfabf3"));
        // Non-hex characters
        assert!(!is_valid_address(
            "0xzzabf3e4793cd30affb47ab6fa4cf4eef26bbc27"
        ));
        assert!(!is_valid_address(""));
    }
}
