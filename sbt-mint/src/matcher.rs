//! Account matching against the pre-authenticated expected address.
//!
//! The wallet extension may expose several accounts. Only the one whose
//! address decodes to the same public key as the expected address may be
//! used. There is no "first account" fallback.

use crate::types::{InjectedAccount, PublicKey, decode_account};

/// Account selected by [`find_matching_account`] together with its key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MatchedAccount {
    pub account: InjectedAccount,
    pub public_key: PublicKey,
}

/// Returns the account whose decoded public key equals the decoded
/// `expected` address.
///
/// Returns `None` when the list is empty, when nothing matches, or when
/// `expected` itself cannot be decoded. Accounts with undecodable
/// addresses are skipped.
pub fn find_matching_account(accounts: &[InjectedAccount], expected: &str) -> Option<MatchedAccount> {
    let expected_key = decode_account(expected).ok()?;

    accounts.iter().find_map(|account| {
        let key = decode_account(&account.address).ok()?;
        (key == expected_key).then(|| MatchedAccount {
            account: account.clone(),
            public_key: key,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::encode_ss58;

    fn account(key_byte: u8, format: u16) -> InjectedAccount {
        InjectedAccount {
            address: encode_ss58(&PublicKey([key_byte; 32]), format),
            zk_address: Some(format!("zk-{key_byte}")),
            name: None,
        }
    }

    #[test]
    fn matches_same_address() {
        let accounts = vec![account(1, 78)];
        let matched = find_matching_account(&accounts, &accounts[0].address).expect("match");
        assert_eq!(matched.account.zk_address.as_deref(), Some("zk-1"));
        assert_eq!(matched.public_key, PublicKey([1; 32]));
    }

    #[test]
    fn matches_across_network_prefixes_and_hex() {
        let accounts = vec![account(9, 78), account(2, 78)];
        let generic = encode_ss58(&PublicKey([2; 32]), 42);
        let matched = find_matching_account(&accounts, &generic).expect("match by key");
        assert_eq!(matched.account, accounts[1]);

        let hex = PublicKey([9; 32]).to_hex();
        let matched = find_matching_account(&accounts, &hex).expect("match by hex key");
        assert_eq!(matched.account, accounts[0]);
    }

    #[test]
    fn mismatch_and_empty_list_yield_none() {
        let accounts = vec![account(1, 78)];
        let other = encode_ss58(&PublicKey([3; 32]), 78);
        assert!(find_matching_account(&accounts, &other).is_none());
        assert!(find_matching_account(&[], &accounts[0].address).is_none());
        assert!(find_matching_account(&accounts, "garbage").is_none());
    }

    #[test]
    fn skips_undecodable_accounts() {
        let good = account(4, 42);
        let accounts = vec![
            InjectedAccount {
                address: "not-ss58".to_string(),
                zk_address: None,
                name: None,
            },
            good.clone(),
        ];
        let matched = find_matching_account(&accounts, &good.address).expect("match");
        assert_eq!(matched.account, good);
    }
}
