//! Property-based test generators using proptest.
//!
//! Provides strategies for generating wallet rows that satisfy the storage
//! rules (non-empty natural keys, millisecond timestamps).

use chrono::{DateTime, Utc};
use proptest::prelude::*;
use walletdb_core::{OutputBasket, Timestamp, TransactionStatus};

/// Strategy for identity keys: compressed public keys in hex.
pub fn identity_key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("0[23][0-9a-f]{64}").expect("Invalid regex")
}

/// Strategy for basket, label and tag names.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9 _-]{0,23}").expect("Invalid regex")
}

/// Strategy for millisecond timestamps between 2020 and 2030.
pub fn timestamp_strategy() -> impl Strategy<Value = Timestamp> {
    (1_577_836_800_000i64..1_893_456_000_000i64).prop_map(|ms| {
        DateTime::<Utc>::from_timestamp_millis(ms).expect("timestamp in range")
    })
}

/// Strategy for transaction statuses.
pub fn transaction_status_strategy() -> impl Strategy<Value = TransactionStatus> {
    prop_oneof![
        Just(TransactionStatus::Completed),
        Just(TransactionStatus::Failed),
        Just(TransactionStatus::Unprocessed),
        Just(TransactionStatus::Sending),
        Just(TransactionStatus::Unproven),
        Just(TransactionStatus::Unsigned),
        Just(TransactionStatus::Nosend),
        Just(TransactionStatus::Nonfinal),
        Just(TransactionStatus::Unfail),
    ]
}

/// Strategy for a basket owned by `user_id`, with random mutable fields and
/// update time.
pub fn output_basket_strategy(user_id: i64) -> impl Strategy<Value = OutputBasket> {
    (
        name_strategy(),
        0i64..64,
        0i64..100_000,
        any::<bool>(),
        timestamp_strategy(),
    )
        .prop_map(move |(name, desired, minimum, deleted, updated_at)| {
            let mut basket = OutputBasket::new(user_id, name);
            basket.number_of_desired_utxos = desired;
            basket.minimum_desired_utxo_value = minimum;
            basket.is_deleted = deleted;
            basket.created_at = updated_at;
            basket.updated_at = updated_at;
            basket
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn timestamps_are_millisecond_precise(ts in timestamp_strategy()) {
            prop_assert_eq!(ts.timestamp_subsec_nanos() % 1_000_000, 0);
        }

        #[test]
        fn identity_keys_look_like_public_keys(key in identity_key_strategy()) {
            prop_assert_eq!(key.len(), 66);
        }

        #[test]
        fn baskets_keep_their_owner(basket in output_basket_strategy(7)) {
            prop_assert_eq!(basket.user_id, 7);
            prop_assert!(!basket.name.is_empty());
        }
    }
}
