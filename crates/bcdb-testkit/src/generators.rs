//! Proptest generators for property-based testing.

use proptest::prelude::*;

use bcdb_core::{Identity, KeyId, Permissions, TagValue, Tags, ValidityWindow};

/// Generate an identity from a random seed.
pub fn identity() -> impl Strategy<Value = Identity> {
    (any::<KeyId>(), any::<[u8; 32]>()).prop_map(|(id, seed)| Identity::from_seed_bytes(id, seed))
}

/// Generate a plausible header creation time.
pub fn timestamp() -> impl Strategy<Value = u64> {
    1_500_000_000u64..=2_500_000_000
}

/// Generate a positive validity window.
pub fn validity() -> impl Strategy<Value = ValidityWindow> {
    (1i64..=86_400).prop_filter_map("positive window", |secs| {
        ValidityWindow::from_secs(secs).ok()
    })
}

/// Generate a user tag key (never in the reserved namespace).
pub fn tag_key() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_.:-]{0,15}"
}

/// Generate a tag key in the reserved namespace.
pub fn reserved_tag_key() -> impl Strategy<Value = String> {
    ":[a-z]{1,10}"
}

/// Generate any tag value.
pub fn tag_value() -> impl Strategy<Value = TagValue> {
    prop_oneof![
        "[a-zA-Z0-9 ]{0,20}".prop_map(TagValue::Str),
        any::<i64>().prop_map(TagValue::Int),
        any::<u64>().prop_map(TagValue::Uint),
        (-1.0e6f64..1.0e6).prop_map(TagValue::Double),
    ]
}

/// Generate a user tag set.
pub fn tags(max_len: usize) -> impl Strategy<Value = Tags> {
    prop::collection::vec((tag_key(), tag_value()), 0..=max_len)
        .prop_map(|pairs| pairs.into_iter().collect())
}

/// Generate a well-formed permission string.
pub fn permission_string() -> impl Strategy<Value = String> {
    (any::<bool>(), any::<bool>(), any::<bool>()).prop_map(|(r, w, d)| {
        [(r, 'r'), (w, 'w'), (d, 'd')]
            .iter()
            .map(|(set, c)| if *set { *c } else { '-' })
            .collect()
    })
}

/// Generate a permission set.
pub fn permissions() -> impl Strategy<Value = Permissions> {
    (0u8..=7).prop_map(|bits| {
        [Permissions::READ, Permissions::WRITE, Permissions::DELETE]
            .into_iter()
            .filter(|p| bits & p.bits() != 0)
            .fold(Permissions::NONE, Permissions::union)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bcdb_core::{
        validate_tags, AuthHeaderBuilder, StaticKeyRegistry, Verifier, VerifyError,
    };

    proptest! {
        #[test]
        fn header_signature_is_deterministic(
            identity in identity(),
            now in timestamp(),
            window in validity(),
        ) {
            let builder = AuthHeaderBuilder::new(&identity, window);
            let a = builder.build_at(now);
            let b = builder.build_at(now);
            prop_assert_eq!(a.render(), b.render());
            prop_assert_eq!(a.expires - a.created, window.as_secs());
        }

        #[test]
        fn built_headers_verify(
            identity in identity(),
            now in timestamp(),
            window in validity(),
        ) {
            let verifier = Verifier::new(StaticKeyRegistry::new().with_identity(&identity), 0);
            let header = AuthHeaderBuilder::new(&identity, window).build_at(now);
            prop_assert_eq!(verifier.verify_at(&header.render(), now), Ok(identity.id()));
        }

        #[test]
        fn flipped_signature_bit_fails(
            identity in identity(),
            now in timestamp(),
            byte in 0usize..64,
            bit in 0u8..8,
        ) {
            let verifier = Verifier::new(StaticKeyRegistry::new().with_identity(&identity), 0);
            let mut header = AuthHeaderBuilder::new(&identity, ValidityWindow::from_secs(3).unwrap())
                .build_at(now);
            header.signature.0[byte] ^= 1 << bit;
            prop_assert_eq!(
                verifier.verify_at(&header.render(), now),
                Err(VerifyError::BadSignature)
            );
        }

        #[test]
        fn permission_strings_roundtrip(s in permission_string()) {
            let parsed: Permissions = s.parse().unwrap();
            prop_assert_eq!(parsed.to_string(), s);
        }

        #[test]
        fn generated_permissions_render_three_chars(p in permissions()) {
            prop_assert_eq!(p.to_string().len(), 3);
        }

        #[test]
        fn user_tags_validate(tags in tags(8)) {
            prop_assert!(validate_tags(&tags).is_ok());
        }

        #[test]
        fn reserved_keys_never_validate(tags in tags(4), key in reserved_tag_key()) {
            let tags = tags.with(key, "x");
            prop_assert!(validate_tags(&tags).is_err());
        }
    }
}
