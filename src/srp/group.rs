//! The RFC 5054 group-14 parameters.
//!
//! Only the 2048-bit group is carried; both ends of this protocol pin it,
//! so there is no group negotiation.

use num_bigint_dig::BigUint;
use once_cell::sync::Lazy;

/// The 2048-bit safe prime N from RFC 5054 (group 14).
const N_HEX: &str = concat!(
    "AC6BDB41324A9A9BF166DE5E1389582FAF72B6651987EE07FC3192943DB56050",
    "A37329CBB4A099ED8193E0757767A13DD52312AB4B03310DCD7F48A9DA04FD50",
    "E8083969EDB767B0CF6095179A163AB3661A05FBD5FAAAE82918A9962F0B93B8",
    "55F97993EC975EEAA80D740ADBF4FF747359D041D5C33EA71D281E446B14773B",
    "CA97B43A23FB801676BD207A436C6481F1D2B9078717461A5B9D32E688F87748",
    "544523B524B0D57D5EA77A2775D2ECFA032CFBDBF52FB3786160279004E57AE6",
    "AF874E7303CE53299CCC041C7BC308D82A5698F3A8D0C38271AE35F8E9DBFBB6",
    "94B5C803D89F7AE435DE236D525F54759B65E372FCD68EF20FA7111F9E4AFF73",
);

static N: Lazy<BigUint> = Lazy::new(|| {
    BigUint::parse_bytes(N_HEX.as_bytes(), 16).expect("RFC 5054 modulus is valid hex")
});

static G: Lazy<BigUint> = Lazy::new(|| BigUint::from(2u32));

/// The group modulus N.
pub fn modulus() -> &'static BigUint {
    &N
}

/// The group generator g = 2.
pub fn generator() -> &'static BigUint {
    &G
}
