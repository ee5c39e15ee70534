use alloy_primitives::{ruint::UintTryTo, U128, U256};
use serde::{Deserialize, Serialize};

#[inline]
fn try_convert_to_u128(value: U256) -> Option<u128> {
    value.uint_try_to().ok()
}

#[inline]
fn convert_from_u128(value: u128) -> U256 {
    U256::from_limbs([value as u64, (value >> 64) as u64, 0, 0])
}

#[inline]
fn convert_from_u8(value: u8) -> U256 {
    U256::from_limbs([value as u64, 0, 0, 0])
}

/// Fixed-point token amount with 18 decimals, stored as raw u128 units.
/// One token is `SCALE` raw units, matching the ERC-20 wei convention, so a
/// raw value round-trips unchanged through U256 contract arguments.
///
/// Serializes as a decimal string of raw units. Raw values exceed 2^53, so a
/// JSON number would lose precision in every JavaScript consumer.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Amount(pub u128);

impl Amount {
    pub const ZERO: Amount = Amount(0);
    pub const EPSILON: Amount = Amount(1);
    pub const MAX: Amount = Amount(u128::MAX);
    pub const ONE: Amount = Amount(Self::SCALE);
    pub const TWO: Amount = Amount(2 * Self::SCALE);
    pub const FOUR: Amount = Amount(4 * Self::SCALE);
    pub const SCALE: u128 = 1_000_000_000__000_000_000;
    pub const DECIMALS: usize = 18;

    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        let result = self.to_u256() + rhs.to_u256();
        Some(Self(try_convert_to_u128(result)?))
    }

    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        if rhs.0 > self.0 {
            return None;
        }
        Some(Self(self.0 - rhs.0))
    }

    pub fn saturating_sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }

    pub fn checked_mul(self, rhs: Self) -> Option<Self> {
        let result = (self.to_u256() * rhs.to_u256()) / Self::u256_scale();
        Some(Self(try_convert_to_u128(result)?))
    }

    pub fn checked_div(self, rhs: Self) -> Option<Self> {
        if rhs.0 == 0 {
            return None;
        }
        let result = (self.to_u256() * Self::u256_scale()) / rhs.to_u256();
        Some(Self(try_convert_to_u128(result)?))
    }

    #[inline]
    pub fn is_less_than(&self, other: &Self) -> bool {
        self.0 < other.0
    }

    #[inline]
    pub fn min(&self, other: &Self) -> Self {
        if self.is_less_than(other) {
            *self
        } else {
            *other
        }
    }

    #[inline]
    pub fn is_not(&self) -> bool {
        // Zero means "not set" here; decimal comparisons against a threshold
        // belong to the caller.
        self.0 == 0
    }

    pub fn from_u128_with_scale(value: u128, scale: u8) -> Self {
        let result = convert_from_u128(value) * convert_from_u128(Self::SCALE)
            / convert_from_u128(10).pow(convert_from_u8(scale));
        Self(try_convert_to_u128(result).unwrap())
    }

    #[inline]
    pub fn from_u128_raw(value: u128) -> Self {
        Self(value)
    }

    #[inline]
    pub fn to_u128_raw(&self) -> u128 {
        self.0
    }

    #[inline]
    pub fn from_u128(value: U128) -> Self {
        Self(value.to::<u128>())
    }

    #[inline]
    pub fn to_u128(&self) -> U128 {
        U128::from(self.0)
    }

    #[inline]
    pub fn try_from_u256(value: U256) -> Option<Self> {
        Some(Self(try_convert_to_u128(value)?))
    }

    #[inline]
    pub fn to_u256(&self) -> U256 {
        convert_from_u128(self.0)
    }

    #[inline]
    pub fn u256_scale() -> U256 {
        convert_from_u128(Self::SCALE)
    }

    /// Lossy conversion for display and JSON responses.
    #[inline]
    pub fn to_f64(&self) -> f64 {
        self.0 as f64 / Self::SCALE as f64
    }

    /// Lossy conversion from request payloads; negative and non-finite
    /// inputs collapse to zero.
    pub fn from_f64(value: f64) -> Self {
        if !value.is_finite() || value <= 0.0 {
            return Self::ZERO;
        }
        Self((value * Self::SCALE as f64) as u128)
    }
}

impl core::fmt::Display for Amount {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let big_value = convert_from_u128(self.0);
        let big_scale = convert_from_u128(Self::SCALE);

        let integral = big_value / big_scale;
        let fraction = big_value % big_scale;

        let max_scale_len = Amount::DECIMALS;
        let frac_str = format!(
            "{:0>max_scale_len$}",
            fraction,
            max_scale_len = max_scale_len
        );

        let requested_precision = f.precision();
        let final_frac_str = match requested_precision {
            Some(p) => {
                let len = p.min(max_scale_len);
                &frac_str[0..len]
            }

            None => {
                let trimmed = frac_str.trim_end_matches('0');
                if trimmed.is_empty() {
                    "0"
                } else {
                    trimmed
                }
            }
        };

        write!(f, "{}.{}", integral, final_frac_str)
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse::<u128>().map(Amount).map_err(serde::de::Error::custom)
    }
}
