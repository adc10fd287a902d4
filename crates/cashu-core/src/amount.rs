use serde::{Deserialize, Serialize};

/// An amount denominated in the keyset's unit (satoshis, millisatoshis, or a
/// fiat-pegged unit depending on the mint's `unit` field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    /// The zero amount.
    pub const ZERO: Amount = Amount(0);

    /// Decompose into its binary denominations, largest first.
    ///
    /// Each element is a power of two present in `self`'s bit pattern, e.g.
    /// `Amount::from(13).split() == [8, 4, 1]`.
    pub fn split(&self) -> Vec<Self> {
        (0_u32..64)
            .rev()
            .filter_map(|bit| {
                let part = 1_u64 << bit;
                ((self.0 & part) == part).then_some(Self(part))
            })
            .collect()
    }

    /// The raw integer value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for Amount {
    fn default() -> Self {
        Amount::ZERO
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Amount> for u64 {
    fn from(value: Amount) -> Self {
        value.0
    }
}

impl std::ops::Add for Amount {
    type Output = Amount;
    fn add(self, rhs: Amount) -> Self::Output {
        Amount(self.0 + rhs.0)
    }
}

impl std::ops::AddAssign for Amount {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl std::ops::Sub for Amount {
    type Output = Amount;
    fn sub(self, rhs: Amount) -> Self::Output {
        Amount(self.0 - rhs.0)
    }
}

impl std::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, |acc, a| acc + a)
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_into_powers_of_two() {
        assert_eq!(
            Amount::from(13).split(),
            vec![Amount::from(8), Amount::from(4), Amount::from(1)]
        );
        assert_eq!(Amount::from(0).split(), Vec::<Amount>::new());
        assert_eq!(Amount::from(1).split(), vec![Amount::from(1)]);
    }

    #[test]
    fn sum_over_split_round_trips() {
        let a = Amount::from(1000);
        let total: Amount = a.split().into_iter().sum();
        assert_eq!(total, a);
    }
}
