//! Per-transaction validation outcomes.

use std::fmt;

/// Outcome of validating one transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TxValidationCode {
    #[default]
    Valid,
    /// Channel header names another channel or is malformed.
    BadChannelHeader,
    /// Envelope type cannot appear in a block.
    UnsupportedTxPayload,
    /// Config transaction does not apply on top of the current config.
    InvalidConfigTransaction,
    /// No usable chaincode definition.
    InvalidChaincode,
    /// Validation plugin rejected the transaction.
    EndorsementPolicyFailure,
    /// Invocation of a system chaincode that cannot be called externally.
    IllegalSystemChaincode,
}

impl TxValidationCode {
    pub fn is_valid(self) -> bool {
        self == Self::Valid
    }
}

impl fmt::Display for TxValidationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Valid => "VALID",
            Self::BadChannelHeader => "BAD_CHANNEL_HEADER",
            Self::UnsupportedTxPayload => "UNSUPPORTED_TX_PAYLOAD",
            Self::InvalidConfigTransaction => "INVALID_CONFIG_TRANSACTION",
            Self::InvalidChaincode => "INVALID_CHAINCODE",
            Self::EndorsementPolicyFailure => "ENDORSEMENT_POLICY_FAILURE",
            Self::IllegalSystemChaincode => "ILLEGAL_WRITESET",
        };
        f.write_str(name)
    }
}

/// Validation codes of every transaction in a block, by index.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TxValidationFlags(Vec<TxValidationCode>);

impl TxValidationFlags {
    /// All transactions start out valid.
    pub fn new(len: usize) -> Self {
        Self(vec![TxValidationCode::Valid; len])
    }

    pub fn set(&mut self, index: usize, code: TxValidationCode) {
        if let Some(slot) = self.0.get_mut(index) {
            *slot = code;
        }
    }

    pub fn get(&self, index: usize) -> Option<TxValidationCode> {
        self.0.get(index).copied()
    }

    pub fn is_valid(&self, index: usize) -> bool {
        self.get(index).is_some_and(TxValidationCode::is_valid)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = TxValidationCode> + '_ {
        self.0.iter().copied()
    }

    /// Number of transactions flagged anything other than valid.
    pub fn invalid_count(&self) -> usize {
        self.0.iter().filter(|c| !c.is_valid()).count()
    }
}

impl FromIterator<TxValidationCode> for TxValidationFlags {
    fn from_iter<I: IntoIterator<Item = TxValidationCode>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_default_valid() {
        let mut flags = TxValidationFlags::new(3);
        assert_eq!(flags.invalid_count(), 0);
        flags.set(1, TxValidationCode::BadChannelHeader);
        assert!(flags.is_valid(0));
        assert!(!flags.is_valid(1));
        assert_eq!(flags.invalid_count(), 1);
    }

    #[test]
    fn test_set_out_of_range_ignored() {
        let mut flags = TxValidationFlags::new(1);
        flags.set(5, TxValidationCode::InvalidChaincode);
        assert_eq!(flags.len(), 1);
        assert!(!flags.is_valid(5));
    }
}
