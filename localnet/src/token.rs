//! Typed lookup of well-known token deployments per chain.

use std::collections::HashMap;
use std::fmt;

use alloy_primitives::Address;

/// Tokens the orchestrator knows how to treat specially.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CanonicalToken {
    /// USD Coin.
    Usdc,
    /// Tether USD.
    Usdt,
    /// Wrapped Ether.
    Weth,
}

impl fmt::Display for CanonicalToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Usdc => "USDC",
            Self::Usdt => "USDT",
            Self::Weth => "WETH",
        })
    }
}

/// Addresses of canonical tokens, keyed by chain name (case-insensitive).
#[derive(Debug, Clone, Default)]
pub struct TokenRegistry {
    tokens: HashMap<(String, CanonicalToken), Address>,
}

impl TokenRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `token` as deployed at `address` on `chain`, replacing any
    /// previous entry.
    pub fn register(&mut self, chain: &str, token: CanonicalToken, address: Address) {
        self.tokens.insert((chain.to_lowercase(), token), address);
    }

    /// Address of `token` on `chain`, if one was registered.
    #[must_use]
    pub fn lookup(&self, chain: &str, token: CanonicalToken) -> Option<Address> {
        self.tokens.get(&(chain.to_lowercase(), token)).copied()
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.tokens.clear();
    }

    /// Number of registered tokens across all chains.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether no token is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_chain_name_case() {
        let mut registry = TokenRegistry::new();
        let usdc = Address::repeat_byte(0xaa);
        registry.register("Avalanche", CanonicalToken::Usdc, usdc);

        assert_eq!(registry.lookup("avalanche", CanonicalToken::Usdc), Some(usdc));
        assert_eq!(registry.lookup("Avalanche", CanonicalToken::Weth), None);
        assert_eq!(registry.lookup("Fantom", CanonicalToken::Usdc), None);
    }

    #[test]
    fn register_replaces() {
        let mut registry = TokenRegistry::new();
        registry.register("Fantom", CanonicalToken::Usdt, Address::repeat_byte(1));
        registry.register("FANTOM", CanonicalToken::Usdt, Address::repeat_byte(2));
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.lookup("fantom", CanonicalToken::Usdt),
            Some(Address::repeat_byte(2))
        );
    }
}
