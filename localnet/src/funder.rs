//! Sequential native-currency funding of test accounts.

use alloy_primitives::{Address, TxHash, U256};

use crate::chain::Network;
use crate::error::{Error, Result};

/// Transfers `amount` to each of `accounts` on `network`, in order.
///
/// Every transfer originates from the network's single funding account, so
/// each one is confirmed before the next is submitted. The first failure is
/// returned; transfers confirmed before it are kept.
///
/// # Errors
///
/// Returns [`Error::Funding`] naming the chain and the account whose transfer
/// failed.
pub async fn fund_accounts(
    network: &dyn Network,
    accounts: &[Address],
    amount: U256,
) -> Result<Vec<TxHash>> {
    let mut receipts = Vec::with_capacity(accounts.len());
    for account in accounts {
        let hash = network
            .transfer(*account, amount)
            .await
            .map_err(|e| Error::funding(network.name(), account, e))?;
        tracing::debug!(chain = network.name(), %account, %hash, "account funded");
        receipts.push(hash);
    }
    Ok(receipts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockNetwork, TransferStep};

    #[tokio::test(start_paused = true)]
    async fn transfers_are_confirmed_before_the_next_submit() {
        let network = MockNetwork::new("Ethereum");
        let accounts = [
            Address::repeat_byte(0xa),
            Address::repeat_byte(0xb),
            Address::repeat_byte(0xc),
        ];

        let hashes = fund_accounts(&network, &accounts, U256::from(5))
            .await
            .expect("funding succeeds");
        assert_eq!(hashes.len(), 3);

        let expected: Vec<TransferStep> = accounts
            .iter()
            .flat_map(|a| [TransferStep::Submitted(*a), TransferStep::Confirmed(*a)])
            .collect();
        assert_eq!(network.steps(), expected);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_stops_remaining_transfers() {
        let failing = Address::repeat_byte(0xb);
        let network = MockNetwork::new("Polygon").failing_transfer_to(failing);
        let accounts = [
            Address::repeat_byte(0xa),
            failing,
            Address::repeat_byte(0xc),
        ];

        let err = fund_accounts(&network, &accounts, U256::from(1))
            .await
            .expect_err("second transfer fails");
        assert!(matches!(err, Error::Funding { ref chain, .. } if chain == "Polygon"));

        let steps = network.steps();
        assert!(steps.contains(&TransferStep::Confirmed(accounts[0])));
        assert!(!steps.iter().any(|s| matches!(s, TransferStep::Submitted(a) if *a == accounts[2])));
    }

    #[tokio::test]
    async fn no_accounts_no_transfers() {
        let network = MockNetwork::new("Fantom");
        let hashes = fund_accounts(&network, &[], U256::from(1))
            .await
            .expect("nothing to fund");
        assert!(hashes.is_empty());
        assert!(network.steps().is_empty());
    }
}
