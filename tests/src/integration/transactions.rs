//! # Transaction Validation Through `accept_block`
//!
//! Signatures, fund conservation, and in-block double spends, checked end
//! to end: a block carrying a bad transaction must be rejected permanently
//! and leave the state untouched.

#[cfg(test)]
mod tests {
    use crate::fixtures::{miner, TestChain, Wallet};
    use qc_02_block_storage::InMemoryKVStore;
    use qc_04_state_management::StateError;
    use qc_08_consensus::{BlockRejection, ConsensusConfig, ConsensusError};
    use shared_types::{
        genesis_fund_output_id, BlockId, CoinOutput, Currency, FundOutput, OutputId,
    };

    fn rejection(result: Result<qc_08_consensus::AcceptOutcome, ConsensusError>) -> BlockRejection {
        match result {
            Err(ConsensusError::InvalidBlock { reason, .. }) => reason,
            other => panic!("expected an invalid block, got {:?}", other),
        }
    }

    /// Chain at height 1 whose only payout belongs to `wallet`.
    fn funded(wallet: &Wallet) -> (TestChain<InMemoryKVStore>, BlockId, OutputId, Currency) {
        let chain = TestChain::new();
        let b1 = chain.add(&chain.genesis(), wallet.address(), vec![]);
        let coins = chain.set.processed_block(&b1).unwrap().block.miner_payout_id(0);
        let value = chain.set.config().subsidy(1);
        (chain, b1, coins, value)
    }

    fn to(address: shared_types::UnlockHash, value: Currency) -> Vec<CoinOutput> {
        vec![CoinOutput {
            value,
            unlock_hash: address,
        }]
    }

    // =========================================================================
    // SIGNATURES
    // =========================================================================

    #[test]
    fn test_signed_transfer_and_fee() {
        let alice = Wallet::from_seed(1);
        let bob = Wallet::from_seed(2);
        let (chain, b1, coins, value) = funded(&alice);

        let tx = alice.pay(&[coins], to(bob.address(), value - 10), Some(10));
        let to_bob = tx.coin_output_id(0);
        let block = chain.mine(&b1, miner(1), vec![tx]);
        let payout = block.miner_payout_id(0);
        chain.accept(block).unwrap();

        assert_eq!(chain.set.output(&to_bob).unwrap().value, value - 10);
        assert_eq!(
            chain.set.output(&payout).unwrap().value,
            chain.set.config().subsidy(2) + 10
        );
        chain.set.check_consistency().unwrap();

        // bob can spend what he received within the next block.
        let onward = bob.pay(&[to_bob], to(alice.address(), value - 10), None);
        chain.add(&chain.head(), miner(1), vec![onward]);
    }

    #[test]
    fn test_missing_signature_rejected() {
        let alice = Wallet::from_seed(1);
        let (chain, b1, coins, value) = funded(&alice);

        let mut tx = alice.pay(&[coins], to(miner(5), value), None);
        tx.signatures.clear();
        let reason = rejection(chain.accept(chain.mine(&b1, miner(1), vec![tx])));
        assert!(matches!(reason, BlockRejection::MissingSignatures { .. }));
        assert!(chain.set.output(&coins).is_some());
    }

    #[test]
    fn test_signature_by_other_key_rejected() {
        let alice = Wallet::from_seed(1);
        let mallory = Wallet::from_seed(66);
        let (chain, b1, coins, value) = funded(&alice);

        // mallory signs, but the conditions reveal alice's key.
        let mut tx = alice.pay(&[coins], to(mallory.address(), value), None);
        tx.signatures.clear();
        let forged = mallory.signature_for(&tx, coins.0);
        tx.signatures.push(forged);

        let reason = rejection(chain.accept(chain.mine(&b1, miner(1), vec![tx])));
        assert!(matches!(reason, BlockRejection::InvalidSignature(_)));
    }

    #[test]
    fn test_wrong_unlock_conditions_rejected() {
        let alice = Wallet::from_seed(1);
        let mallory = Wallet::from_seed(66);
        let (chain, b1, coins, value) = funded(&alice);

        // Correctly signed, but mallory's conditions do not hash to the owner.
        let tx = mallory.pay(&[coins], to(mallory.address(), value), None);
        let reason = rejection(chain.accept(chain.mine(&b1, miner(1), vec![tx])));
        assert!(matches!(
            reason,
            BlockRejection::State(StateError::UnlockHashMismatch { .. })
        ));
    }

    // =========================================================================
    // DOUBLE SPENDS AND BALANCE
    // =========================================================================

    #[test]
    fn test_double_spend_in_one_block_rejected() {
        let alice = Wallet::from_seed(1);
        let (chain, b1, coins, value) = funded(&alice);

        let first = alice.pay(&[coins], to(miner(5), value), None);
        let second = alice.pay(&[coins], to(miner(6), value), None);
        let reason = rejection(chain.accept(chain.mine(&b1, miner(1), vec![first, second])));
        assert!(matches!(reason, BlockRejection::DuplicateInput(_)));
    }

    #[test]
    fn test_spend_of_output_created_earlier_in_block() {
        let alice = Wallet::from_seed(1);
        let bob = Wallet::from_seed(2);
        let (chain, b1, coins, value) = funded(&alice);

        let first = alice.pay(&[coins], to(bob.address(), value), None);
        let second = bob.pay(&[first.coin_output_id(0)], to(miner(7), value), None);
        let last = second.coin_output_id(0);
        chain.add(&b1, miner(1), vec![first, second]);
        assert_eq!(chain.set.output(&last).unwrap().value, value);
    }

    #[test]
    fn test_unbalanced_transfer_rejected() {
        let alice = Wallet::from_seed(1);
        let (chain, b1, coins, value) = funded(&alice);

        let tx = alice.pay(&[coins], to(alice.address(), value + 1), None);
        let reason = rejection(chain.accept(chain.mine(&b1, miner(1), vec![tx])));
        assert!(matches!(
            reason,
            BlockRejection::State(StateError::CoinImbalance { .. })
        ));
    }

    // =========================================================================
    // FUNDS
    // =========================================================================

    #[test]
    fn test_funds_move_but_are_never_created() {
        let alice = Wallet::from_seed(1);
        let bob = Wallet::from_seed(2);
        let mut config = ConsensusConfig::testing();
        config.genesis.fund_allocations = vec![FundOutput {
            value: 10_000,
            unlock_hash: alice.address(),
        }];
        let chain = TestChain::with_config(config);
        let funds = genesis_fund_output_id(&chain.genesis(), 0);

        let inflate = alice.move_funds(
            funds,
            vec![FundOutput {
                value: 10_001,
                unlock_hash: bob.address(),
            }],
        );
        let reason = rejection(chain.accept(chain.mine(&chain.genesis(), miner(1), vec![inflate])));
        assert!(matches!(
            reason,
            BlockRejection::State(StateError::FundImbalance { .. })
        ));

        let split = alice.move_funds(
            funds,
            vec![
                FundOutput {
                    value: 6_000,
                    unlock_hash: bob.address(),
                },
                FundOutput {
                    value: 4_000,
                    unlock_hash: alice.address(),
                },
            ],
        );
        let to_bob = split.fund_output_id(0);
        chain.add(&chain.genesis(), miner(1), vec![split]);

        assert!(chain.set.fund_output(&funds).is_none());
        assert_eq!(chain.set.fund_output(&to_bob).unwrap().value, 6_000);
        chain.set.check_consistency().unwrap();
    }
}
