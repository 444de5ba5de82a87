//! # Atomic Reorg Abort
//!
//! A heavier branch whose blocks fail while being applied must leave the
//! node exactly where it was: same head, same state, same checksum. The
//! failing block and everything stored above it become permanently invalid;
//! its valid ancestors on the branch stay usable.

#[cfg(test)]
mod tests {
    use crate::fixtures::{miner, TestChain, Wallet};
    use qc_08_consensus::{AcceptOutcome, BlockRejection, ConsensusError};
    use shared_types::{CoinOutput, NodeState};

    #[test]
    fn test_branch_spending_foreign_output_is_rolled_back() {
        let chain = TestChain::new();
        let alice = Wallet::from_seed(1);
        let bob = Wallet::from_seed(2);
        let genesis = chain.genesis();

        // Shared prefix: block 1 pays alice.
        let a1 = chain.add(&genesis, alice.address(), vec![]);
        let coins = chain.set.processed_block(&a1).unwrap().block.miner_payout_id(0);
        let value = chain.set.config().subsidy(1);

        // Branch A: alice pays bob at 2, then 3.
        let pay_bob = alice.pay(
            &[coins],
            vec![CoinOutput {
                value,
                unlock_hash: bob.address(),
            }],
            None,
        );
        let bobs = pay_bob.coin_output_id(0);
        let a2 = chain.add(&a1, miner(1), vec![pay_bob]);
        let a3 = chain.add(&a2, miner(1), vec![]);

        let head = chain.head();
        let checksum = chain.set.consensus_checksum();
        let snapshot = chain.set.state_snapshot();

        // Branch B: a valid block at 2, then bob spends an output that only
        // exists on A, then one more block so B outweighs A.
        let b2 = chain.add(&a1, miner(2), vec![]);
        let bad = bob.pay(
            &[bobs],
            vec![CoinOutput {
                value,
                unlock_hash: miner(2),
            }],
            None,
        );
        let b3 = chain.mine(&b2, miner(2), vec![bad]);
        let b3_id = b3.id();
        assert_eq!(chain.accept(b3).unwrap(), AcceptOutcome::SideBranch);
        let b4 = chain.mine(&b3_id, miner(2), vec![]);
        let b4_id = b4.id();

        let err = chain.accept(b4).unwrap_err();
        match &err {
            ConsensusError::ReorgAborted { block, reason } => {
                assert_eq!(*block, b3_id);
                assert!(matches!(reason, BlockRejection::State(_)));
            }
            other => panic!("expected an aborted reorg, got {:?}", other),
        }

        assert_eq!(chain.head(), head);
        assert_eq!(head, a3);
        assert_eq!(chain.set.consensus_checksum(), checksum);
        assert_eq!(chain.set.state_snapshot(), snapshot);
        assert_eq!(chain.set.node_state(), NodeState::Running);
        chain.set.check_consistency().unwrap();

        assert!(chain.set.is_invalid(&b3_id));
        assert!(chain.set.is_invalid(&b4_id));
        assert!(!chain.set.is_invalid(&b2));
        assert!(!chain.set.processed_block(&b2).unwrap().diffs_generated);

        // Descendants of the invalid block are refused outright.
        let b5 = chain.mine(&b4_id, miner(2), vec![]);
        assert!(matches!(
            chain.accept(b5),
            Err(ConsensusError::InvalidBlock {
                reason: BlockRejection::InvalidAncestor,
                ..
            })
        ));

        // The valid part of B can still win.
        let b3_ok = chain.add(&b2, miner(3), vec![]);
        let b4_ok = chain.add(&b3_ok, miner(3), vec![]);
        assert_eq!(chain.head(), b4_ok);
        assert!(chain.set.output(&bobs).is_none());
        assert!(chain.set.output(&coins).is_some());
        chain.set.check_consistency().unwrap();
    }

    #[test]
    fn test_abort_leaves_cached_diffs_consistent() {
        let chain = TestChain::new();
        let genesis = chain.genesis();
        let a = chain.extend(&genesis, 2, 1);
        let before = chain.set.consensus_checksum();

        // B1 is valid; B2 spends an output that does not exist anywhere.
        let b1 = chain.add(&genesis, miner(2), vec![]);
        let ghost = Wallet::from_seed(9).pay(
            &[shared_types::OutputId([0xEE; 32])],
            vec![CoinOutput {
                value: 1,
                unlock_hash: miner(2),
            }],
            None,
        );
        let b2 = chain.mine(&b1, miner(2), vec![ghost]);
        let b2_id = b2.id();
        chain.accept(b2).unwrap();
        let b3 = chain.mine(&b2_id, miner(2), vec![]);
        assert!(matches!(
            chain.accept(b3),
            Err(ConsensusError::ReorgAborted { .. })
        ));
        assert_eq!(chain.head(), a[1]);
        assert_eq!(chain.set.consensus_checksum(), before);

        // A keeps growing from its restored state.
        let a3 = chain.add(&a[1], miner(1), vec![]);
        assert_eq!(chain.head(), a3);
        let direct = TestChain::new();
        chain.replay_into(&direct, &[a[0], a[1], a3]);
        assert_eq!(direct.set.consensus_checksum(), chain.set.consensus_checksum());
    }
}
