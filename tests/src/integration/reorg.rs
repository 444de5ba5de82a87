//! # Reorganization Scenarios
//!
//! Heaviest-chain selection across competing branches, and the state it
//! leaves behind: after any sequence of reorgs the consensus checksum must
//! equal that of a node which only ever saw the winning branch.

#[cfg(test)]
mod tests {
    use crate::fixtures::{miner, TestChain, Wallet};
    use proptest::prelude::*;
    use qc_04_state_management::consensus_checksum;
    use qc_08_consensus::{AcceptOutcome, ConsensusConfig, ConsensusError};
    use shared_types::{genesis_fund_output_id, Block, BlockId, CoinOutput, FundOutput};

    /// Testing config whose genesis fund allocation belongs to `owner`.
    fn funded_config(owner: &Wallet) -> ConsensusConfig {
        let mut config = ConsensusConfig::testing();
        config.genesis.fund_allocations = vec![FundOutput {
            value: 10_000,
            unlock_hash: owner.address(),
        }];
        config
    }

    // =========================================================================
    // SIMPLE REORG WITH A TRANSFER
    // =========================================================================

    #[test]
    fn test_longer_branch_replaces_transfer() {
        let chain = TestChain::new();
        let alice = Wallet::from_seed(1);
        let bob = Wallet::from_seed(2);
        let genesis = chain.genesis();

        // Branch A: alice mines 1, pays bob at 3, reaches height 5.
        let a1 = chain.add(&genesis, alice.address(), vec![]);
        let a1_block = chain.set.processed_block(&a1).unwrap().block;
        let alice_coins = a1_block.miner_payout_id(0);
        let value = chain.set.config().subsidy(1);
        let a2 = chain.add(&a1, miner(1), vec![]);

        let transfer = alice.pay(
            &[alice_coins],
            vec![
                CoinOutput {
                    value: value - 1_000,
                    unlock_hash: bob.address(),
                },
                CoinOutput {
                    value: 900,
                    unlock_hash: alice.address(),
                },
            ],
            Some(100),
        );
        let to_bob = transfer.coin_output_id(0);
        let a3 = chain.add(&a2, miner(1), vec![transfer]);
        let a_rest = chain.extend(&a3, 2, 1);
        assert_eq!(chain.set.current_height(), 5);
        assert!(chain.set.output(&to_bob).is_some());
        chain.set.check_consistency().unwrap();

        // Branch B: six empty blocks from genesis.
        let b = chain.extend(&genesis, 5, 2);
        assert_eq!(chain.head(), a_rest[1]);
        let b6 = chain.mine(&b[4], miner(2), vec![]);
        let b6_id = b6.id();

        let outcome = chain.accept(b6).unwrap();
        let mut applied = b.clone();
        applied.push(b6_id);
        assert_eq!(
            outcome,
            AcceptOutcome::Reorganized {
                reverted: vec![a_rest[1], a_rest[0], a3, a2, a1],
                applied: applied.clone(),
            }
        );
        assert_eq!(chain.set.current_height(), 6);
        assert!(chain.set.output(&to_bob).is_none());
        assert!(chain.set.output(&alice_coins).is_none());
        chain.set.check_consistency().unwrap();

        let only_b = TestChain::new();
        chain.replay_into(&only_b, &applied);
        assert_eq!(only_b.set.consensus_checksum(), chain.set.consensus_checksum());

        // A grows back past B: the transfer is live again.
        let a6 = chain.add(&a_rest[1], miner(1), vec![]);
        let a7 = chain.add(&a6, miner(1), vec![]);
        assert_eq!(chain.head(), a7);
        assert!(chain.set.output(&to_bob).is_some());
        assert!(!chain.set.in_current_path(&b6_id));

        let only_a = TestChain::new();
        chain.replay_into(&only_a, &[a1, a2, a3, a_rest[0], a_rest[1], a6, a7]);
        assert_eq!(only_a.set.consensus_checksum(), chain.set.consensus_checksum());
        assert_eq!(only_a.set.state_snapshot(), chain.set.state_snapshot());
    }

    // =========================================================================
    // TIES AND ORDERING
    // =========================================================================

    #[test]
    fn test_equal_weight_branch_does_not_reorganize() {
        let chain = TestChain::new();
        let genesis = chain.genesis();
        let a = chain.extend(&genesis, 3, 1);
        let checksum = chain.set.consensus_checksum();

        let b1 = chain.add(&genesis, miner(2), vec![]);
        let b2 = chain.add(&b1, miner(2), vec![]);
        let b3 = chain.mine(&b2, miner(2), vec![]);

        assert_eq!(chain.accept(b3).unwrap(), AcceptOutcome::SideBranch);
        assert_eq!(chain.head(), a[2]);
        assert_eq!(chain.set.consensus_checksum(), checksum);
    }

    #[test]
    fn test_arrival_order_does_not_change_result() {
        let source = TestChain::new();
        let genesis = source.genesis();
        let a = source.extend(&genesis, 3, 1);
        let b = source.extend(&genesis, 4, 2);
        let c = source.extend(&a[1], 1, 3);

        let mut a_then_b: Vec<BlockId> = a.clone();
        a_then_b.extend(&c);
        a_then_b.extend(&b);
        let mut b_then_a: Vec<BlockId> = b.clone();
        b_then_a.extend(&a);
        b_then_a.extend(&c);

        let first = TestChain::new();
        source.replay_into(&first, &a_then_b);
        let second = TestChain::new();
        source.replay_into(&second, &b_then_a);

        assert_eq!(first.head(), b[3]);
        assert_eq!(second.head(), b[3]);
        assert_eq!(first.set.consensus_checksum(), second.set.consensus_checksum());
        assert_eq!(first.set.state_snapshot(), second.set.state_snapshot());
        assert_eq!(source.set.consensus_checksum(), first.set.consensus_checksum());
    }

    /// Four branches; A, B and D each spend the genesis fund output, C
    /// spends what A created. Returns the chain, the blocks in creation
    /// order, and the head (B's tip, the only block at height 5).
    fn forked_source(config: &ConsensusConfig) -> (TestChain, Vec<BlockId>, BlockId) {
        let alice = Wallet::from_seed(1);
        let bob = Wallet::from_seed(2);
        let source = TestChain::with_config(config.clone());
        let genesis = source.genesis();
        let funds = genesis_fund_output_id(&genesis, 0);
        let move_to = |tag: u8| {
            alice.move_funds(
                funds,
                vec![FundOutput {
                    value: 10_000,
                    unlock_hash: miner(tag),
                }],
            )
        };

        let to_bob = alice.move_funds(
            funds,
            vec![FundOutput {
                value: 10_000,
                unlock_hash: bob.address(),
            }],
        );
        let bobs = to_bob.fund_output_id(0);
        let a1 = source.add(&genesis, miner(1), vec![to_bob]);
        let a = source.extend(&a1, 2, 1);

        let onward = bob.move_funds(
            bobs,
            vec![FundOutput {
                value: 10_000,
                unlock_hash: miner(3),
            }],
        );
        let c1 = source.add(&a[0], miner(3), vec![onward]);
        let c2 = source.add(&c1, miner(3), vec![]);

        let b = source.extend(&genesis, 2, 2);
        let b3 = source.add(&b[1], miner(2), vec![move_to(2)]);
        let b_rest = source.extend(&b3, 2, 2);

        let d1 = source.add(&b[0], miner(4), vec![move_to(4)]);
        let d2 = source.add(&d1, miner(4), vec![]);

        let head = b_rest[1];
        assert_eq!(source.head(), head);
        let ids = vec![
            a1, a[0], a[1], c1, c2, b[0], b[1], b3, b_rest[0], b_rest[1], d1, d2,
        ];
        (source, ids, head)
    }

    const FORKED_BLOCKS: usize = 12;

    /// Accept `blocks` in the given order, holding orphans back until their
    /// parent has arrived.
    fn deliver(target: &TestChain, blocks: Vec<Block>) {
        let mut pending = blocks;
        while !pending.is_empty() {
            let before = pending.len();
            let mut waiting = Vec::new();
            for block in pending {
                match target.accept(block.clone()) {
                    Ok(_) => {}
                    Err(ConsensusError::OrphanBlock { .. }) => waiting.push(block),
                    Err(e) => panic!("valid block refused: {}", e),
                }
            }
            assert!(waiting.len() < before, "orphans never resolved");
            pending = waiting;
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn test_any_arrival_order_reaches_same_state(
            order in Just((0..FORKED_BLOCKS).collect::<Vec<usize>>()).prop_shuffle()
        ) {
            let config = funded_config(&Wallet::from_seed(1));
            let (source, ids, head) = forked_source(&config);
            prop_assert_eq!(ids.len(), FORKED_BLOCKS);
            let blocks: Vec<Block> = order
                .iter()
                .map(|&i| source.set.processed_block(&ids[i]).unwrap().block)
                .collect();

            let target = TestChain::with_config(config);
            deliver(&target, blocks);

            prop_assert_eq!(target.head(), head);
            prop_assert_eq!(target.set.consensus_checksum(), source.set.consensus_checksum());
            prop_assert_eq!(target.set.state_snapshot(), source.set.state_snapshot());
            prop_assert!(target.set.check_consistency().is_ok());
        }
    }

    // =========================================================================
    // FUND OUTPUTS ACROSS A REORG
    // =========================================================================

    #[test]
    fn test_fund_spend_reorged_out_and_back() {
        let alice = Wallet::from_seed(1);
        let bob = Wallet::from_seed(2);
        let config = funded_config(&alice);
        let chain = TestChain::with_config(config.clone());
        let genesis = chain.genesis();
        let funds = genesis_fund_output_id(&genesis, 0);
        let allocation = chain.set.fund_output(&funds).unwrap();

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
        let to_alice = split.fund_output_id(1);
        let a1 = chain.add(&genesis, miner(1), vec![split]);
        let a2 = chain.add(&a1, miner(1), vec![]);
        assert!(chain.set.fund_output(&funds).is_none());

        // B outweighs A: the move is undone and the allocation is back.
        let b = chain.extend(&genesis, 3, 2);
        assert_eq!(chain.head(), b[2]);
        assert_eq!(chain.set.fund_output(&funds), Some(allocation));
        assert!(chain.set.fund_output(&to_bob).is_none());
        assert!(chain.set.fund_output(&to_alice).is_none());
        chain.set.check_consistency().unwrap();

        // Bob's share does not exist on B.
        let bobs_spend = bob.move_funds(
            to_bob,
            vec![FundOutput {
                value: 6_000,
                unlock_hash: miner(9),
            }],
        );
        assert!(chain
            .accept(chain.mine(&b[2], miner(2), vec![bobs_spend.clone()]))
            .is_err());
        assert_eq!(chain.head(), b[2]);

        // A overtakes again and the cached move is re-applied.
        let a_more = chain.extend(&a2, 2, 1);
        assert_eq!(chain.head(), a_more[1]);
        assert!(chain.set.processed_block(&a1).unwrap().diffs_generated);
        assert!(chain.set.fund_output(&funds).is_none());
        assert_eq!(chain.set.fund_output(&to_bob).unwrap().value, 6_000);
        assert_eq!(chain.set.fund_output(&to_alice).unwrap().value, 4_000);
        chain.set.check_consistency().unwrap();

        let only_a = TestChain::with_config(config);
        chain.replay_into(&only_a, &[a1, a2, a_more[0], a_more[1]]);
        assert_eq!(only_a.set.consensus_checksum(), chain.set.consensus_checksum());
        assert_eq!(only_a.set.state_snapshot(), chain.set.state_snapshot());

        // On A, Bob's share is spendable.
        chain.add(&a_more[1], miner(1), vec![bobs_spend]);
        assert!(chain.set.fund_output(&to_bob).is_none());
        chain.set.check_consistency().unwrap();
    }

    // =========================================================================
    // FLIP-FLOP
    // =========================================================================

    #[test]
    fn test_flip_flop_between_three_branches() {
        let chain = TestChain::new();
        let genesis = chain.genesis();

        let a = chain.extend(&genesis, 2, 1);
        let b = chain.extend(&genesis, 3, 2);
        assert_eq!(chain.head(), b[2]);

        // C forks off A and overtakes B, then A itself resumes and wins.
        let c = chain.extend(&a[1], 2, 3);
        assert_eq!(chain.head(), c[1]);
        let a_more = chain.extend(&a[1], 3, 1);
        assert_eq!(chain.head(), a_more[2]);
        chain.set.check_consistency().unwrap();

        let direct = TestChain::new();
        chain.replay_into(&direct, &[a[0], a[1], a_more[0], a_more[1], a_more[2]]);
        assert_eq!(direct.set.consensus_checksum(), chain.set.consensus_checksum());

        // Every block on the losing branches was applied once and kept its diffs.
        for id in b.iter().chain(&c) {
            assert!(chain.set.processed_block(id).unwrap().diffs_generated);
        }
    }

    #[test]
    fn test_checksum_matches_recomputation() {
        let chain = TestChain::new();
        let genesis = chain.genesis();
        chain.extend(&genesis, 2, 1);
        chain.extend(&genesis, 3, 2);

        let head = chain.set.current_block();
        let recomputed = consensus_checksum(&chain.set.state_snapshot(), &head.id, head.height);
        assert_eq!(recomputed, chain.set.consensus_checksum());
        assert_eq!(head.consensus_checksum, Some(recomputed));
    }

    #[test]
    fn test_orphan_then_parent() {
        let source = TestChain::new();
        let ids = source.extend(&source.genesis(), 2, 1);

        let target = TestChain::new();
        let child = source.set.processed_block(&ids[1]).unwrap().block;
        let err = target.accept(child.clone()).unwrap_err();
        assert!(matches!(err, ConsensusError::OrphanBlock { parent } if parent == ids[0]));
        assert!(!err.is_permanent());

        source.replay_into(&target, &ids[..1]);
        assert_eq!(target.accept(child).unwrap(), AcceptOutcome::Extended);
        assert_eq!(target.head(), ids[1]);
    }
}
