//! Property tests: random command streams against a reference model

use proptest::prelude::*;
use siteblock_core::clock::{Clock, ManualClock};
use siteblock_core::registry::MemoryStore;
use siteblock_core::rules::{MemoryInstaller, RuleTemplate};
use siteblock_core::{Agent, Command, CommandOutcome, Registry, RuleSynchronizer};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

const NOW: i64 = 1_700_000_000;
const SITES: &[&str] = &["a.com", "b.org", "c.net", "www.d.io", "E.COM"];

#[derive(Debug, Clone)]
enum Op {
    Block { block_id: u64, sites: Vec<usize>, minutes: i64 },
    Unblock { block_id: u64 },
    Replay,
    Expire { minutes: i64 },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (1u64..5, prop::collection::vec(0..SITES.len(), 1..4), 1i64..120)
            .prop_map(|(block_id, sites, minutes)| Op::Block { block_id, sites, minutes }),
        2 => (1u64..5).prop_map(|block_id| Op::Unblock { block_id }),
        1 => Just(Op::Replay),
        1 => (1i64..180).prop_map(|minutes| Op::Expire { minutes }),
    ]
}

fn normalized(site: &str) -> String {
    site.trim_start_matches("www.").to_lowercase()
}

proptest! {
    #[test]
    fn prop_agent_matches_model(ops in prop::collection::vec(op_strategy(), 1..40)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let _guard = rt.enter();

        let installer = MemoryInstaller::new();
        let clock = ManualClock::new(NOW);
        let registry = Registry::open(Box::new(MemoryStore::new()), 1000).unwrap();
        let rules = RuleSynchronizer::new(Box::new(installer.clone()), RuleTemplate::default());
        let mut agent = Agent::builder(registry, rules)
            .clock(Arc::new(clock.clone()))
            .build();

        // block_id -> (domains, unblock_timestamp)
        let mut model: BTreeMap<u64, (BTreeSet<String>, i64)> = BTreeMap::new();
        let mut last: Option<Command> = None;
        let mut ts = 0.0;

        for op in ops {
            match op {
                Op::Block { block_id, sites, minutes } => {
                    ts += 1.0;
                    let names: Vec<&str> = sites.iter().map(|i| SITES[*i]).collect();
                    let until = clock.now() + minutes * 60;
                    let cmd = Command::block(names.clone(), block_id, until, ts);
                    prop_assert_eq!(agent.handle_command(&cmd).unwrap(), CommandOutcome::Executed);
                    model.insert(block_id, (names.iter().map(|s| normalized(s)).collect(), until));
                    last = Some(cmd);
                }
                Op::Unblock { block_id } => {
                    ts += 1.0;
                    let cmd = Command::unblock(block_id, ts);
                    prop_assert_eq!(agent.handle_command(&cmd).unwrap(), CommandOutcome::Executed);
                    model.remove(&block_id);
                    last = Some(cmd);
                }
                Op::Replay => {
                    if let Some(ref cmd) = last {
                        prop_assert_eq!(agent.handle_command(cmd).unwrap(), CommandOutcome::Stale);
                    }
                }
                Op::Expire { minutes } => {
                    clock.advance(minutes * 60);
                    let now = clock.now();
                    let due: Vec<u64> = model
                        .iter()
                        .filter(|(_, (_, until))| *until <= now)
                        .map(|(id, _)| *id)
                        .collect();
                    for block_id in due {
                        agent.handle_expiry(block_id).unwrap();
                        model.remove(&block_id);
                    }
                }
            }

            // Registry mirrors the model
            let ids: Vec<u64> = model.keys().copied().collect();
            prop_assert_eq!(agent.registry().block_ids(), ids);
            for (block_id, (domains, until)) in &model {
                let record = agent.registry().get(*block_id).unwrap();
                prop_assert_eq!(&record.domains, domains);
                prop_assert_eq!(record.unblock_timestamp, *until);
                prop_assert_eq!(record.rule_ids.len(), domains.len() * 2);
                prop_assert!(agent.scheduler().is_scheduled(*block_id));
            }

            // Installed rules are exactly the owned ones, no id shared
            let owned: Vec<u32> = agent.registry().owned_rule_ids().into_iter().collect();
            let total: usize = agent.registry().records().map(|r| r.rule_ids.len()).sum();
            prop_assert_eq!(owned.len(), total);
            prop_assert_eq!(installer.ids(), owned);

            prop_assert_eq!(agent.badge().count, model.len());
        }
    }
}
